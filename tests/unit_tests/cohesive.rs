use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use rupture::faults::{ConstraintVertex, FaultCohesive};
use rupture::nalgebra::DMatrix;
use rupture::topology::cohesive::{adjust, FaultInsertion};
use rupture::topology::procedural::{
    create_faulted_quad_mesh_2d, create_faulted_tet_mesh_3d, create_two_triangle_fault_mesh, FAULT_LABEL,
};
use rupture::topology::PointRange;

const UP: [f64; 3] = [0.0, 0.0, 1.0];

fn two_triangle_fault() -> FaultCohesive<f64> {
    let mesh = create_two_triangle_fault_mesh::<f64>().unwrap();
    let mesh = adjust(&mesh, &FaultInsertion::new(FAULT_LABEL, 100)).unwrap();
    FaultCohesive::new(&mesh, FAULT_LABEL, 100, UP).unwrap()
}

#[test]
fn two_triangle_constraints_and_frame() {
    let fault = two_triangle_fault();
    assert_eq!(fault.dim(), 2);
    assert_eq!(fault.cells().len(), 1);
    assert_eq!(
        fault.constraints(),
        &[
            ConstraintVertex {
                negative: 3,
                positive: 6,
                lagrange: 8
            },
            ConstraintVertex {
                negative: 4,
                positive: 7,
                lagrange: 9
            },
        ]
    );
    assert_eq!(fault.lagrange_range(), PointRange::new(8, 10));
    assert_eq!(fault.constraint_index(9), Some(1));
    assert_eq!(fault.constraint_index(5), None);
    assert_eq!(fault.cell_constraints(), vec![vec![0, 1]]);

    // Normal points into the positive side (x < 0), strike is the normal rotated counterclockwise
    let expected = DMatrix::from_row_slice(2, 2, &[0.0, -1.0, -1.0, 0.0]);
    for constraint in 0..2 {
        assert_matrix_eq!(fault.orientation(constraint), &expected, comp = abs, tol = 1e-12);
        assert_scalar_eq!(fault.area(constraint), 1.0, comp = abs, tol = 1e-12);
    }
    assert_eq!(fault.coordinates(0).as_slice(), &[0.0, 1.0]);
    assert_eq!(fault.query_points()[1].coordinates, vec![0.0, -1.0]);
}

#[test]
fn query_cells_sit_at_fault_face_centroids() {
    let fault = two_triangle_fault();
    let cells = fault.query_cells();
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0].cell, fault.cells()[0].cell);
    assert_eq!(cells[0].points, vec![8, 9]);
    assert_eq!(cells[0].coordinates, vec![0.0, 0.0]);

    let mesh = create_faulted_quad_mesh_2d::<f64>(2, 4, 0.5).unwrap();
    let mesh = adjust(&mesh, &FaultInsertion::new(FAULT_LABEL, 1)).unwrap();
    let fault = FaultCohesive::new(&mesh, FAULT_LABEL, 1, UP).unwrap();
    let cells = fault.query_cells();
    assert_eq!(cells.len(), 4);
    // Interior Lagrange vertices are shared by two cells, the fault ends by one
    let mut adjacency: Vec<usize> = fault
        .constraints()
        .iter()
        .map(|c| cells.iter().filter(|cell| cell.points.contains(&c.lagrange)).count())
        .collect();
    adjacency.sort_unstable();
    assert_eq!(adjacency, vec![1, 1, 2, 2, 2]);
}

#[test]
fn geometry_field_stores_orientation_row_major() {
    let fault = two_triangle_fault();
    let geometry = fault.geometry_field().unwrap();
    assert_eq!(geometry.subfields()[0].components, vec!["strike_x", "strike_y", "normal_x", "normal_y"]);
    assert_eq!(geometry.restrict_subfield(8, 0).unwrap(), &[0.0, -1.0, -1.0, 0.0]);
    assert_eq!(geometry.restrict_subfield(9, 1).unwrap(), &[1.0]);
}

#[test]
fn areas_sum_to_fault_length() {
    let mesh = create_faulted_quad_mesh_2d::<f64>(2, 4, 0.5).unwrap();
    let mesh = adjust(&mesh, &FaultInsertion::new(FAULT_LABEL, 1)).unwrap();
    let fault = FaultCohesive::new(&mesh, FAULT_LABEL, 1, UP).unwrap();
    assert_eq!(fault.num_constraints(), 5);
    let total: f64 = (0..fault.num_constraints()).map(|c| fault.area(c)).sum();
    assert_scalar_eq!(total, 2.0, comp = abs, tol = 1e-12);
    // End vertices carry half the area of interior ones
    assert_scalar_eq!(fault.area(0), 0.25, comp = abs, tol = 1e-12);
    assert_scalar_eq!(fault.area(2), 0.5, comp = abs, tol = 1e-12);
}

#[test]
fn three_dimensional_frame_is_orthonormal() {
    let mesh = create_faulted_tet_mesh_3d::<f64>(2, 1, 1, 1.0).unwrap();
    let mesh = adjust(&mesh, &FaultInsertion::new(FAULT_LABEL, 3)).unwrap();
    let fault = FaultCohesive::new(&mesh, FAULT_LABEL, 3, UP).unwrap();
    assert_eq!(fault.dim(), 3);
    let total: f64 = (0..fault.num_constraints()).map(|c| fault.area(c)).sum();
    assert_scalar_eq!(total, 1.0, comp = abs, tol = 1e-12);
    for c in 0..fault.num_constraints() {
        let r = fault.orientation(c);
        assert_matrix_eq!(r * r.transpose(), DMatrix::identity(3, 3), comp = abs, tol = 1e-12);
        // Normal along x, strike horizontal
        assert_scalar_eq!(r[(2, 0)].abs(), 1.0, comp = abs, tol = 1e-12);
        assert_scalar_eq!(r[(0, 2)], 0.0, comp = abs, tol = 1e-12);
    }
}

#[test]
fn normal_parallel_to_up_direction_keeps_frame_regular() {
    let mesh = create_faulted_tet_mesh_3d::<f64>(2, 1, 1, 1.0).unwrap();
    let mesh = adjust(&mesh, &FaultInsertion::new(FAULT_LABEL, 3)).unwrap();
    // The fault normal is along x
    let fault = FaultCohesive::new(&mesh, FAULT_LABEL, 3, [1.0, 0.0, 0.0]).unwrap();
    for c in 0..fault.num_constraints() {
        let r = fault.orientation(c);
        assert_matrix_eq!(r * r.transpose(), DMatrix::identity(3, 3), comp = abs, tol = 1e-12);
        assert_scalar_eq!(r[(2, 0)].abs(), 1.0, comp = abs, tol = 1e-12);
        // Strike falls back to the y axis, the first axis orthogonal to the normal
        assert_scalar_eq!(r[(0, 1)], 1.0, comp = abs, tol = 1e-12);
    }
}

#[test]
fn unknown_fault_id_is_a_configuration_error() {
    let mesh = create_two_triangle_fault_mesh::<f64>().unwrap();
    let mesh = adjust(&mesh, &FaultInsertion::new(FAULT_LABEL, 100)).unwrap();
    let err = FaultCohesive::new(&mesh, FAULT_LABEL, 101, UP).unwrap_err();
    assert!(err.is_configuration());
}
