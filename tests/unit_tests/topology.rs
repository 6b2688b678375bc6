use rupture::error::FaultError;
use rupture::nalgebra::{Point2, U2};
use rupture::topology::cohesive::{adjust, adjust_topology, fault_label, FaultInsertion};
use rupture::topology::overlap::SerialCommunicator;
use rupture::topology::procedural::{
    create_faulted_quad_mesh_2d, create_faulted_tet_mesh_3d, create_faulted_tri_mesh_2d,
    create_two_triangle_fault_mesh, FAULT_LABEL,
};
use rupture::topology::{CellShape, Mesh, MeshOrder, PointCategory, PointRange, CENSORED_DEPTH_LABEL, MATERIAL_ID_LABEL};

#[test]
fn mesh_order_categories() {
    let order = MeshOrder::new(2, 6, 2, 1);
    assert!(order.is_contiguous_partition());
    assert_eq!(order.num_points(), 11);
    assert_eq!(order.category(0), Some(PointCategory::NormalCell));
    assert_eq!(order.category(7), Some(PointCategory::NormalVertex));
    assert_eq!(order.category(8), Some(PointCategory::CensoredVertex));
    assert_eq!(order.category(10), Some(PointCategory::CensoredCell));
    assert_eq!(order.category(11), None);
    assert_eq!(order.cells().collect::<Vec<_>>(), vec![0, 1, 10]);
    assert_eq!(order.vertices(), 2..10);
    assert_eq!(order.cell_slot(10), Some(2));
    assert_eq!(order.cell_point(2), Some(10));
    assert_eq!(order.vertex_slot(9), Some(7));
    assert_eq!(order.vertex_point(7), Some(9));
}

#[test]
fn reversed_point_ranges_are_errors() {
    assert_eq!(PointRange::try_new(2, 5).unwrap(), PointRange::new(2, 5));
    assert!(PointRange::try_new(4, 4).unwrap().is_empty());
    let result = PointRange::try_new(5, 2);
    assert!(matches!(result, Err(FaultError::InvariantViolation { .. })));
}

#[test]
fn mesh_order_rejects_gaps() {
    let result = MeshOrder::from_ranges(
        PointRange::new(0, 2),
        PointRange::new(3, 6),
        PointRange::new(6, 6),
        PointRange::new(6, 6),
    );
    assert!(matches!(result, Err(FaultError::InvariantViolation { .. })));
}

#[test]
fn two_triangle_mesh_basics() {
    let mesh = create_two_triangle_fault_mesh::<f64>().unwrap();
    assert_eq!(mesh.num_points(), 6);
    assert_eq!(mesh.cone(0), &[2, 4, 3]);
    assert_eq!(mesh.cone(1), &[3, 4, 5]);
    assert_eq!(mesh.support(3), &[0, 1]);
    assert_eq!(mesh.support(2), &[0]);
    assert_eq!(mesh.depth_stratum(1), vec![0, 1]);
    assert_eq!(mesh.height_stratum(1), vec![2, 3, 4, 5]);
    assert_eq!(mesh.vertex_coordinates(3), Some(&Point2::new(0.0, 1.0)));
    assert!(mesh.cone(2).is_empty());
    assert!(!mesh.has_label(CENSORED_DEPTH_LABEL));
}

#[test]
fn cells_with_out_of_bounds_vertices_are_rejected() {
    let vertices = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)];
    let result = Mesh::<f64, U2>::from_vertices_and_cells(vertices, vec![vec![0, 1, 3]], CellShape::Triangle);
    assert!(matches!(result, Err(FaultError::Topology { .. })));
}

#[test]
fn two_triangle_fault_insertion_numbering() {
    let mesh = create_two_triangle_fault_mesh::<f64>().unwrap();
    let adjusted = adjust(&mesh, &FaultInsertion::new(FAULT_LABEL, 100)).unwrap();

    let order = adjusted.order();
    assert_eq!(order.normal_cells(), PointRange::new(0, 2));
    assert_eq!(order.normal_vertices(), PointRange::new(2, 8));
    assert_eq!(order.censored_vertices(), PointRange::new(8, 10));
    assert_eq!(order.censored_cells(), PointRange::new(10, 11));

    // The fault normal points into cell 0, which switches to the duplicated vertices
    assert_eq!(adjusted.cone(0), &[2, 7, 6]);
    assert_eq!(adjusted.cone(1), &[3, 4, 5]);
    assert_eq!(adjusted.cone(10), &[3, 4, 6, 7, 8, 9]);
    assert_eq!(adjusted.cell_shape(10), Some(CellShape::Segment));
    assert_eq!(adjusted.cohesive_cells().collect::<Vec<_>>(), vec![10]);
    assert_eq!(adjusted.cells_with_material_id(100), vec![10]);

    for (duplicate, original) in [(6, 3), (7, 4), (8, 3), (9, 4)] {
        assert_eq!(adjusted.vertex_coordinates(duplicate), adjusted.vertex_coordinates(original));
    }
    assert_eq!(adjusted.support(6), &[0, 10]);
    assert_eq!(adjusted.support(3), &[1, 10]);

    let fault = adjusted.label(FAULT_LABEL).unwrap();
    assert_eq!(fault.points().collect::<Vec<_>>(), vec![3, 4, 6, 7]);
    let censored = adjusted.label(CENSORED_DEPTH_LABEL).unwrap();
    assert_eq!(censored.stratum(0).collect::<Vec<_>>(), vec![8, 9]);
    assert_eq!(censored.stratum(1).collect::<Vec<_>>(), vec![10]);

    // The input mesh is untouched
    assert_eq!(mesh.num_points(), 6);
    assert_eq!(mesh.cone(0), &[2, 4, 3]);
}

#[test]
fn quad_fault_insertion() {
    let mesh = create_faulted_quad_mesh_2d::<f64>(2, 2, 1.0).unwrap();
    let adjusted = adjust(&mesh, &FaultInsertion::new(FAULT_LABEL, 7)).unwrap();
    let order = adjusted.order();
    assert_eq!(order.normal_cells().len(), 4);
    assert_eq!(order.normal_vertices().len(), 9 + 3);
    assert_eq!(order.censored_vertices().len(), 3);
    assert_eq!(order.censored_cells().len(), 2);
    assert!(order.is_contiguous_partition());

    let fault_vertices: Vec<usize> = mesh.label(FAULT_LABEL).unwrap().points().collect();
    let duplicates: Vec<usize> = order.normal_vertices().iter().skip(9).collect();
    for cell in adjusted.cells() {
        let x = adjusted.cell_centroid(cell).unwrap().x;
        let cone = adjusted.cone(cell);
        if x < 0.0 {
            assert!(cone.iter().all(|v| !fault_vertices.contains(v)));
        } else {
            assert!(cone.iter().all(|v| !duplicates.contains(v)));
        }
    }
    for cell in adjusted.cohesive_cells() {
        assert_eq!(adjusted.cone(cell).len(), 6);
        assert_eq!(adjusted.label(MATERIAL_ID_LABEL).unwrap().value(cell), Some(7));
    }
}

#[test]
fn tet_fault_insertion() {
    let mesh = create_faulted_tet_mesh_3d::<f64>(2, 1, 1, 1.0).unwrap();
    assert_eq!(mesh.order().num_cells(), 12);
    let adjusted = adjust(&mesh, &FaultInsertion::new(FAULT_LABEL, 3)).unwrap();
    let order = adjusted.order();
    assert_eq!(order.normal_vertices().len(), 12 + 4);
    assert_eq!(order.censored_vertices().len(), 4);
    assert_eq!(order.censored_cells().len(), 2);
    for cell in adjusted.cohesive_cells() {
        assert_eq!(adjusted.cell_shape(cell), Some(CellShape::Triangle));
        assert_eq!(adjusted.cone(cell).len(), 9);
    }
}

#[test]
fn missing_fault_label_is_a_configuration_error() {
    let mesh = create_two_triangle_fault_mesh::<f64>().unwrap();
    let err = adjust(&mesh, &FaultInsertion::new("no such fault", 1)).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn fault_on_mesh_boundary_is_a_topology_error() {
    let mesh = create_two_triangle_fault_mesh::<f64>()
        .unwrap()
        .with_label("boundary", fault_label([2, 3]))
        .unwrap();
    let err = adjust(&mesh, &FaultInsertion::new("boundary", 1)).unwrap_err();
    match err {
        FaultError::Topology { points, .. } => assert_eq!(points, vec![2, 3]),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn fault_ending_inside_the_mesh_is_not_implemented() {
    let mesh = create_faulted_tri_mesh_2d::<f64>(2, 2, 1.0).unwrap();
    // Vertices (0, -1) and (0, 0): the fault ends at the center of the mesh
    let num_cells = mesh.order().num_cells();
    let mesh = mesh
        .with_label("buried", fault_label([num_cells + 1, num_cells + 4]))
        .unwrap();
    let err = adjust(&mesh, &FaultInsertion::new("buried", 1)).unwrap_err();
    assert!(err.is_not_implemented());
}

#[test]
fn insertion_into_mesh_with_censored_points_is_not_implemented() {
    let mesh = create_two_triangle_fault_mesh::<f64>().unwrap();
    let adjusted = adjust(&mesh, &FaultInsertion::new(FAULT_LABEL, 100)).unwrap();
    let err = adjust(&adjusted, &FaultInsertion::new(FAULT_LABEL, 101)).unwrap_err();
    assert!(err.is_not_implemented());
}

#[test]
fn fault_id_must_be_new() {
    let mesh = create_two_triangle_fault_mesh::<f64>().unwrap();
    let faults = [FaultInsertion::new(FAULT_LABEL, 1), FaultInsertion::new("other", 1)];
    let mesh = mesh.with_label("other", fault_label([2])).unwrap();
    let err = adjust_topology(&mesh, &faults, &SerialCommunicator).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn two_faults_in_one_pass() {
    let mesh = create_faulted_quad_mesh_2d::<f64>(4, 1, 1.0).unwrap();
    let num_cells = mesh.order().num_cells();
    // Second fault along x = 1, grid column 3
    let mesh = mesh
        .with_label("east", fault_label([num_cells + 3, num_cells + 8]))
        .unwrap();
    let faults = [FaultInsertion::new(FAULT_LABEL, 10), FaultInsertion::new("east", 11)];
    let adjusted = adjust_topology(&mesh, &faults, &SerialCommunicator).unwrap();

    let order = adjusted.order();
    assert!(order.is_contiguous_partition());
    assert_eq!(order.censored_vertices().len(), 4);
    assert_eq!(order.censored_cells().len(), 2);
    assert_eq!(adjusted.cells_with_material_id(10).len(), 1);
    assert_eq!(adjusted.cells_with_material_id(11).len(), 1);
}
