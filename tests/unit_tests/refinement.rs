use rupture::nalgebra::Point2;
use rupture::topology::cohesive::{adjust, FaultInsertion};
use rupture::topology::overlap::SerialCommunicator;
use rupture::topology::procedural::{create_faulted_quad_mesh_2d, create_two_triangle_fault_mesh, FAULT_LABEL};
use rupture::topology::refinement::detail::{edge_midpoint, refine_triangle, vertex, EdgeKey, RefinedVertex};
use rupture::topology::refinement::{refine_uniformly, refine_uniformly_repeat};

#[test]
fn edge_keys_ignore_direction() {
    assert_eq!(EdgeKey::new(4, 2), EdgeKey::new(2, 4));
    assert_eq!(EdgeKey::new(4, 2).vertices(), [2, 4]);
    assert!(vertex(100) < edge_midpoint([0, 1]));
    assert!(edge_midpoint([5, 6]) < RefinedVertex::CellCenter(0));
}

#[test]
fn refine_triangle_children_share_midpoints() {
    let children = refine_triangle([0, 1, 2]);
    let d = edge_midpoint([0, 1]);
    let e = edge_midpoint([1, 2]);
    let f = edge_midpoint([2, 0]);
    assert_eq!(children[0], [vertex(0), d, f]);
    assert_eq!(children[3], [d, e, f]);
}

#[test]
fn refine_two_triangles() {
    let mesh = create_two_triangle_fault_mesh::<f64>().unwrap();
    let refined = refine_uniformly(&mesh, &SerialCommunicator).unwrap();

    assert_eq!(refined.order().num_cells(), 8);
    assert_eq!(refined.order().num_vertices(), 9);
    // Original vertices keep their relative order, then edge midpoints by edge
    assert_eq!(refined.vertex_coordinates(8), Some(&Point2::new(-1.0, 0.0)));
    assert_eq!(refined.vertex_coordinates(14), Some(&Point2::new(0.0, 0.0)));

    let fault = refined.label(FAULT_LABEL).unwrap();
    assert_eq!(fault.points().collect::<Vec<_>>(), vec![9, 10, 14]);

    // Children are positively oriented, like their parents
    for cell in refined.cells() {
        let cone = refined.cone(cell);
        let p: Vec<_> = cone
            .iter()
            .map(|&v| refined.vertex_coordinates(v).unwrap())
            .collect();
        let area2 = (p[1] - p[0]).perp(&(p[2] - p[0]));
        assert!(area2 > 0.0, "cell {} has area {}", cell, area2 / 2.0);
    }
}

#[test]
fn refine_quads_adds_cell_centers() {
    let mesh = create_faulted_quad_mesh_2d::<f64>(2, 2, 1.0).unwrap();
    let refined = refine_uniformly_repeat(&mesh, 2, &SerialCommunicator).unwrap();
    assert_eq!(refined.order().num_cells(), 64);
    assert_eq!(refined.order().num_vertices(), 81);
    assert_eq!(refined.label(FAULT_LABEL).unwrap().len(), 9);
}

#[test]
fn refine_then_insert_fault() {
    let mesh = create_two_triangle_fault_mesh::<f64>().unwrap();
    let refined = refine_uniformly(&mesh, &SerialCommunicator).unwrap();
    let adjusted = adjust(&refined, &FaultInsertion::new(FAULT_LABEL, 100)).unwrap();
    assert_eq!(adjusted.order().censored_vertices().len(), 3);
    assert_eq!(adjusted.order().censored_cells().len(), 2);
    assert!(adjusted.order().is_contiguous_partition());
}

#[test]
fn refinement_after_insertion_is_not_implemented() {
    let mesh = create_two_triangle_fault_mesh::<f64>().unwrap();
    let adjusted = adjust(&mesh, &FaultInsertion::new(FAULT_LABEL, 100)).unwrap();
    let err = refine_uniformly(&adjusted, &SerialCommunicator).unwrap_err();
    assert!(err.is_not_implemented());
}
