//! Procedural meshes with fault labels, mostly for tests and benchmarks.
use crate::error::FaultError;
use crate::topology::cohesive::fault_label;
use crate::topology::{CellShape, Mesh};
use crate::Real;
use nalgebra::{convert, Point2, Point3, Vector3, U2, U3};

/// Name of the fault label attached by the generators in this module.
pub const FAULT_LABEL: &str = "fault";

/// Two triangles sharing the vertical edge `x = 0`, which is labelled as a fault.
///
/// Cells are points 0 and 1 and vertices are points 2 to 5 at `(-1, 0)`, `(0, 1)`, `(0, -1)`
/// and `(1, 0)`. The fault consists of the vertices 3 and 4.
pub fn create_two_triangle_fault_mesh<T: Real>() -> Result<Mesh<T, U2>, FaultError> {
    let p = |x: f64, y: f64| Point2::new(convert(x), convert(y));
    let vertices = vec![p(-1.0, 0.0), p(0.0, 1.0), p(0.0, -1.0), p(1.0, 0.0)];
    let cells = vec![vec![0, 2, 1], vec![1, 2, 3]];
    Mesh::from_vertices_and_cells(vertices, cells, CellShape::Triangle)?.with_label(FAULT_LABEL, fault_label([3, 4]))
}

/// Vertices of a structured grid centered on the origin, numbered row by row.
fn grid_vertices_2d<T: Real>(cells_x: usize, cells_y: usize, cell_size: T) -> Vec<Point2<T>> {
    let x0 = -convert::<f64, T>(cells_x as f64 / 2.0) * cell_size;
    let y0 = -convert::<f64, T>(cells_y as f64 / 2.0) * cell_size;
    let mut vertices = Vec::with_capacity((cells_x + 1) * (cells_y + 1));
    for j in 0..=cells_y {
        for i in 0..=cells_x {
            let x = x0 + convert::<f64, T>(i as f64) * cell_size;
            let y = y0 + convert::<f64, T>(j as f64) * cell_size;
            vertices.push(Point2::new(x, y));
        }
    }
    vertices
}

fn check_grid(cells_x: usize, others: &[usize]) -> Result<(), FaultError> {
    if cells_x < 2 || cells_x % 2 != 0 || others.contains(&0) {
        return Err(FaultError::configuration(format!(
            "a faulted grid needs an even number of cells (at least 2) across the fault and at least one \
             cell in every other direction, got {} and {:?}",
            cells_x, others
        )));
    }
    Ok(())
}

/// A structured quadrilateral mesh of `cells_x` by `cells_y` cells centered on the origin,
/// with the vertical line `x = 0` labelled as a fault.
///
/// `cells_x` must be even so that the fault runs along grid lines.
pub fn create_faulted_quad_mesh_2d<T: Real>(
    cells_x: usize,
    cells_y: usize,
    cell_size: T,
) -> Result<Mesh<T, U2>, FaultError> {
    check_grid(cells_x, &[cells_y])?;
    let vertices = grid_vertices_2d(cells_x, cells_y, cell_size);
    let index = |i: usize, j: usize| (cells_x + 1) * j + i;
    let mut cells = Vec::with_capacity(cells_x * cells_y);
    for j in 0..cells_y {
        for i in 0..cells_x {
            cells.push(vec![index(i, j), index(i + 1, j), index(i + 1, j + 1), index(i, j + 1)]);
        }
    }
    let num_cells = cells.len();
    let fault = fault_label((0..=cells_y).map(|j| num_cells + index(cells_x / 2, j)));
    Mesh::from_vertices_and_cells(vertices, cells, CellShape::Quadrilateral)?.with_label(FAULT_LABEL, fault)
}

/// Like [`create_faulted_quad_mesh_2d`], with every quadrilateral split into two triangles.
pub fn create_faulted_tri_mesh_2d<T: Real>(
    cells_x: usize,
    cells_y: usize,
    cell_size: T,
) -> Result<Mesh<T, U2>, FaultError> {
    check_grid(cells_x, &[cells_y])?;
    let vertices = grid_vertices_2d(cells_x, cells_y, cell_size);
    let index = |i: usize, j: usize| (cells_x + 1) * j + i;
    let mut cells = Vec::with_capacity(2 * cells_x * cells_y);
    for j in 0..cells_y {
        for i in 0..cells_x {
            let [a, b, c, d] = [index(i, j), index(i + 1, j), index(i + 1, j + 1), index(i, j + 1)];
            cells.push(vec![a, b, c]);
            cells.push(vec![a, c, d]);
        }
    }
    let num_cells = cells.len();
    let fault = fault_label((0..=cells_y).map(|j| num_cells + index(cells_x / 2, j)));
    Mesh::from_vertices_and_cells(vertices, cells, CellShape::Triangle)?.with_label(FAULT_LABEL, fault)
}

/// A structured tetrahedral mesh of a box centered on the origin with the plane `x = 0`
/// labelled as a fault. Every hexahedral grid cell is split into six tetrahedra sharing its
/// main diagonal.
pub fn create_faulted_tet_mesh_3d<T: Real>(
    cells_x: usize,
    cells_y: usize,
    cells_z: usize,
    cell_size: T,
) -> Result<Mesh<T, U3>, FaultError> {
    check_grid(cells_x, &[cells_y, cells_z])?;
    let half = |n: usize| -convert::<f64, T>(n as f64 / 2.0) * cell_size;
    let origin = Vector3::new(half(cells_x), half(cells_y), half(cells_z));
    let index = |i: usize, j: usize, k: usize| ((cells_y + 1) * k + j) * (cells_x + 1) + i;

    let mut vertices = Vec::with_capacity((cells_x + 1) * (cells_y + 1) * (cells_z + 1));
    for k in 0..=cells_z {
        for j in 0..=cells_y {
            for i in 0..=cells_x {
                let offset = Vector3::new(i as f64, j as f64, k as f64).map(|x| convert::<f64, T>(x) * cell_size);
                vertices.push(Point3::from(origin + offset));
            }
        }
    }

    // Paths from corner 000 to corner 111 along the cube edges, one tetrahedron per path
    const KUHN_PATHS: [[[usize; 3]; 2]; 6] = [
        [[1, 0, 0], [1, 1, 0]],
        [[1, 0, 0], [1, 0, 1]],
        [[0, 1, 0], [1, 1, 0]],
        [[0, 1, 0], [0, 1, 1]],
        [[0, 0, 1], [1, 0, 1]],
        [[0, 0, 1], [0, 1, 1]],
    ];
    let mut cells = Vec::with_capacity(6 * cells_x * cells_y * cells_z);
    for k in 0..cells_z {
        for j in 0..cells_y {
            for i in 0..cells_x {
                let corner = |[di, dj, dk]: [usize; 3]| index(i + di, j + dj, k + dk);
                for [first, second] in KUHN_PATHS {
                    let mut tet = [corner([0, 0, 0]), corner(first), corner(second), corner([1, 1, 1])];
                    if signed_volume(&vertices, &tet) < T::zero() {
                        tet.swap(2, 3);
                    }
                    cells.push(tet.to_vec());
                }
            }
        }
    }

    let num_cells = cells.len();
    let fault = fault_label(
        (0..=cells_z)
            .flat_map(|k| (0..=cells_y).map(move |j| (j, k)))
            .map(|(j, k)| num_cells + index(cells_x / 2, j, k)),
    );
    Mesh::from_vertices_and_cells(vertices, cells, CellShape::Tetrahedron)?.with_label(FAULT_LABEL, fault)
}

fn signed_volume<T: Real>(vertices: &[Point3<T>], [a, b, c, d]: &[usize; 4]) -> T {
    let a = &vertices[*a];
    (vertices[*b] - a).cross(&(vertices[*c] - a)).dot(&(vertices[*d] - a))
}
