//! Lower level details for refinement: how new vertices are identified and how each cell
//! shape is split.
use crate::allocators::DimAllocator;
use crate::error::FaultError;
use crate::topology::{centroid, Mesh};
use crate::Real;
use core::cmp::{max, min};
use nalgebra::{DefaultAllocator, DimName, OPoint};

/// An edge identified by its two end points, independent of direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey([usize; 2]);

impl EdgeKey {
    pub fn new(a: usize, b: usize) -> Self {
        Self([min(a, b), max(a, b)])
    }

    pub fn vertices(&self) -> [usize; 2] {
        self.0
    }
}

/// A vertex of the refined mesh, described through points of the original mesh.
///
/// The derived ordering (original vertices, then edge midpoints, then cell centers) is the
/// numbering order of vertices in the refined mesh.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefinedVertex {
    Vertex(usize),
    EdgeMidpoint(EdgeKey),
    CellCenter(usize),
}

impl RefinedVertex {
    pub fn construct_vertex<T, D>(&self, mesh: &Mesh<T, D>) -> Result<OPoint<T, D>, FaultError>
    where
        T: Real,
        D: DimName,
        DefaultAllocator: DimAllocator<T, D>,
    {
        match self {
            Self::Vertex(v) => Ok(mesh.try_vertex_coordinates(*v)?.clone()),
            Self::EdgeMidpoint(edge) => centroid(mesh, &edge.vertices()),
            Self::CellCenter(cell) => mesh.cell_centroid(*cell),
        }
    }
}

pub fn vertex(vertex: usize) -> RefinedVertex {
    RefinedVertex::Vertex(vertex)
}

pub fn edge_midpoint([a, b]: [usize; 2]) -> RefinedVertex {
    RefinedVertex::EdgeMidpoint(EdgeKey::new(a, b))
}

pub fn cell_center(cell: usize) -> RefinedVertex {
    RefinedVertex::CellCenter(cell)
}

/// Splits a triangle into four through its edge midpoints, preserving orientation.
pub fn refine_triangle([a, b, c]: [usize; 3]) -> [[RefinedVertex; 3]; 4] {
    let d = edge_midpoint([a, b]);
    let e = edge_midpoint([b, c]);
    let f = edge_midpoint([c, a]);
    let [a, b, c] = [a, b, c].map(vertex);
    [[a, d, f], [d, b, e], [f, e, c], [d, e, f]]
}

/// Splits a quadrilateral into four through its edge midpoints and its center.
pub fn refine_quadrilateral([a, b, c, d]: [usize; 4], cell: usize) -> [[RefinedVertex; 4]; 4] {
    let e = edge_midpoint([a, b]);
    let f = edge_midpoint([b, c]);
    let g = edge_midpoint([c, d]);
    let h = edge_midpoint([d, a]);
    let m = cell_center(cell);
    let [a, b, c, d] = [a, b, c, d].map(vertex);
    [[a, e, m, h], [e, b, f, m], [m, f, c, g], [h, m, g, d]]
}
