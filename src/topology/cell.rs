//! Cell shapes and their faces.
use serde::{Deserialize, Serialize};

/// Shape of a (normal) cell, or the fault-face shape of a cohesive cell.
///
/// Vertex ordering follows the usual VTK conventions. Faces are listed so that their
/// right-hand normal points out of a positively oriented cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellShape {
    Segment,
    Triangle,
    Quadrilateral,
    Tetrahedron,
    Hexahedron,
}

const SEGMENT_FACES: &[&[usize]] = &[&[0], &[1]];
const TRIANGLE_FACES: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 0]];
const QUADRILATERAL_FACES: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 3], &[3, 0]];
const TETRAHEDRON_FACES: &[&[usize]] = &[&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[0, 3, 2]];
const HEXAHEDRON_FACES: &[&[usize]] = &[
    &[0, 3, 2, 1],
    &[4, 5, 6, 7],
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[3, 0, 4, 7],
];

impl CellShape {
    pub fn dim(&self) -> usize {
        match self {
            Self::Segment => 1,
            Self::Triangle | Self::Quadrilateral => 2,
            Self::Tetrahedron | Self::Hexahedron => 3,
        }
    }

    pub fn num_vertices(&self) -> usize {
        match self {
            Self::Segment => 2,
            Self::Triangle => 3,
            Self::Quadrilateral | Self::Tetrahedron => 4,
            Self::Hexahedron => 8,
        }
    }

    /// Local vertex indices of each codimension-1 face.
    pub fn faces(&self) -> &'static [&'static [usize]] {
        match self {
            Self::Segment => SEGMENT_FACES,
            Self::Triangle => TRIANGLE_FACES,
            Self::Quadrilateral => QUADRILATERAL_FACES,
            Self::Tetrahedron => TETRAHEDRON_FACES,
            Self::Hexahedron => HEXAHEDRON_FACES,
        }
    }

    /// Shape of the codimension-1 faces, `None` for segments whose faces are vertices.
    pub fn face_shape(&self) -> Option<CellShape> {
        match self {
            Self::Segment => None,
            Self::Triangle | Self::Quadrilateral => Some(Self::Segment),
            Self::Tetrahedron => Some(Self::Triangle),
            Self::Hexahedron => Some(Self::Quadrilateral),
        }
    }

    /// Guesses the shape of a cell of the given dimension from its vertex count.
    pub fn from_dim_and_vertex_count(dim: usize, num_vertices: usize) -> Option<Self> {
        match (dim, num_vertices) {
            (1, 2) => Some(Self::Segment),
            (2, 3) => Some(Self::Triangle),
            (2, 4) => Some(Self::Quadrilateral),
            (3, 4) => Some(Self::Tetrahedron),
            (3, 8) => Some(Self::Hexahedron),
            _ => None,
        }
    }
}
