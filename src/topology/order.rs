//! Point numbering of a mesh as four contiguous ranges.
//!
//! Points are numbered normal cells first, then normal vertices, censored vertices and finally
//! censored cells. Components that address points only by number rely on this layout, so every
//! mesh edit produces a new, contiguous [`MeshOrder`].
use crate::error::FaultError;
use std::ops::Range;

/// A half-open range `[start, end)` of point numbers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Hash)]
pub struct PointRange {
    start: usize,
    end: usize,
}

impl PointRange {
    /// A range whose bounds are ordered by construction. Use [`PointRange::try_new`] for
    /// bounds that are not.
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "range start must not exceed end");
        Self { start, end }
    }

    pub fn try_new(start: usize, end: usize) -> Result<Self, FaultError> {
        if start <= end {
            Ok(Self { start, end })
        } else {
            Err(FaultError::invariant(format!(
                "point range start {} exceeds end {}",
                start, end
            )))
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, point: usize) -> bool {
        self.start <= point && point < self.end
    }

    pub fn iter(&self) -> Range<usize> {
        self.start..self.end
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PointCategory {
    NormalCell,
    NormalVertex,
    CensoredVertex,
    /// Cohesive cells, excluded from the normal traversal of the mesh.
    CensoredCell,
}

impl PointCategory {
    pub fn is_cell(&self) -> bool {
        matches!(self, Self::NormalCell | Self::CensoredCell)
    }

    pub fn is_vertex(&self) -> bool {
        !self.is_cell()
    }

    pub fn is_censored(&self) -> bool {
        matches!(self, Self::CensoredVertex | Self::CensoredCell)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MeshOrder {
    normal_cells: PointRange,
    normal_vertices: PointRange,
    censored_vertices: PointRange,
    censored_cells: PointRange,
}

impl MeshOrder {
    /// Lays out the four categories back to back, starting at point zero.
    pub fn new(
        num_normal_cells: usize,
        num_normal_vertices: usize,
        num_censored_vertices: usize,
        num_censored_cells: usize,
    ) -> Self {
        let a = num_normal_cells;
        let b = a + num_normal_vertices;
        let c = b + num_censored_vertices;
        let d = c + num_censored_cells;
        Self {
            normal_cells: PointRange::new(0, a),
            normal_vertices: PointRange::new(a, b),
            censored_vertices: PointRange::new(b, c),
            censored_cells: PointRange::new(c, d),
        }
    }

    /// Builds an order from explicit ranges, failing unless they tile `[0, n)` in the
    /// canonical order.
    pub fn from_ranges(
        normal_cells: PointRange,
        normal_vertices: PointRange,
        censored_vertices: PointRange,
        censored_cells: PointRange,
    ) -> Result<Self, FaultError> {
        let order = Self {
            normal_cells,
            normal_vertices,
            censored_vertices,
            censored_cells,
        };
        if order.is_contiguous_partition() {
            Ok(order)
        } else {
            Err(FaultError::invariant(format!("point ranges {:?} are not contiguous", order)))
        }
    }

    pub fn normal_cells(&self) -> PointRange {
        self.normal_cells
    }

    pub fn normal_vertices(&self) -> PointRange {
        self.normal_vertices
    }

    pub fn censored_vertices(&self) -> PointRange {
        self.censored_vertices
    }

    pub fn censored_cells(&self) -> PointRange {
        self.censored_cells
    }

    pub fn ranges(&self) -> [PointRange; 4] {
        [
            self.normal_cells,
            self.normal_vertices,
            self.censored_vertices,
            self.censored_cells,
        ]
    }

    pub fn num_points(&self) -> usize {
        self.censored_cells.end
    }

    pub fn num_cells(&self) -> usize {
        self.normal_cells.len() + self.censored_cells.len()
    }

    pub fn num_vertices(&self) -> usize {
        self.normal_vertices.len() + self.censored_vertices.len()
    }

    pub fn has_censored_points(&self) -> bool {
        !self.censored_vertices.is_empty() || !self.censored_cells.is_empty()
    }

    /// Whether the ranges are pairwise disjoint, each contiguous, and together cover
    /// `[0, num_points)`.
    pub fn is_contiguous_partition(&self) -> bool {
        let ranges = self.ranges();
        ranges[0].start == 0 && ranges.windows(2).all(|pair| pair[0].end == pair[1].start)
    }

    pub fn category(&self, point: usize) -> Option<PointCategory> {
        if point < self.normal_cells.end {
            Some(PointCategory::NormalCell)
        } else if point < self.normal_vertices.end {
            Some(PointCategory::NormalVertex)
        } else if point < self.censored_vertices.end {
            Some(PointCategory::CensoredVertex)
        } else if point < self.censored_cells.end {
            Some(PointCategory::CensoredCell)
        } else {
            None
        }
    }

    pub fn is_cell(&self, point: usize) -> bool {
        self.category(point).map_or(false, |c| c.is_cell())
    }

    pub fn is_vertex(&self, point: usize) -> bool {
        self.category(point).map_or(false, |c| c.is_vertex())
    }

    /// Position of a cell among all cells, normal cells first.
    pub fn cell_slot(&self, point: usize) -> Option<usize> {
        match self.category(point)? {
            PointCategory::NormalCell => Some(point),
            PointCategory::CensoredCell => Some(self.normal_cells.len() + point - self.censored_cells.start),
            _ => None,
        }
    }

    /// Position of a vertex among all vertices, normal vertices first.
    pub fn vertex_slot(&self, point: usize) -> Option<usize> {
        match self.category(point)? {
            PointCategory::NormalVertex | PointCategory::CensoredVertex => Some(point - self.normal_vertices.start),
            _ => None,
        }
    }

    pub fn cell_point(&self, slot: usize) -> Option<usize> {
        if slot < self.normal_cells.len() {
            Some(slot)
        } else if slot < self.num_cells() {
            Some(self.censored_cells.start + slot - self.normal_cells.len())
        } else {
            None
        }
    }

    pub fn vertex_point(&self, slot: usize) -> Option<usize> {
        (slot < self.num_vertices()).then(|| self.normal_vertices.start + slot)
    }

    /// All cell points, normal cells first.
    pub fn cells(&self) -> impl Iterator<Item = usize> {
        self.normal_cells.iter().chain(self.censored_cells.iter())
    }

    /// All vertex points, normal vertices first.
    pub fn vertices(&self) -> Range<usize> {
        self.normal_vertices.start..self.censored_vertices.end
    }
}
