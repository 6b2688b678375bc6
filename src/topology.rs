//! Uninterpolated mesh topology: cells, vertices and labels over a contiguous point numbering.
//!
//! A [`Mesh`] stores the cone (vertices) of every cell and the support (cells) of every vertex.
//! Topology edits never mutate a mesh in place. [`cohesive::adjust_topology`] and
//! [`refinement::refine_uniformly`] both return a new mesh.
use crate::allocators::DimAllocator;
use crate::error::FaultError;
use crate::Real;
use nalgebra::{DefaultAllocator, DimName, OPoint, OVector, Vector3};
use std::collections::{BTreeMap, BTreeSet};

pub mod cell;
pub mod cohesive;
pub mod order;
pub mod overlap;
pub mod procedural;
pub mod refinement;

pub use cell::CellShape;
pub use order::{MeshOrder, PointCategory, PointRange};
pub use overlap::Overlap;

/// Cells of a fault carry the fault id under this label.
pub const MATERIAL_ID_LABEL: &str = "material-id";
/// Depth of normal points: vertices have depth 0 and cells depth 1.
pub const DEPTH_LABEL: &str = "depth";
/// Depth of censored points, kept apart from the normal strata.
pub const CENSORED_DEPTH_LABEL: &str = "censored depth";

/// A map from mesh points to integer values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Label {
    values: BTreeMap<usize, i32>,
}

impl Label {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: impl IntoIterator<Item = usize>, value: i32) -> Self {
        Self {
            values: points.into_iter().map(|p| (p, value)).collect(),
        }
    }

    pub fn insert(&mut self, point: usize, value: i32) {
        self.values.insert(point, value);
    }

    pub fn value(&self, point: usize) -> Option<i32> {
        self.values.get(&point).copied()
    }

    pub fn contains(&self, point: usize) -> bool {
        self.values.contains_key(&point)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All labelled points in increasing order.
    pub fn points(&self) -> impl Iterator<Item = usize> + '_ {
        self.values.keys().copied()
    }

    /// Labelled points with the given value, in increasing order.
    pub fn stratum(&self, value: i32) -> impl Iterator<Item = usize> + '_ {
        self.values
            .iter()
            .filter(move |(_, v)| **v == value)
            .map(|(p, _)| *p)
    }

    pub fn values(&self) -> BTreeSet<i32> {
        self.values.values().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, i32)> + '_ {
        self.values.iter().map(|(p, v)| (*p, *v))
    }
}

/// Compressed incidence lists, one list per slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Incidence {
    offsets: Vec<usize>,
    points: Vec<usize>,
}

impl Incidence {
    fn from_lists<'a>(lists: impl IntoIterator<Item = &'a [usize]>) -> Self {
        let mut offsets = vec![0];
        let mut points = Vec::new();
        for list in lists {
            points.extend_from_slice(list);
            offsets.push(points.len());
        }
        Self { offsets, points }
    }

    fn get(&self, slot: usize) -> &[usize] {
        match (self.offsets.get(slot), self.offsets.get(slot + 1)) {
            (Some(&begin), Some(&end)) => &self.points[begin..end],
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    order: MeshOrder,
    /// Cones indexed by cell slot.
    cones: Incidence,
    /// Supports indexed by vertex slot.
    supports: Incidence,
    shapes: Vec<CellShape>,
    coordinates: Vec<OPoint<T, D>>,
    labels: BTreeMap<String, Label>,
    overlap: Overlap,
}

impl<T, D> Mesh<T, D>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Creates a mesh of cells of a single shape.
    ///
    /// Cells are given by zero-based vertex indices. Cells are numbered first, so vertex `i`
    /// becomes point `cells.len() + i`.
    pub fn from_vertices_and_cells(
        vertices: Vec<OPoint<T, D>>,
        cells: Vec<Vec<usize>>,
        shape: CellShape,
    ) -> Result<Self, FaultError> {
        let cells = cells.into_iter().map(|cell| (shape, cell)).collect();
        Self::from_vertices_and_mixed_cells(vertices, cells)
    }

    pub fn from_vertices_and_mixed_cells(
        vertices: Vec<OPoint<T, D>>,
        cells: Vec<(CellShape, Vec<usize>)>,
    ) -> Result<Self, FaultError> {
        let num_cells = cells.len();
        let order = MeshOrder::new(num_cells, vertices.len(), 0, 0);
        let mut shapes = Vec::with_capacity(num_cells);
        let mut cones = Vec::with_capacity(num_cells);
        for (cell_idx, (shape, vertex_indices)) in cells.into_iter().enumerate() {
            if let Some(&idx) = vertex_indices.iter().find(|&&idx| idx >= vertices.len()) {
                return Err(FaultError::topology(
                    format!("cell {} references vertex index {} out of bounds", cell_idx, idx),
                    [cell_idx],
                ));
            }
            shapes.push(shape);
            cones.push(vertex_indices.iter().map(|idx| num_cells + idx).collect());
        }
        Self::from_parts(order, shapes, cones, vertices, BTreeMap::new(), Overlap::default())
    }

    /// Assembles a mesh from raw parts, validating cones against the order and recomputing
    /// supports and strata.
    ///
    /// `shapes` and `cones` are indexed by cell slot, `coordinates` by vertex slot. Cohesive
    /// (censored) cells store the shape of their fault face and a cone three times its size.
    pub fn from_parts(
        order: MeshOrder,
        shapes: Vec<CellShape>,
        cones: Vec<Vec<usize>>,
        coordinates: Vec<OPoint<T, D>>,
        labels: BTreeMap<String, Label>,
        overlap: Overlap,
    ) -> Result<Self, FaultError> {
        if !order.is_contiguous_partition() {
            return Err(FaultError::invariant("mesh order is not a contiguous partition"));
        }
        if shapes.len() != order.num_cells() || cones.len() != order.num_cells() {
            return Err(FaultError::invariant(format!(
                "expected {} cells, got {} shapes and {} cones",
                order.num_cells(),
                shapes.len(),
                cones.len()
            )));
        }
        if coordinates.len() != order.num_vertices() {
            return Err(FaultError::invariant(format!(
                "expected {} vertex coordinates, got {}",
                order.num_vertices(),
                coordinates.len()
            )));
        }

        let mut supports = vec![Vec::new(); order.num_vertices()];
        for (slot, (shape, cone)) in shapes.iter().zip(&cones).enumerate() {
            let cell = order
                .cell_point(slot)
                .ok_or_else(|| FaultError::invariant("cell slot outside order"))?;
            let expected_len = if order.censored_cells().contains(cell) {
                3 * shape.num_vertices()
            } else {
                shape.num_vertices()
            };
            if cone.len() != expected_len {
                return Err(FaultError::topology(
                    format!(
                        "cell {} of shape {:?} has {} vertices, expected {}",
                        cell,
                        shape,
                        cone.len(),
                        expected_len
                    ),
                    [cell],
                ));
            }
            for &vertex in cone {
                let vertex_slot = order.vertex_slot(vertex).ok_or_else(|| {
                    FaultError::topology(format!("cone of cell {} contains non-vertex point {}", cell, vertex), [cell, vertex])
                })?;
                supports[vertex_slot].push(cell);
            }
        }

        let mut mesh = Self {
            order,
            cones: Incidence::from_lists(cones.iter().map(Vec::as_slice)),
            supports: Incidence::from_lists(supports.iter().map(Vec::as_slice)),
            shapes,
            coordinates,
            labels,
            overlap,
        };
        mesh.stratify();
        Ok(mesh)
    }

    /// Recomputes the depth labels from the point order.
    fn stratify(&mut self) {
        let mut depth = Label::new();
        let mut censored_depth = Label::new();
        for p in self.order.normal_vertices().iter() {
            depth.insert(p, 0);
        }
        for p in self.order.normal_cells().iter() {
            depth.insert(p, 1);
        }
        for p in self.order.censored_vertices().iter() {
            censored_depth.insert(p, 0);
        }
        for p in self.order.censored_cells().iter() {
            censored_depth.insert(p, 1);
        }
        self.labels.insert(DEPTH_LABEL.to_string(), depth);
        if censored_depth.is_empty() {
            self.labels.remove(CENSORED_DEPTH_LABEL);
        } else {
            self.labels
                .insert(CENSORED_DEPTH_LABEL.to_string(), censored_depth);
        }
    }

    pub fn order(&self) -> &MeshOrder {
        &self.order
    }

    pub fn num_points(&self) -> usize {
        self.order.num_points()
    }

    /// Normal cells, in increasing order.
    pub fn cells(&self) -> std::ops::Range<usize> {
        self.order.normal_cells().iter()
    }

    /// Censored cells, which are the cohesive cells of inserted faults.
    pub fn cohesive_cells(&self) -> std::ops::Range<usize> {
        self.order.censored_cells().iter()
    }

    /// All vertices, normal vertices first.
    pub fn vertices(&self) -> std::ops::Range<usize> {
        self.order.vertices()
    }

    /// Spatial dimension of the mesh.
    pub fn dim(&self) -> usize {
        D::dim()
    }

    /// Vertices of a cell, empty for any other point.
    pub fn cone(&self, point: usize) -> &[usize] {
        match self.order.cell_slot(point) {
            Some(slot) => self.cones.get(slot),
            None => &[],
        }
    }

    /// Cells containing a vertex, empty for any other point.
    pub fn support(&self, point: usize) -> &[usize] {
        match self.order.vertex_slot(point) {
            Some(slot) => self.supports.get(slot),
            None => &[],
        }
    }

    /// Shape of a normal cell, or the fault-face shape of a cohesive cell.
    pub fn cell_shape(&self, cell: usize) -> Option<CellShape> {
        self.order
            .cell_slot(cell)
            .map(|slot| self.shapes[slot])
    }

    pub fn vertex_coordinates(&self, vertex: usize) -> Option<&OPoint<T, D>> {
        self.order
            .vertex_slot(vertex)
            .map(|slot| &self.coordinates[slot])
    }

    /// Coordinates of all vertices, indexed by vertex slot.
    pub fn coordinates(&self) -> &[OPoint<T, D>] {
        &self.coordinates
    }

    pub fn try_vertex_coordinates(&self, vertex: usize) -> Result<&OPoint<T, D>, FaultError> {
        self.vertex_coordinates(vertex)
            .ok_or_else(|| FaultError::invariant(format!("point {} is not a vertex", vertex)))
    }

    /// Average of the vertex coordinates of a normal cell.
    pub fn cell_centroid(&self, cell: usize) -> Result<OPoint<T, D>, FaultError> {
        centroid(self, self.cone(cell))
    }

    pub fn labels(&self) -> &BTreeMap<String, Label> {
        &self.labels
    }

    pub fn label(&self, name: &str) -> Option<&Label> {
        self.labels.get(name)
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    /// Adds or replaces a label. The strata labels are owned by the mesh and cannot be set.
    pub fn set_label(&mut self, name: impl Into<String>, label: Label) -> Result<(), FaultError> {
        let name = name.into();
        if name == DEPTH_LABEL || name == CENSORED_DEPTH_LABEL {
            return Err(FaultError::configuration(format!("label '{}' is reserved", name)));
        }
        self.labels.insert(name, label);
        Ok(())
    }

    pub fn with_label(mut self, name: impl Into<String>, label: Label) -> Result<Self, FaultError> {
        self.set_label(name, label)?;
        Ok(self)
    }

    /// Normal points of the given depth (0 for vertices, 1 for cells).
    pub fn depth_stratum(&self, depth: i32) -> Vec<usize> {
        self.labels
            .get(DEPTH_LABEL)
            .map(|label| label.stratum(depth).collect())
            .unwrap_or_default()
    }

    /// Normal points of the given height (0 for cells, 1 for vertices).
    pub fn height_stratum(&self, height: i32) -> Vec<usize> {
        self.depth_stratum(1 - height)
    }

    /// Cells whose `material-id` label value equals `id`.
    pub fn cells_with_material_id(&self, id: i32) -> Vec<usize> {
        self.labels
            .get(MATERIAL_ID_LABEL)
            .map(|label| {
                label
                    .stratum(id)
                    .filter(|&p| self.order.is_cell(p))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn overlap(&self) -> &Overlap {
        &self.overlap
    }

    pub fn set_overlap(&mut self, overlap: Overlap) {
        self.overlap = overlap;
    }

    /// Decomposes the mesh into the parts accepted by [`Mesh::from_parts`].
    pub(crate) fn cones_by_slot(&self) -> Vec<Vec<usize>> {
        (0..self.order.num_cells())
            .map(|slot| self.cones.get(slot).to_vec())
            .collect()
    }

    pub(crate) fn shapes_by_slot(&self) -> &[CellShape] {
        &self.shapes
    }
}

/// Average of the coordinates of the given vertices.
pub fn centroid<T, D>(mesh: &Mesh<T, D>, vertices: &[usize]) -> Result<OPoint<T, D>, FaultError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    if vertices.is_empty() {
        return Err(FaultError::invariant("centroid of an empty vertex set"));
    }
    let mut sum = OVector::<T, D>::zeros();
    for &v in vertices {
        sum += &mesh.try_vertex_coordinates(v)?.coords;
    }
    let n = T::from_usize(vertices.len()).ok_or_else(|| FaultError::invariant("vertex count does not fit in T"))?;
    Ok(OPoint::from(sum / n))
}

/// Area-weighted normal of a fault face with oriented vertex coordinates.
///
/// The length of the returned vector is the measure (length or area) of the face. In 2D the
/// normal of segment `[a, b]` is the tangent `b - a` rotated clockwise.
pub fn face_normal<T, D>(shape: CellShape, coords: &[&OPoint<T, D>]) -> Result<OVector<T, D>, FaultError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    let mut normal = OVector::<T, D>::zeros();
    match (D::dim(), shape, coords) {
        (2, CellShape::Segment, [a, b]) => {
            let t = &b.coords - &a.coords;
            normal[0] = t[1];
            normal[1] = -t[0];
        }
        (3, CellShape::Triangle, [a, b, c]) => {
            let n = to_vector3(&(&b.coords - &a.coords)).cross(&to_vector3(&(&c.coords - &a.coords)));
            let half = T::from_f64(0.5).ok_or_else(|| FaultError::invariant("0.5 does not fit in T"))?;
            for i in 0..3 {
                normal[i] = n[i] * half;
            }
        }
        (3, CellShape::Quadrilateral, [a, b, c, d]) => {
            let n = to_vector3(&(&c.coords - &a.coords)).cross(&to_vector3(&(&d.coords - &b.coords)));
            let half = T::from_f64(0.5).ok_or_else(|| FaultError::invariant("0.5 does not fit in T"))?;
            for i in 0..3 {
                normal[i] = n[i] * half;
            }
        }
        _ => {
            return Err(FaultError::not_implemented(format!(
                "fault faces of shape {:?} with {} vertices in {} dimensions",
                shape,
                coords.len(),
                D::dim()
            )))
        }
    }
    Ok(normal)
}

fn to_vector3<T, D>(v: &OVector<T, D>) -> Vector3<T>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    Vector3::new(v[0], v[1], v[2])
}
