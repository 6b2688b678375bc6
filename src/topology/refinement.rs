//! Functionality and abstractions for mesh refinement.
//!
//! Currently we only provide uniform refinement of triangles and quadrilaterals through
//! [`refine_mesh`] and [`UniformRefinement`]. Refined meshes are numbered like any other mesh:
//! cells first (the children of a cell are consecutive), then the original vertices, then the
//! new vertices in the order of [`RefinedVertex`].
use crate::allocators::DimAllocator;
use crate::error::FaultError;
use crate::topology::overlap::{match_derived_points, renumber_overlap, Communicator, DerivedKey};
use crate::topology::refinement::detail::{refine_quadrilateral, refine_triangle, vertex, RefinedVertex};
use crate::topology::{CellShape, Label, Mesh, MeshOrder, CENSORED_DEPTH_LABEL, DEPTH_LABEL};
use crate::Real;
use log::info;
use nalgebra::{DefaultAllocator, DimName};
use std::collections::BTreeMap;

pub mod detail;

const EDGE_MIDPOINT_KEY: usize = 0;

/// Defines a refinement scheme for each cell shape.
pub trait RefineCell {
    /// Appends the children of a cell, given by shape and refined vertices.
    fn refine_cell(
        &self,
        cell: usize,
        shape: CellShape,
        cone: &[usize],
        children: &mut Vec<(CellShape, Vec<RefinedVertex>)>,
    ) -> Result<(), FaultError>;
}

pub struct UniformRefinement;

impl RefineCell for UniformRefinement {
    fn refine_cell(
        &self,
        cell: usize,
        shape: CellShape,
        cone: &[usize],
        children: &mut Vec<(CellShape, Vec<RefinedVertex>)>,
    ) -> Result<(), FaultError> {
        match (shape, cone) {
            (CellShape::Triangle, &[a, b, c]) => {
                children.extend(
                    refine_triangle([a, b, c])
                        .into_iter()
                        .map(|child| (CellShape::Triangle, child.to_vec())),
                );
                Ok(())
            }
            (CellShape::Quadrilateral, &[a, b, c, d]) => {
                children.extend(
                    refine_quadrilateral([a, b, c, d], cell)
                        .into_iter()
                        .map(|child| (CellShape::Quadrilateral, child.to_vec())),
                );
                Ok(())
            }
            _ => Err(FaultError::not_implemented(format!(
                "uniform refinement of {:?} cells",
                shape
            ))),
        }
    }
}

/// Refine a mesh with the provided refinement scheme.
///
/// Labels carry over: a child cell inherits the values of its parent, an edge midpoint the
/// common value of both end points, and a cell center the value of its cell.
pub fn refine_mesh<T, D, R>(mesh: &Mesh<T, D>, scheme: &R, comm: &dyn Communicator) -> Result<Mesh<T, D>, FaultError>
where
    T: Real,
    D: DimName,
    R: RefineCell,
    DefaultAllocator: DimAllocator<T, D>,
{
    if mesh.order().has_censored_points() {
        return Err(FaultError::not_implemented("refinement of meshes with censored points"));
    }

    let mut children = Vec::new();
    let mut parents = Vec::new();
    for cell in mesh.cells() {
        let shape = mesh
            .cell_shape(cell)
            .ok_or_else(|| FaultError::invariant(format!("cell {} has no shape", cell)))?;
        let num_before = children.len();
        scheme.refine_cell(cell, shape, mesh.cone(cell), &mut children)?;
        parents.extend(std::iter::repeat(cell).take(children.len() - num_before));
    }

    let num_cells = children.len();
    let mut vertex_numbers: BTreeMap<RefinedVertex, usize> = mesh
        .vertices()
        .map(|v| (vertex(v), 0))
        .collect();
    for (_, child) in &children {
        for refined_vertex in child {
            vertex_numbers.insert(*refined_vertex, 0);
        }
    }
    for (idx, number) in vertex_numbers.values_mut().enumerate() {
        *number = num_cells + idx;
    }

    let order = MeshOrder::new(num_cells, vertex_numbers.len(), 0, 0);
    let mut shapes = Vec::with_capacity(num_cells);
    let mut cones = Vec::with_capacity(num_cells);
    for (shape, child) in &children {
        shapes.push(*shape);
        cones.push(child.iter().map(|v| vertex_numbers[v]).collect());
    }
    let coordinates = vertex_numbers
        .keys()
        .map(|refined_vertex| refined_vertex.construct_vertex(mesh))
        .collect::<Result<Vec<_>, _>>()?;

    let mut labels = BTreeMap::new();
    for (name, label) in mesh.labels() {
        if name == DEPTH_LABEL || name == CENSORED_DEPTH_LABEL {
            continue;
        }
        let mut refined = Label::new();
        for (child, &parent) in parents.iter().enumerate() {
            if let Some(value) = label.value(parent) {
                refined.insert(child, value);
            }
        }
        for (refined_vertex, &number) in &vertex_numbers {
            let value = match refined_vertex {
                RefinedVertex::Vertex(v) => label.value(*v),
                RefinedVertex::EdgeMidpoint(edge) => {
                    let [a, b] = edge.vertices();
                    label.value(a).filter(|value| label.value(b) == Some(*value))
                }
                RefinedVertex::CellCenter(cell) => label.value(*cell),
            };
            if let Some(value) = value {
                refined.insert(number, value);
            }
        }
        labels.insert(name.clone(), refined);
    }

    let old_overlap = mesh.overlap();
    let mut overlap = renumber_overlap(
        old_overlap,
        |point| vertex_numbers.get(&vertex(point)).copied(),
        comm,
    )?;
    let midpoints: BTreeMap<DerivedKey, usize> = vertex_numbers
        .iter()
        .filter_map(|(refined_vertex, &number)| match refined_vertex {
            RefinedVertex::EdgeMidpoint(edge) => {
                Some((DerivedKey::new(EDGE_MIDPOINT_KEY, edge.vertices().to_vec()), number))
            }
            _ => None,
        })
        .collect();
    match_derived_points(&mut overlap, old_overlap, &midpoints, comm)?;

    info!(
        "Refined mesh from {} to {} cells and {} to {} vertices",
        mesh.order().num_cells(),
        num_cells,
        mesh.order().num_vertices(),
        vertex_numbers.len()
    );
    Mesh::from_parts(order, shapes, cones, coordinates, labels, overlap)
}

/// Apply one round of uniform mesh refinement.
///
/// This is a convenience function for `refine_mesh(mesh, &UniformRefinement, comm)`.
pub fn refine_uniformly<T, D>(mesh: &Mesh<T, D>, comm: &dyn Communicator) -> Result<Mesh<T, D>, FaultError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    refine_mesh(mesh, &UniformRefinement, comm)
}

/// Repeatedly applies uniform mesh refinement to the given mesh.
pub fn refine_uniformly_repeat<T, D>(
    mesh: &Mesh<T, D>,
    repeat_times: usize,
    comm: &dyn Communicator,
) -> Result<Mesh<T, D>, FaultError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    let mut mesh = mesh.clone();
    for _ in 0..repeat_times {
        mesh = refine_uniformly(&mesh, comm)?;
    }
    Ok(mesh)
}
