//! Insertion of cohesive cells along fault surfaces.
//!
//! A fault is given as a vertex label. Every codimension-1 face with all of its vertices in the
//! label is a fault face. Inserting the fault splits the mesh along those faces:
//!
//! - each fault vertex gets a duplicate, used by the cells on the positive side of the fault,
//! - each fault vertex gets a Lagrange-multiplier vertex (a censored vertex),
//! - each fault face gets a cohesive cell (a censored cell) whose cone is the negative face,
//!   then the positive face, then the Lagrange vertices.
//!
//! Fault faces are oriented consistently, and the normal of each face points from its negative
//! to its positive side.
use crate::allocators::DimAllocator;
use crate::error::FaultError;
use crate::topology::overlap::{all_gather, match_derived_points, Communicator, DerivedKey, SerialCommunicator};
use crate::topology::{
    centroid, face_normal, CellShape, Label, Mesh, MeshOrder, CENSORED_DEPTH_LABEL, DEPTH_LABEL, MATERIAL_ID_LABEL,
};
use crate::Real;
use itertools::Itertools;
use log::{debug, info, warn};
use nalgebra::{DefaultAllocator, DimName};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A fault to insert: the vertex label defining its surface and the material id given to its
/// cohesive cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultInsertion {
    pub label: String,
    pub id: i32,
}

impl FaultInsertion {
    pub fn new(label: impl Into<String>, id: i32) -> Self {
        Self {
            label: label.into(),
            id,
        }
    }
}

const DUPLICATE_KEY: usize = 0;
const LAGRANGE_KEY: usize = 1;

/// Sorted vertices of a face.
type FaceKey = Vec<usize>;

#[derive(Debug, Clone)]
struct FaceAdjacency {
    /// Vertices in the order of the first cell that contains the face.
    vertices: Vec<usize>,
    shape: CellShape,
    cells: Vec<usize>,
}

/// A fault face with its vertices oriented and its two adjacent cells classified.
#[derive(Debug, Clone)]
struct FaultFace {
    vertices: Vec<usize>,
    shape: CellShape,
    negative: usize,
    positive: usize,
}

/// Everything needed to rebuild the mesh for a single fault.
#[derive(Debug, Clone)]
struct SplitFault {
    id: i32,
    faces: Vec<FaultFace>,
    /// Positive-side cells of each fault vertex.
    positive_cells: BTreeMap<usize, BTreeSet<usize>>,
}

/// Inserts cohesive cells for a single fault in an unpartitioned mesh.
pub fn adjust<T, D>(mesh: &Mesh<T, D>, fault: &FaultInsertion) -> Result<Mesh<T, D>, FaultError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    adjust_topology(mesh, std::slice::from_ref(fault), &SerialCommunicator)
}

/// Inserts cohesive cells for each fault, returning the new mesh.
///
/// Original points keep their numbers. New points are numbered after them: duplicated
/// vertices of each fault in turn, then Lagrange vertices (censored), then cohesive cells
/// (censored). The input mesh is left untouched.
///
/// This is collective over `comm`. A partition holding no part of a fault leaves it out,
/// but every fault must have a face on some rank. When the local checks fail on any rank, all
/// ranks return an error.
pub fn adjust_topology<T, D>(
    mesh: &Mesh<T, D>,
    faults: &[FaultInsertion],
    comm: &dyn Communicator,
) -> Result<Mesh<T, D>, FaultError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    let local = split_local(mesh, faults, comm.size() > 1);

    // Status followed by the number of local faces of each fault
    let summary = match &local {
        Ok(splits) => std::iter::once(1)
            .chain(splits.iter().map(|split| split.faces.len()))
            .collect(),
        Err(_) => vec![0],
    };
    let gathered = all_gather(comm, summary)?;
    let split_faults = local?;
    if let Some(rank) = gathered.iter().position(|message| message.first() != Some(&1)) {
        return Err(FaultError::communication(format!(
            "cohesive cell insertion failed on rank {}",
            rank
        )));
    }
    for (index, fault) in faults.iter().enumerate() {
        let total: usize = gathered
            .iter()
            .map(|message| message.get(index + 1).copied().unwrap_or(0))
            .sum();
        if total == 0 {
            return Err(FaultError::configuration(format!(
                "fault label '{}' does not contain any face",
                fault.label
            )));
        }
    }

    let adjusted = build_adjusted_mesh(mesh, &split_faults, comm)?;
    for (fault, split) in faults.iter().zip(&split_faults) {
        info!(
            "Inserted fault '{}' (id {}): {} cohesive cells, {} split vertices",
            fault.label,
            fault.id,
            split.faces.len(),
            split.positive_cells.len()
        );
    }
    Ok(adjusted)
}

/// The local part of the insertion. With `allow_empty`, a fault without vertices or faces in
/// this partition gives an empty split.
fn split_local<T, D>(mesh: &Mesh<T, D>, faults: &[FaultInsertion], allow_empty: bool) -> Result<Vec<SplitFault>, FaultError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    if mesh.order().has_censored_points() {
        return Err(FaultError::not_implemented(
            "cohesive cell insertion into a mesh that already has censored points",
        ));
    }
    if let Some(cell) = mesh
        .cells()
        .find(|&c| mesh.cell_shape(c).map(|s| s.dim()) != Some(D::dim()))
    {
        return Err(FaultError::not_implemented(format!(
            "cohesive cell insertion with cell {} whose dimension differs from the spatial dimension {}",
            cell,
            D::dim()
        )));
    }

    let fault_vertex_sets = collect_fault_vertices(mesh, faults, allow_empty)?;
    let face_map = build_face_map(mesh)?;

    let mut split_faults = Vec::with_capacity(faults.len());
    for (fault, vertices) in faults.iter().zip(&fault_vertex_sets) {
        let mut candidates = collect_fault_faces(&face_map, vertices, fault, allow_empty)?;
        orient_faces(mesh, &mut candidates)?;
        let faces = classify_sides(mesh, candidates)?;
        let positive_cells = find_positive_cells(mesh, &face_map, &faces)?;

        let touched: BTreeSet<usize> = positive_cells.keys().copied().collect();
        let untouched = vertices.difference(&touched).count();
        if untouched > 0 {
            warn!(
                "{} vertices of fault label '{}' are not on any fault face and will not be split",
                untouched, fault.label
            );
        }

        split_faults.push(SplitFault {
            id: fault.id,
            faces,
            positive_cells,
        });
    }
    Ok(split_faults)
}

fn collect_fault_vertices<T, D>(
    mesh: &Mesh<T, D>,
    faults: &[FaultInsertion],
    allow_empty: bool,
) -> Result<Vec<BTreeSet<usize>>, FaultError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    let mut ids = BTreeSet::new();
    let mut owner_of_vertex: BTreeMap<usize, &str> = BTreeMap::new();
    let mut vertex_sets = Vec::with_capacity(faults.len());
    for fault in faults {
        if !ids.insert(fault.id) {
            return Err(FaultError::configuration(format!("duplicate fault id {}", fault.id)));
        }
        if !mesh.cells_with_material_id(fault.id).is_empty() {
            return Err(FaultError::configuration(format!(
                "fault id {} of '{}' is already used as a material id",
                fault.id, fault.label
            )));
        }
        let vertices: BTreeSet<usize> = match mesh.label(&fault.label) {
            Some(label) => label
                .points()
                .filter(|&p| mesh.order().is_vertex(p))
                .collect(),
            None if allow_empty => BTreeSet::new(),
            None => {
                return Err(FaultError::configuration(format!(
                    "mesh has no fault label '{}'",
                    fault.label
                )))
            }
        };
        if vertices.is_empty() && !allow_empty {
            return Err(FaultError::configuration(format!(
                "fault label '{}' contains no vertices",
                fault.label
            )));
        }
        for &v in &vertices {
            if let Some(other) = owner_of_vertex.insert(v, &fault.label) {
                return Err(FaultError::topology(
                    format!("faults '{}' and '{}' share a vertex", other, fault.label),
                    [v],
                ));
            }
        }
        vertex_sets.push(vertices);
    }
    Ok(vertex_sets)
}

fn build_face_map<T, D>(mesh: &Mesh<T, D>) -> Result<BTreeMap<FaceKey, FaceAdjacency>, FaultError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    let mut faces: BTreeMap<FaceKey, FaceAdjacency> = BTreeMap::new();
    for cell in mesh.cells() {
        let shape = mesh
            .cell_shape(cell)
            .ok_or_else(|| FaultError::invariant(format!("cell {} has no shape", cell)))?;
        let face_shape = shape
            .face_shape()
            .ok_or_else(|| FaultError::not_implemented(format!("faults in meshes of {:?} cells", shape)))?;
        let cone = mesh.cone(cell);
        for local_face in shape.faces() {
            let vertices: Vec<usize> = local_face.iter().map(|&i| cone[i]).collect();
            let key: FaceKey = vertices.iter().copied().sorted().collect();
            faces
                .entry(key)
                .or_insert_with(|| FaceAdjacency {
                    vertices,
                    shape: face_shape,
                    cells: Vec::new(),
                })
                .cells
                .push(cell);
        }
    }
    Ok(faces)
}

#[derive(Debug, Clone)]
struct CandidateFace {
    vertices: Vec<usize>,
    shape: CellShape,
    cells: [usize; 2],
}

fn collect_fault_faces(
    face_map: &BTreeMap<FaceKey, FaceAdjacency>,
    fault_vertices: &BTreeSet<usize>,
    fault: &FaultInsertion,
    allow_empty: bool,
) -> Result<Vec<CandidateFace>, FaultError> {
    let mut candidates = Vec::new();
    for (key, adjacency) in face_map {
        if !key.iter().all(|v| fault_vertices.contains(v)) {
            continue;
        }
        match adjacency.cells.as_slice() {
            &[a, b] => candidates.push(CandidateFace {
                vertices: adjacency.vertices.clone(),
                shape: adjacency.shape,
                cells: [a, b],
            }),
            &[cell] => {
                return Err(FaultError::topology(
                    format!(
                        "face of fault '{}' lies on the mesh boundary (cell {})",
                        fault.label, cell
                    ),
                    key.iter().copied(),
                ))
            }
            cells => {
                return Err(FaultError::topology(
                    format!(
                        "face of fault '{}' is shared by {} cells, the mesh is non-manifold",
                        fault.label,
                        cells.len()
                    ),
                    key.iter().copied(),
                ))
            }
        }
    }

    if candidates.is_empty() && !allow_empty {
        return Err(FaultError::configuration(format!(
            "fault label '{}' does not contain any face",
            fault.label
        )));
    }
    debug!("Fault '{}' has {} faces", fault.label, candidates.len());
    Ok(candidates)
}

/// Boundary facets of an oriented face with their induced signs.
///
/// Two faces sharing a facet are consistently oriented exactly when the facet has opposite
/// signs in them.
fn signed_facets(vertices: &[usize]) -> Vec<(Vec<usize>, i8)> {
    match vertices {
        &[a, b] => vec![(vec![a], -1), (vec![b], 1)],
        _ => (0..vertices.len())
            .map(|i| {
                let a = vertices[i];
                let b = vertices[(i + 1) % vertices.len()];
                let sign = if a < b { 1 } else { -1 };
                (vec![a.min(b), a.max(b)], sign)
            })
            .collect(),
    }
}

/// Reverses the orientation of a face while keeping its first vertex.
fn reverse_face(vertices: &mut [usize]) {
    if vertices.len() > 1 {
        vertices[1..].reverse();
    }
    if vertices.len() == 2 {
        vertices.swap(0, 1);
    }
}

/// Orientation convention of the first face of each connected component: the first
/// significant component of its normal is negative.
fn seed_needs_flip<T, D>(mesh: &Mesh<T, D>, face: &CandidateFace) -> Result<bool, FaultError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    let coords = face
        .vertices
        .iter()
        .map(|&v| mesh.try_vertex_coordinates(v))
        .collect::<Result<Vec<_>, _>>()?;
    let normal = face_normal(face.shape, &coords)?;
    let magnitude = normal.norm();
    let tolerance = T::from_f64(1e-8).ok_or_else(|| FaultError::invariant("tolerance does not fit in T"))? * magnitude;
    match normal.iter().find(|n| n.abs() > tolerance) {
        Some(n) => Ok(*n > T::zero()),
        None => Err(FaultError::topology("degenerate fault face", face.vertices.iter().copied())),
    }
}

fn orient_faces<T, D>(mesh: &Mesh<T, D>, faces: &mut [CandidateFace]) -> Result<(), FaultError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    let mut facet_map: FxHashMap<Vec<usize>, Vec<(usize, i8)>> = FxHashMap::default();
    for (face_idx, face) in faces.iter().enumerate() {
        for (facet, sign) in signed_facets(&face.vertices) {
            facet_map.entry(facet).or_default().push((face_idx, sign));
        }
    }
    let non_manifold = facet_map
        .iter()
        .filter(|(_, faces)| faces.len() > 2)
        .map(|(facet, _)| facet)
        .min();
    if let Some(facet) = non_manifold {
        return Err(FaultError::topology(
            "fault surface is non-manifold: more than two fault faces meet at a facet",
            facet.iter().copied(),
        ));
    }

    let mut flipped: Vec<Option<bool>> = vec![None; faces.len()];
    for seed in 0..faces.len() {
        if flipped[seed].is_some() {
            continue;
        }
        flipped[seed] = Some(seed_needs_flip(mesh, &faces[seed])?);
        let mut queue = VecDeque::from([seed]);
        while let Some(face_idx) = queue.pop_front() {
            let face_flipped = flipped[face_idx].unwrap_or(false);
            for (facet, sign) in signed_facets(&faces[face_idx].vertices) {
                let effective = if face_flipped { -sign } else { sign };
                let neighbors = facet_map.get(&facet).map(Vec::as_slice).unwrap_or(&[]);
                for &(other_idx, other_sign) in neighbors {
                    if other_idx == face_idx {
                        continue;
                    }
                    // The neighbor must induce the opposite sign on the shared facet
                    let needs_flip = other_sign == effective;
                    match flipped[other_idx] {
                        None => {
                            flipped[other_idx] = Some(needs_flip);
                            queue.push_back(other_idx);
                        }
                        Some(existing) if existing != needs_flip => {
                            return Err(FaultError::topology(
                                "fault surface is not orientable",
                                faces[other_idx].vertices.iter().copied(),
                            ));
                        }
                        Some(_) => {}
                    }
                }
            }
        }
    }

    for (face, flip) in faces.iter_mut().zip(flipped) {
        if flip == Some(true) {
            reverse_face(&mut face.vertices);
        }
    }
    Ok(())
}

fn classify_sides<T, D>(mesh: &Mesh<T, D>, candidates: Vec<CandidateFace>) -> Result<Vec<FaultFace>, FaultError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    candidates
        .into_iter()
        .map(|face| {
            let coords = face
                .vertices
                .iter()
                .map(|&v| mesh.try_vertex_coordinates(v))
                .collect::<Result<Vec<_>, _>>()?;
            let normal = face_normal(face.shape, &coords)?;
            let face_center = centroid(mesh, &face.vertices)?;
            let [a, b] = face.cells;
            let side_a = (mesh.cell_centroid(a)? - &face_center).dot(&normal);
            let side_b = (mesh.cell_centroid(b)? - &face_center).dot(&normal);
            let (positive, negative) = if side_a > T::zero() && side_b < T::zero() {
                (a, b)
            } else if side_b > T::zero() && side_a < T::zero() {
                (b, a)
            } else {
                let points = face.vertices.iter().copied().chain([a, b]);
                return Err(FaultError::topology(
                    "cells adjacent to a fault face are not on opposite sides of it",
                    points,
                ));
            };
            Ok(FaultFace {
                vertices: face.vertices,
                shape: face.shape,
                negative,
                positive,
            })
        })
        .collect()
}

/// Finds, for every vertex of the fault faces, the cells that must use its duplicate.
///
/// Starting from the positive cells of the fault faces around a vertex, the positive side grows
/// through faces that contain the vertex but are not fault faces. Reaching a negative cell means
/// that the fault ends inside the mesh at this vertex.
fn find_positive_cells<T, D>(
    mesh: &Mesh<T, D>,
    face_map: &BTreeMap<FaceKey, FaceAdjacency>,
    faces: &[FaultFace],
) -> Result<BTreeMap<usize, BTreeSet<usize>>, FaultError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    let fault_face_keys: BTreeSet<FaceKey> = faces
        .iter()
        .map(|face| face.vertices.iter().copied().sorted().collect())
        .collect();

    let mut seeds: BTreeMap<usize, (BTreeSet<usize>, BTreeSet<usize>)> = BTreeMap::new();
    for face in faces {
        for &v in &face.vertices {
            let (positive, negative) = seeds.entry(v).or_default();
            positive.insert(face.positive);
            negative.insert(face.negative);
        }
    }

    let mut positive_cells = BTreeMap::new();
    for (v, (positive_seeds, negative_seeds)) in seeds {
        if let Some(&cell) = positive_seeds.intersection(&negative_seeds).next() {
            return Err(FaultError::topology(
                "a cell lies on both sides of the fault",
                [v, cell],
            ));
        }

        let mut visited = positive_seeds.clone();
        let mut queue: VecDeque<usize> = positive_seeds.into_iter().collect();
        while let Some(cell) = queue.pop_front() {
            let shape = mesh
                .cell_shape(cell)
                .ok_or_else(|| FaultError::invariant(format!("cell {} has no shape", cell)))?;
            let cone = mesh.cone(cell);
            for local_face in shape.faces() {
                let key: FaceKey = local_face.iter().map(|&i| cone[i]).sorted().collect();
                if !key.contains(&v) || fault_face_keys.contains(&key) {
                    continue;
                }
                let neighbors = face_map.get(&key).map(|adj| adj.cells.as_slice()).unwrap_or(&[]);
                for &neighbor in neighbors {
                    if neighbor == cell {
                        continue;
                    }
                    if negative_seeds.contains(&neighbor) {
                        return Err(FaultError::not_implemented(format!(
                            "fault edges buried inside the mesh (fault ends at vertex {} without reaching the boundary)",
                            v
                        )));
                    }
                    if visited.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        positive_cells.insert(v, visited);
    }
    Ok(positive_cells)
}

fn build_adjusted_mesh<T, D>(
    mesh: &Mesh<T, D>,
    faults: &[SplitFault],
    comm: &dyn Communicator,
) -> Result<Mesh<T, D>, FaultError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    let old_order = mesh.order();
    let num_split: usize = faults.iter().map(|f| f.positive_cells.len()).sum();
    let num_cohesive: usize = faults.iter().map(|f| f.faces.len()).sum();
    let order = MeshOrder::new(
        old_order.normal_cells().len(),
        old_order.normal_vertices().len() + num_split,
        num_split,
        num_cohesive,
    );

    // Number the new points
    let mut duplicate_of = BTreeMap::new();
    let mut next = old_order.normal_vertices().end();
    for fault in faults {
        for &v in fault.positive_cells.keys() {
            duplicate_of.insert(v, next);
            next += 1;
        }
    }
    let mut lagrange_of = BTreeMap::new();
    for fault in faults {
        for &v in fault.positive_cells.keys() {
            lagrange_of.insert(v, next);
            next += 1;
        }
    }
    debug_assert_eq!(next, order.censored_cells().start());

    // Normal cells switch to duplicates on the positive side
    let mut cones = mesh.cones_by_slot();
    let mut shapes = mesh.shapes_by_slot().to_vec();
    for fault in faults {
        for (&v, cells) in &fault.positive_cells {
            let duplicate = duplicate_of[&v];
            for &cell in cells {
                for vertex in cones[cell].iter_mut().filter(|vertex| **vertex == v) {
                    *vertex = duplicate;
                }
            }
        }
    }

    let mut material_ids = mesh.label(MATERIAL_ID_LABEL).cloned().unwrap_or_default();
    let mut cohesive_cell = order.censored_cells().start();
    for fault in faults {
        for face in &fault.faces {
            let mut cone = face.vertices.clone();
            cone.extend(face.vertices.iter().map(|v| duplicate_of[v]));
            cone.extend(face.vertices.iter().map(|v| lagrange_of[v]));
            cones.push(cone);
            shapes.push(face.shape);
            material_ids.insert(cohesive_cell, fault.id);
            cohesive_cell += 1;
        }
    }

    // Duplicates and Lagrange vertices sit on top of their originals
    let mut coordinates = mesh.coordinates().to_vec();
    for _ in 0..2 {
        for fault in faults {
            for &v in fault.positive_cells.keys() {
                coordinates.push(mesh.try_vertex_coordinates(v)?.clone());
            }
        }
    }

    let mut labels = BTreeMap::new();
    for (name, label) in mesh.labels() {
        if name == DEPTH_LABEL || name == CENSORED_DEPTH_LABEL || name == MATERIAL_ID_LABEL {
            continue;
        }
        let mut adjusted = label.clone();
        for (&v, &duplicate) in &duplicate_of {
            if let Some(value) = label.value(v) {
                adjusted.insert(duplicate, value);
            }
        }
        labels.insert(name.clone(), adjusted);
    }
    labels.insert(MATERIAL_ID_LABEL.to_string(), material_ids);

    let mut overlap = mesh.overlap().clone();
    let mut derived = BTreeMap::new();
    for (&v, &duplicate) in &duplicate_of {
        derived.insert(DerivedKey::new(DUPLICATE_KEY, vec![v]), duplicate);
    }
    for (&v, &lagrange) in &lagrange_of {
        derived.insert(DerivedKey::new(LAGRANGE_KEY, vec![v]), lagrange);
    }
    match_derived_points(&mut overlap, mesh.overlap(), &derived, comm)?;

    Mesh::from_parts(order, shapes, cones, coordinates, labels, overlap)
}

/// Labels a fault made of the given vertices, a convenience for building meshes in code.
pub fn fault_label(vertices: impl IntoIterator<Item = usize>) -> Label {
    Label::from_points(vertices, 1)
}
