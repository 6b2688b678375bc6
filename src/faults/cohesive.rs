//! Geometry and topology shared by all fault integrators.
use crate::allocators::DimAllocator;
use crate::auxiliary::{QueryCell, QueryPoint};
use crate::error::FaultError;
use crate::field::{Field, SubfieldInfo};
use crate::topology::{face_normal, CellShape, Mesh, PointRange, MATERIAL_ID_LABEL};
use crate::Real;
use log::info;
use nalgebra::{convert, DMatrix, DVector, DefaultAllocator, DimName, Vector3};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Relative tolerance below which the strike direction is considered degenerate.
const DEGENERATE_STRIKE_TOLERANCE: f64 = 1e-6;

/// The three vertices tied together by one fault constraint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ConstraintVertex {
    pub negative: usize,
    pub positive: usize,
    pub lagrange: usize,
}

/// A cohesive cell of the fault, with its cone split into its three faces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohesiveCell {
    pub cell: usize,
    pub shape: CellShape,
    pub negative: Vec<usize>,
    pub positive: Vec<usize>,
    pub lagrange: Vec<usize>,
}

/// Constraint vertices, cohesive cells and the local frame of one fault.
#[derive(Debug, Clone)]
pub struct FaultCohesive<T: Real> {
    label: String,
    id: i32,
    dim: usize,
    cells: Vec<CohesiveCell>,
    /// Sorted by Lagrange vertex.
    constraints: Vec<ConstraintVertex>,
    /// Rows are strike, dip (3D only) and normal.
    orientations: Vec<DMatrix<T>>,
    areas: Vec<T>,
    coordinates: Vec<DVector<T>>,
}

impl<T: Real> FaultCohesive<T> {
    /// Extracts the fault with material id `id` from a mesh with cohesive cells.
    ///
    /// `up_dir` fixes the strike direction in 3D as `up_dir x normal`. When the normal is
    /// parallel to `up_dir`, strike is the coordinate axis least aligned with the normal,
    /// projected onto the fault plane.
    pub fn new<D>(mesh: &Mesh<T, D>, label: impl Into<String>, id: i32, up_dir: [f64; 3]) -> Result<Self, FaultError>
    where
        D: DimName,
        DefaultAllocator: DimAllocator<T, D>,
    {
        let label = label.into();
        let dim = D::dim();
        let material_ids = mesh.label(MATERIAL_ID_LABEL);
        let mut cells = Vec::new();
        for cell in mesh.cohesive_cells() {
            if material_ids.and_then(|ids| ids.value(cell)) != Some(id) {
                continue;
            }
            let shape = mesh
                .cell_shape(cell)
                .ok_or_else(|| FaultError::invariant(format!("cohesive cell {} has no shape", cell)))?;
            let cone = mesh.cone(cell);
            let n = shape.num_vertices();
            if cone.len() != 3 * n {
                return Err(FaultError::invariant(format!(
                    "cohesive cell {} has {} vertices, expected {}",
                    cell,
                    cone.len(),
                    3 * n
                )));
            }
            cells.push(CohesiveCell {
                cell,
                shape,
                negative: cone[..n].to_vec(),
                positive: cone[n..2 * n].to_vec(),
                lagrange: cone[2 * n..].to_vec(),
            });
        }
        if cells.is_empty() {
            return Err(FaultError::configuration(format!(
                "fault '{}' has no cohesive cells with material id {}",
                label, id
            )));
        }

        let mut by_lagrange: BTreeMap<usize, (ConstraintVertex, DVector<T>, T)> = BTreeMap::new();
        for cohesive in &cells {
            let coords = cohesive
                .negative
                .iter()
                .map(|&v| mesh.try_vertex_coordinates(v))
                .collect::<Result<Vec<_>, _>>()?;
            let normal = face_normal(cohesive.shape, &coords)?;
            let share = normal.norm() / convert::<f64, T>(cohesive.negative.len() as f64);
            for (i, &lagrange) in cohesive.lagrange.iter().enumerate() {
                let constraint = ConstraintVertex {
                    negative: cohesive.negative[i],
                    positive: cohesive.positive[i],
                    lagrange,
                };
                let entry = by_lagrange
                    .entry(lagrange)
                    .or_insert_with(|| (constraint, DVector::zeros(dim), T::zero()));
                if entry.0 != constraint {
                    return Err(FaultError::topology(
                        format!("Lagrange vertex {} constrains inconsistent vertex pairs", lagrange),
                        [lagrange, cohesive.cell],
                    ));
                }
                for k in 0..dim {
                    entry.1[k] += normal[k];
                }
                entry.2 += share;
            }
        }

        let mut constraints = Vec::with_capacity(by_lagrange.len());
        let mut orientations = Vec::with_capacity(by_lagrange.len());
        let mut areas = Vec::with_capacity(by_lagrange.len());
        let mut coordinates = Vec::with_capacity(by_lagrange.len());
        for (lagrange, (constraint, normal, area)) in by_lagrange {
            if area <= T::zero() || normal.norm() <= T::zero() {
                return Err(FaultError::configuration(format!(
                    "fault '{}' has zero area at Lagrange vertex {}",
                    label, lagrange
                )));
            }
            orientations.push(orientation_from_normal(&normal.normalize(), up_dir)?);
            areas.push(area);
            let x = mesh.try_vertex_coordinates(lagrange)?;
            coordinates.push(DVector::from_iterator(dim, x.coords.iter().copied()));
            constraints.push(constraint);
        }

        info!(
            "Fault '{}' (id {}) has {} cohesive cells and {} constraint vertices",
            label,
            id,
            cells.len(),
            constraints.len()
        );
        Ok(Self {
            label,
            id,
            dim,
            cells,
            constraints,
            orientations,
            areas,
            coordinates,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn cells(&self) -> &[CohesiveCell] {
        &self.cells
    }

    pub fn constraints(&self) -> &[ConstraintVertex] {
        &self.constraints
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Orientation of a constraint vertex. Rows are the fault directions in global coordinates.
    pub fn orientation(&self, constraint: usize) -> &DMatrix<T> {
        &self.orientations[constraint]
    }

    pub fn area(&self, constraint: usize) -> T {
        self.areas[constraint]
    }

    pub fn coordinates(&self, constraint: usize) -> &DVector<T> {
        &self.coordinates[constraint]
    }

    /// Index of the constraint whose Lagrange vertex is `lagrange`.
    pub fn constraint_index(&self, lagrange: usize) -> Option<usize> {
        self.constraints
            .binary_search_by_key(&lagrange, |c| c.lagrange)
            .ok()
    }

    /// Smallest range containing all Lagrange vertices.
    pub fn lagrange_range(&self) -> PointRange {
        match (self.constraints.first(), self.constraints.last()) {
            (Some(first), Some(last)) => PointRange::new(first.lagrange, last.lagrange + 1),
            _ => PointRange::new(0, 0),
        }
    }

    /// Lagrange vertices with their coordinates, for auxiliary field queries.
    pub fn query_points(&self) -> Vec<QueryPoint<T>> {
        self.constraints
            .iter()
            .zip(&self.coordinates)
            .map(|(c, x)| QueryPoint {
                point: c.lagrange,
                coordinates: x.iter().copied().collect(),
            })
            .collect()
    }

    /// Cohesive cells with the centroid of their fault face, for cell-wise auxiliary
    /// subfields.
    pub fn query_cells(&self) -> Vec<QueryCell<T>> {
        self.cells
            .iter()
            .zip(self.cell_constraints())
            .map(|(cell, constraints)| {
                let count: T = convert(constraints.len().max(1) as f64);
                let centroid = constraints
                    .iter()
                    .fold(DVector::zeros(self.dim), |sum, &c| sum + &self.coordinates[c])
                    / count;
                QueryCell {
                    cell: cell.cell,
                    coordinates: centroid.iter().copied().collect(),
                    points: constraints.iter().map(|&c| self.constraints[c].lagrange).collect(),
                }
            })
            .collect()
    }

    /// Indices of the constraints of the fault face vertices of each cohesive cell.
    pub fn cell_constraints(&self) -> Vec<Vec<usize>> {
        self.cells
            .iter()
            .map(|cell| {
                cell.lagrange
                    .iter()
                    .filter_map(|&lagrange| self.constraint_index(lagrange))
                    .collect()
            })
            .collect()
    }

    /// A field over the Lagrange vertices with the `orientation` (row-major) and `area`
    /// subfields.
    pub fn geometry_field(&self) -> Result<Field<T>, FaultError> {
        let directions: &[&str] = if self.dim == 2 {
            &["strike", "normal"]
        } else {
            &["strike", "dip", "normal"]
        };
        let mut components = Vec::new();
        for direction in directions {
            for axis in ["x", "y", "z"].iter().take(self.dim) {
                components.push(format!("{}_{}", direction, axis));
            }
        }
        let subfields = vec![
            SubfieldInfo::new("orientation", components, 1.0),
            SubfieldInfo::scalar("area", 1.0),
        ];
        let mut field = Field::new(format!("{} geometry", self.label), self.lagrange_range(), subfields);
        field.set_full_fibers(self.constraints.iter().map(|c| c.lagrange))?;
        field.allocate();
        for (idx, constraint) in self.constraints.iter().enumerate() {
            let row_major: Vec<T> = self.orientations[idx].transpose().iter().copied().collect();
            field.update_subfield(constraint.lagrange, 0, &row_major)?;
            field.update_subfield(constraint.lagrange, 1, &[self.areas[idx]])?;
        }
        Ok(field)
    }
}

/// Builds the fault frame from a unit normal.
fn orientation_from_normal<T: Real>(normal: &DVector<T>, up_dir: [f64; 3]) -> Result<DMatrix<T>, FaultError> {
    match normal.len() {
        2 => {
            let strike = [-normal[1], normal[0]];
            Ok(DMatrix::from_row_slice(2, 2, &[strike[0], strike[1], normal[0], normal[1]]))
        }
        3 => {
            let n = Vector3::new(normal[0], normal[1], normal[2]);
            let up = Vector3::new(convert(up_dir[0]), convert(up_dir[1]), convert(up_dir[2]));
            let mut strike = up.cross(&n);
            if strike.norm() <= convert::<f64, T>(DEGENERATE_STRIKE_TOLERANCE) * up.norm() {
                // Coordinate axis least aligned with the normal, projected onto the fault plane
                let axis = (0..3)
                    .min_by(|&a, &b| n[a].abs().partial_cmp(&n[b].abs()).unwrap_or(Ordering::Equal))
                    .unwrap_or(0);
                let axis = Vector3::ith(axis, T::one());
                strike = &axis - &n * axis.dot(&n);
            }
            let strike = strike.normalize();
            let dip = n.cross(&strike);
            Ok(DMatrix::from_row_slice(
                3,
                3,
                &[strike[0], strike[1], strike[2], dip[0], dip[1], dip[2], n[0], n[1], n[2]],
            ))
        }
        dim => Err(FaultError::not_implemented(format!("faults in {} dimensions", dim))),
    }
}
