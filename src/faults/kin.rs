//! Faults with prescribed (kinematic) slip.
//!
//! The constraint `R (u+ - u-) = d(t)` is enforced at every constraint vertex with a Lagrange
//! multiplier `l`, the traction on the fault in the fault frame. With residual `r = b - A x`
//! and area `a`, the contributions are
//!
//! ```text
//! r(u-) += a R^T l
//! r(u+) -= a R^T l
//! r(l)  += a (d - R (u+ - u-))
//! ```
//!
//! and the Jacobian `J = -dr/dx` is the symmetric saddle-point block with `J(u-, l) = -a R^T`,
//! `J(u+, l) = a R^T`, its transpose and a zero `J(l, l)` block.
use crate::assembly::{assemble_jacobian_par, assemble_residual_par, LocalMatrix, LocalVector, SparseJacobian};
use crate::error::FaultError;
use crate::faults::cohesive::{ConstraintVertex, FaultCohesive};
use crate::faults::kinsrc::{slip_components, KinematicSource};
use crate::feassemble::{Integrator, IntegratorPhase};
use crate::field::{Field, SubfieldInfo};
use crate::io::{FaultObserver, FaultSnapshot, SnapshotField};
use crate::Real;
use log::{debug, info};
use nalgebra::{try_convert, DMatrix, DVector};
use rupture_spatialdata::geocoords::CoordSys;
use rupture_spatialdata::nondimensional::Nondimensionalizer;
use rupture_spatialdata::spatialdb::SpatialDatabase;
use std::sync::Arc;

/// Fault-frame values of one constraint, read from the solution.
pub(crate) struct ConstraintState<T: Real> {
    pub negative: DVector<T>,
    pub positive: DVector<T>,
    pub lagrange: DVector<T>,
}

pub(crate) fn constraint_state<T: Real>(
    constraint: &ConstraintVertex,
    solution: &Field<T>,
    dim: usize,
) -> Result<ConstraintState<T>, FaultError> {
    let read = |point: usize| -> Result<DVector<T>, FaultError> {
        let values = solution.restrict_point(point)?;
        if values.len() != dim {
            return Err(FaultError::invariant(format!(
                "expected {} solution values at point {}, found {}",
                dim,
                point,
                values.len()
            )));
        }
        Ok(DVector::from_column_slice(values))
    };
    Ok(ConstraintState {
        negative: read(constraint.negative)?,
        positive: read(constraint.positive)?,
        lagrange: read(constraint.lagrange)?,
    })
}

/// The reaction of the Lagrange multiplier on both sides of the fault.
pub(crate) fn push_reactions<T: Real>(
    local: &mut LocalVector<T>,
    constraint: &ConstraintVertex,
    area: T,
    orientation: &DMatrix<T>,
    lagrange: &DVector<T>,
) {
    let reaction = orientation.transpose() * lagrange * area;
    local.push(constraint.negative, reaction.as_slice());
    local.push(constraint.positive, (-reaction).as_slice());
}

/// Converts a nondimensional scalar to f64 for output.
pub(crate) fn to_f64<T: Real>(value: T) -> Result<f64, FaultError> {
    try_convert(value).ok_or_else(|| FaultError::invariant("value does not fit in f64"))
}

/// Coordinates and cells of the fault for output, in dimensional units.
pub(crate) fn output_geometry<T: Real>(
    fault: &FaultCohesive<T>,
    normalizer: &Nondimensionalizer,
) -> Result<(Vec<[f64; 3]>, Vec<Vec<usize>>), FaultError> {
    let mut coordinates = Vec::with_capacity(fault.num_constraints());
    for idx in 0..fault.num_constraints() {
        let mut x = [0.0; 3];
        for (k, &value) in fault.coordinates(idx).iter().enumerate() {
            x[k] = normalizer.dimensionalize(to_f64(value)?, normalizer.length_scale());
        }
        coordinates.push(x);
    }
    Ok((coordinates, fault.cell_constraints()))
}

pub(crate) fn snapshot_field<T: Real>(
    name: &str,
    components: usize,
    values: impl IntoIterator<Item = T>,
    scale: f64,
) -> Result<SnapshotField, FaultError> {
    Ok(SnapshotField {
        name: name.to_string(),
        components,
        values: values
            .into_iter()
            .map(|v| to_f64(v).map(|v| v * scale))
            .collect::<Result<_, _>>()?,
    })
}

/// A fault with slip prescribed by one or more kinematic sources, summed.
pub struct FaultCohesiveKin<T: Real> {
    fault: FaultCohesive<T>,
    sources: Vec<(KinematicSource<T>, Arc<dyn SpatialDatabase>)>,
    normalizer: Nondimensionalizer,
    coordsys: CoordSys,
    phase: IntegratorPhase,
    need_new_jacobian: bool,
}

impl<T: Real> FaultCohesiveKin<T> {
    pub fn new(fault: FaultCohesive<T>) -> Self {
        Self {
            fault,
            sources: Vec::new(),
            normalizer: Nondimensionalizer::identity(),
            coordsys: CoordSys::cartesian(3),
            phase: IntegratorPhase::Uninitialized,
            need_new_jacobian: true,
        }
    }

    /// Adds a kinematic source whose parameters are queried from `db`.
    ///
    /// Sources added after initialization are initialized right away.
    pub fn add_source(&mut self, mut source: KinematicSource<T>, db: Arc<dyn SpatialDatabase>) -> Result<(), FaultError> {
        if self.phase != IntegratorPhase::Uninitialized {
            source.initialize(
                self.fault.dim(),
                self.fault.query_points(),
                self.fault.query_cells(),
                db.as_ref(),
                &self.coordsys,
                &self.normalizer,
            )?;
        }
        self.sources.push((source, db));
        self.need_new_jacobian = true;
        Ok(())
    }

    pub fn fault(&self) -> &FaultCohesive<T> {
        &self.fault
    }

    pub fn sources(&self) -> impl Iterator<Item = &KinematicSource<T>> {
        self.sources.iter().map(|(source, _)| source)
    }

    /// Queries the parameters of every source and moves to [`IntegratorPhase::Idle`].
    pub fn initialize(&mut self, coordsys: &CoordSys, normalizer: &Nondimensionalizer) -> Result<(), FaultError> {
        self.phase.require("initialize", &[IntegratorPhase::Uninitialized])?;
        if self.sources.is_empty() {
            return Err(FaultError::configuration(format!(
                "kinematic fault '{}' has no earthquake sources",
                self.fault.label()
            )));
        }
        self.coordsys = *coordsys;
        self.normalizer = normalizer.clone();
        self.reinitialize_sources()?;
        self.phase = IntegratorPhase::Idle;
        info!(
            "Initialized kinematic fault '{}' with {} sources",
            self.fault.label(),
            self.sources.len()
        );
        Ok(())
    }

    /// Queries the source parameters again, for instance after their databases changed.
    pub fn reinitialize_sources(&mut self) -> Result<(), FaultError> {
        let points = self.fault.query_points();
        let cells = self.fault.query_cells();
        for (source, db) in &mut self.sources {
            source.initialize(
                self.fault.dim(),
                points.clone(),
                cells.clone(),
                db.as_ref(),
                &self.coordsys,
                &self.normalizer,
            )?;
        }
        self.need_new_jacobian = true;
        Ok(())
    }

    /// A zeroed field for slip in the fault frame over the Lagrange vertices.
    pub fn create_slip_field(&self) -> Result<Field<T>, FaultError> {
        let components = slip_components(self.fault.dim())?
            .into_iter()
            .map(String::from)
            .collect();
        let info = SubfieldInfo::new("slip", components, self.normalizer.length_scale());
        let mut field = Field::new(format!("{} slip", self.fault.label()), self.fault.lagrange_range(), vec![info]);
        field.set_full_fibers(self.fault.constraints().iter().map(|c| c.lagrange))?;
        field.allocate();
        Ok(field)
    }

    /// Slip at time `t`, summed over all sources.
    pub fn slip_field(&self, t: T) -> Result<Field<T>, FaultError> {
        let mut field = self.create_slip_field()?;
        for (source, _) in &self.sources {
            source.add_slip(&mut field, t)?;
        }
        Ok(field)
    }

    fn slip_at(&self, lagrange: usize, t: T) -> Result<DVector<T>, FaultError> {
        let mut slip = DVector::zeros(self.fault.dim());
        for (source, _) in &self.sources {
            let (source_slip, _) = source.slip_and_rate_at(lagrange, t)?;
            for (total, s) in slip.iter_mut().zip(source_slip) {
                *total += s;
            }
        }
        Ok(slip)
    }

    fn local_residual(&self, idx: usize, t: T, solution: &Field<T>) -> Result<LocalVector<T>, FaultError> {
        let constraint = &self.fault.constraints()[idx];
        let area = self.fault.area(idx);
        let orientation = self.fault.orientation(idx);
        let state = constraint_state(constraint, solution, self.fault.dim())?;
        let slip = self.slip_at(constraint.lagrange, t)?;

        let mut local = LocalVector::new();
        push_reactions(&mut local, constraint, area, orientation, &state.lagrange);
        let jump = orientation * (&state.positive - &state.negative);
        local.push(constraint.lagrange, ((slip - jump) * area).as_slice());
        Ok(local)
    }

    fn local_jacobian(&self, idx: usize) -> LocalMatrix<T> {
        let constraint = &self.fault.constraints()[idx];
        let dim = self.fault.dim();
        let a_r = self.fault.orientation(idx) * self.fault.area(idx);
        let points = vec![constraint.negative, constraint.positive, constraint.lagrange];
        let mut local = LocalMatrix::zeros(points.clone(), points, 3 * dim, 3 * dim);
        let a_rt = a_r.transpose();
        local.values.view_mut((0, 2 * dim), (dim, dim)).copy_from(&(-&a_rt));
        local.values.view_mut((dim, 2 * dim), (dim, dim)).copy_from(&a_rt);
        local.values.view_mut((2 * dim, 0), (dim, dim)).copy_from(&(-&a_r));
        local.values.view_mut((2 * dim, dim), (dim, dim)).copy_from(&a_r);
        local
    }

    /// Corrects an explicit increment computed with a lumped (diagonal) Jacobian so that the
    /// slip constraint holds exactly at `t + dt`.
    ///
    /// `increment` and `lumped_jacobian` share the layout of `solution`. For every constraint
    /// vertex the Lagrange multiplier increment `dl` solves
    /// `a R (M+^-1 + M-^-1) R^T dl = R (u+ + du+ - u- - du-) - d(t + dt)`, after which
    /// `du+ -= M+^-1 a R^T dl` and `du- += M-^-1 a R^T dl`.
    pub fn adjust_solution_lumped(
        &self,
        increment: &mut Field<T>,
        t: T,
        dt: T,
        solution: &Field<T>,
        lumped_jacobian: &Field<T>,
    ) -> Result<(), FaultError> {
        self.phase.require("adjust_solution_lumped", &[IntegratorPhase::Stepping])?;
        let dim = self.fault.dim();
        for (idx, constraint) in self.fault.constraints().iter().enumerate() {
            let area = self.fault.area(idx);
            let orientation = self.fault.orientation(idx);
            let state = constraint_state(constraint, solution, dim)?;
            let incr = constraint_state(constraint, increment, dim)?;
            let mass = constraint_state(constraint, lumped_jacobian, dim)?;
            let inverse = |m: &DVector<T>| -> Result<DVector<T>, FaultError> {
                m.iter()
                    .map(|&v| {
                        if v != T::zero() {
                            Ok(T::one() / v)
                        } else {
                            Err(FaultError::invariant(format!(
                                "zero lumped Jacobian entry at constraint vertex {}",
                                constraint.lagrange
                            )))
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(DVector::from_vec)
            };
            let inv_pos = inverse(&mass.positive)?;
            let inv_neg = inverse(&mass.negative)?;

            let gap = (&state.positive + &incr.positive) - (&state.negative + &incr.negative);
            let slip = self.slip_at(constraint.lagrange, t + dt)?;
            let rhs = orientation * gap - slip;
            let sum_inverse = DMatrix::from_diagonal(&(&inv_pos + &inv_neg));
            let schur = orientation * sum_inverse * orientation.transpose() * area;
            let schur_inverse = schur.try_inverse().ok_or_else(|| {
                FaultError::invariant(format!(
                    "singular constraint system at constraint vertex {}",
                    constraint.lagrange
                ))
            })?;
            let dl = schur_inverse * rhs;
            let reaction = orientation.transpose() * &dl * area;

            let du_pos = &incr.positive - inv_pos.component_mul(&reaction);
            let du_neg = &incr.negative + inv_neg.component_mul(&reaction);
            increment.update_point(constraint.positive, du_pos.as_slice())?;
            increment.update_point(constraint.negative, du_neg.as_slice())?;
            increment.update_point(constraint.lagrange, (&incr.lagrange + dl).as_slice())?;
        }
        Ok(())
    }
}

impl<T: Real> Integrator<T> for FaultCohesiveKin<T> {
    fn name(&self) -> &str {
        self.fault.label()
    }

    fn phase(&self) -> IntegratorPhase {
        self.phase
    }

    fn prestep(&mut self, t: T, dt: T) -> Result<(), FaultError> {
        self.phase.check_prestep()?;
        debug!("Kinematic fault '{}' prestep at t = {:?}, dt = {:?}", self.fault.label(), t, dt);
        self.phase = IntegratorPhase::Stepping;
        Ok(())
    }

    fn compute_residual(&self, residual: &mut Field<T>, t: T, _dt: T, solution: &Field<T>) -> Result<(), FaultError> {
        self.phase.check_assembly("compute_residual")?;
        let constraints: Vec<usize> = (0..self.fault.num_constraints()).collect();
        assemble_residual_par(residual, &constraints, |&idx| self.local_residual(idx, t, solution))
    }

    fn compute_jacobian(
        &mut self,
        jacobian: &mut SparseJacobian<T>,
        _t: T,
        _dt: T,
        _solution: &Field<T>,
    ) -> Result<(), FaultError> {
        self.phase.check_assembly("compute_jacobian")?;
        let constraints: Vec<usize> = (0..self.fault.num_constraints()).collect();
        assemble_jacobian_par(jacobian, &constraints, |&idx| Ok(self.local_jacobian(idx)))?;
        self.need_new_jacobian = false;
        debug!("Reformed Jacobian of kinematic fault '{}'", self.fault.label());
        Ok(())
    }

    fn need_new_jacobian(&self) -> bool {
        self.need_new_jacobian
    }

    fn is_jacobian_symmetric(&self) -> bool {
        true
    }

    /// Slip is prescribed, so there is no state to advance.
    fn stage_state_vars(&mut self, _t: T, _dt: T, _solution: &Field<T>) -> Result<(), FaultError> {
        self.phase.check_update_state()
    }

    fn commit_state_vars(&mut self) -> Result<(), FaultError> {
        self.phase.check_update_state()?;
        self.phase = IntegratorPhase::Accepted;
        Ok(())
    }

    fn reject_step(&mut self) -> Result<(), FaultError> {
        self.phase.require("reject_step", &[IntegratorPhase::Stepping])?;
        self.phase = IntegratorPhase::Idle;
        Ok(())
    }

    fn write_output(&self, t: T, step: usize, solution: &Field<T>, observer: &mut dyn FaultObserver) -> eyre::Result<()> {
        self.phase.check_output()?;
        let dim = self.fault.dim();
        let (coordinates, cells) = output_geometry(&self.fault, &self.normalizer)?;
        let slip = self.slip_field(t)?;
        let mut slip_values = Vec::with_capacity(dim * self.fault.num_constraints());
        let mut traction_values = Vec::with_capacity(dim * self.fault.num_constraints());
        for constraint in self.fault.constraints() {
            slip_values.extend_from_slice(slip.restrict_point(constraint.lagrange)?);
            traction_values.extend_from_slice(solution.restrict_point(constraint.lagrange)?);
        }
        let snapshot = FaultSnapshot {
            label: self.fault.label().to_string(),
            time: self.normalizer.dimensionalize(to_f64(t)?, self.normalizer.time_scale()),
            step,
            coordinates,
            cells,
            fields: vec![
                snapshot_field("slip", dim, slip_values, self.normalizer.length_scale())?,
                snapshot_field("traction", dim, traction_values, self.normalizer.pressure_scale())?,
            ],
        };
        observer.observe(&snapshot)
    }
}
