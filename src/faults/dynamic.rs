//! Faults with frictional contact (spontaneous rupture).
//!
//! Contact and friction are enforced with an augmented-Lagrangian return mapping. With `g`
//! the fault-frame displacement jump, `dg` its change over the current step and `c` the
//! augmentation parameter, the trial traction is `l_t + c dg_t` tangentially and `l_n + c g_n`
//! normally. The normal part is projected onto compression (`min(0, .)`) and the tangential part
//! onto the disc whose radius is the frictional strength. The constraint residual is
//! `r(l) = (a / c) (l - P)`, which reduces to the kinematic constraint while the fault sticks.
use crate::assembly::{assemble_jacobian_par, assemble_residual_par, LocalMatrix, LocalVector, SparseJacobian};
use crate::auxiliary::{AuxiliaryFactory, SubfieldQuery};
use crate::error::FaultError;
use crate::faults::cohesive::FaultCohesive;
use crate::faults::kin::{constraint_state, output_geometry, push_reactions, snapshot_field, to_f64};
use crate::feassemble::{Integrator, IntegratorPhase};
use crate::field::{Field, SubfieldInfo};
use crate::friction::FrictionModel;
use crate::io::{FaultObserver, FaultSnapshot};
use crate::Real;
use log::{debug, info};
use nalgebra::{convert, DMatrix, DVector};
use rupture_spatialdata::geocoords::CoordSys;
use rupture_spatialdata::nondimensional::Nondimensionalizer;
use rupture_spatialdata::spatialdb::SpatialDatabase;
use std::sync::Arc;

/// Result of the return mapping at one constraint vertex.
#[derive(Debug, Clone)]
struct ReturnMap<T: Real> {
    /// Fault-frame jump `R (u+ - u-)`.
    jump: DVector<T>,
    /// Change of the jump since the last accepted step.
    increment: DVector<T>,
    lagrange: DVector<T>,
    trial: DVector<T>,
    projected: DVector<T>,
    slip: T,
    slip_rate: T,
    strength: T,
    compressed: bool,
    sliding: bool,
}

/// A fault whose traction is bounded by a friction model.
pub struct FaultCohesiveDyn<T: Real> {
    fault: FaultCohesive<T>,
    /// Dimensional until initialization.
    friction: FrictionModel,
    friction_db: Arc<dyn SpatialDatabase>,
    /// Traction per unit jump. Dimensional until initialization.
    augmentation: T,
    properties: Option<Field<T>>,
    state: Option<Field<T>>,
    /// Jump of every constraint at the end of the last accepted step.
    previous_jump: Vec<DVector<T>>,
    /// State and jumps of a converged step that is not committed yet.
    staged: Option<(Field<T>, Vec<DVector<T>>)>,
    dt: T,
    normalizer: Nondimensionalizer,
    phase: IntegratorPhase,
}

impl<T: Real> FaultCohesiveDyn<T> {
    pub fn new(
        fault: FaultCohesive<T>,
        friction: FrictionModel,
        friction_db: Arc<dyn SpatialDatabase>,
        augmentation: T,
    ) -> Result<Self, FaultError> {
        if augmentation <= T::zero() {
            return Err(FaultError::configuration(format!(
                "augmentation parameter of fault '{}' must be positive, got {:?}",
                fault.label(),
                augmentation
            )));
        }
        friction.validate()?;
        let previous_jump = vec![DVector::zeros(fault.dim()); fault.num_constraints()];
        Ok(Self {
            fault,
            friction,
            friction_db,
            augmentation,
            properties: None,
            state: None,
            previous_jump,
            staged: None,
            dt: T::zero(),
            normalizer: Nondimensionalizer::identity(),
            phase: IntegratorPhase::Uninitialized,
        })
    }

    pub fn fault(&self) -> &FaultCohesive<T> {
        &self.fault
    }

    pub fn friction(&self) -> &FrictionModel {
        &self.friction
    }

    pub fn properties(&self) -> Option<&Field<T>> {
        self.properties.as_ref()
    }

    /// Friction state variables, one subfield per state variable.
    pub fn state_vars(&self) -> Option<&Field<T>> {
        self.state.as_ref()
    }

    /// Queries friction properties and initial state, then moves to [`IntegratorPhase::Idle`].
    ///
    /// State variables missing from the database start from their default value; a missing
    /// state variable without a default is a configuration error.
    pub fn initialize(&mut self, coordsys: &CoordSys, normalizer: &Nondimensionalizer) -> Result<(), FaultError> {
        self.phase.require("initialize", &[IntegratorPhase::Uninitialized])?;
        let db = self.friction_db.as_ref();
        let points = self.fault.query_points();
        let cells = self.fault.query_cells();

        let mut factory = AuxiliaryFactory::new(format!("{} friction properties", self.fault.label()), points.clone())
            .with_cells(cells.clone());
        for (index, property) in self.friction.properties().iter().enumerate() {
            let model = self.friction.clone();
            let query = SubfieldQuery::scalar(property.name).with_conversion(move |values| {
                model.validate_property(index, values[0]).map(|_| values.to_vec())
            });
            factory.add_subfield(
                SubfieldInfo::scalar(property.name, property.scale.value(normalizer)),
                query,
            )?;
        }
        let properties = factory.query_db(db, coordsys, normalizer)?;

        let state_vars = self.friction.state_vars();
        let mut state_factory = AuxiliaryFactory::new(format!("{} friction state", self.fault.label()), points)
            .with_cells(cells);
        for (index, state_var) in state_vars.iter().enumerate() {
            if db.has_value(state_var.name) {
                let model = self.friction.clone();
                let query = SubfieldQuery::scalar(state_var.name).with_conversion(move |values| {
                    model.validate_state_var(index, values[0]).map(|_| values.to_vec())
                });
                state_factory.add_subfield(
                    SubfieldInfo::scalar(state_var.name, state_var.scale.value(normalizer)),
                    query,
                )?;
            } else if self.friction.default_state_var(state_var.name).is_none() {
                return Err(FaultError::configuration(format!(
                    "spatial database '{}' of fault '{}' has no value '{}' required by {} friction",
                    db.label(),
                    self.fault.label(),
                    state_var.name,
                    self.friction.name()
                )));
            }
        }
        let queried = state_factory.query_db(db, coordsys, normalizer)?;

        let infos = state_vars
            .iter()
            .map(|s| SubfieldInfo::scalar(s.name, s.scale.value(normalizer)))
            .collect();
        let mut state = Field::new(format!("{} friction state", self.fault.label()), self.fault.lagrange_range(), infos);
        state.set_full_fibers(self.fault.constraints().iter().map(|c| c.lagrange))?;
        state.allocate();
        for constraint in self.fault.constraints() {
            for (index, state_var) in state_vars.iter().enumerate() {
                let value = match queried.subfield_index(state_var.name) {
                    Some(subfield) => queried.restrict_subfield(constraint.lagrange, subfield)?[0],
                    None => {
                        let default = self.friction.default_state_var(state_var.name).unwrap_or(0.0);
                        convert(normalizer.nondimensionalize(default, state_var.scale.value(normalizer)))
                    }
                };
                state.update_subfield(constraint.lagrange, index, &[value])?;
            }
        }

        self.friction = self.friction.nondimensionalized(normalizer);
        self.augmentation *= convert::<f64, T>(normalizer.length_scale() / normalizer.pressure_scale());
        self.normalizer = normalizer.clone();
        self.properties = Some(properties);
        self.state = Some(state);
        self.phase = IntegratorPhase::Idle;
        info!(
            "Initialized dynamic fault '{}' with {} friction",
            self.fault.label(),
            self.friction.name()
        );
        Ok(())
    }

    fn fields(&self) -> Result<(&Field<T>, &Field<T>), FaultError> {
        match (&self.properties, &self.state) {
            (Some(properties), Some(state)) => Ok((properties, state)),
            _ => Err(FaultError::invariant(format!(
                "dynamic fault '{}' used before initialization",
                self.fault.label()
            ))),
        }
    }

    fn return_map(&self, idx: usize, solution: &Field<T>) -> Result<ReturnMap<T>, FaultError> {
        let (properties, state) = self.fields()?;
        let dim = self.fault.dim();
        let normal = dim - 1;
        let constraint = &self.fault.constraints()[idx];
        let values = constraint_state(constraint, solution, dim)?;
        let jump = self.fault.orientation(idx) * (&values.positive - &values.negative);
        let increment = &jump - &self.previous_jump[idx];
        let c = self.augmentation;

        let mut trial = values.lagrange.clone();
        for k in 0..normal {
            trial[k] += c * increment[k];
        }
        trial[normal] += c * jump[normal];

        let mut projected = trial.clone();
        let compressed = trial[normal] <= T::zero();
        if !compressed {
            projected[normal] = T::zero();
        }

        let slip = jump.rows(0, normal).norm();
        let slip_rate = if self.dt > T::zero() {
            increment.rows(0, normal).norm() / self.dt
        } else {
            T::zero()
        };
        let props = properties.restrict_point(constraint.lagrange)?;
        let state_vars = state.restrict_point(constraint.lagrange)?;
        let strength = self
            .friction
            .calc_friction(slip, slip_rate, projected[normal], props, state_vars);

        let trial_shear = trial.rows(0, normal).norm();
        let sliding = trial_shear > strength;
        if sliding {
            for k in 0..normal {
                projected[k] = if trial_shear > T::zero() {
                    trial[k] * strength / trial_shear
                } else {
                    T::zero()
                };
            }
        }

        Ok(ReturnMap {
            jump,
            increment,
            lagrange: values.lagrange,
            trial,
            projected,
            slip,
            slip_rate,
            strength,
            compressed,
            sliding,
        })
    }

    fn local_residual(&self, idx: usize, solution: &Field<T>) -> Result<LocalVector<T>, FaultError> {
        let constraint = &self.fault.constraints()[idx];
        let area = self.fault.area(idx);
        let map = self.return_map(idx, solution)?;
        let mut local = LocalVector::new();
        push_reactions(&mut local, constraint, area, self.fault.orientation(idx), &map.lagrange);
        let r_l = (&map.lagrange - &map.projected) * (area / self.augmentation);
        local.push(constraint.lagrange, r_l.as_slice());
        Ok(local)
    }

    fn local_jacobian(&self, idx: usize, solution: &Field<T>) -> Result<LocalMatrix<T>, FaultError> {
        let (properties, state) = self.fields()?;
        let constraint = &self.fault.constraints()[idx];
        let dim = self.fault.dim();
        let normal = dim - 1;
        let area = self.fault.area(idx);
        let c = self.augmentation;
        let orientation = self.fault.orientation(idx);
        let map = self.return_map(idx, solution)?;
        let props = properties.restrict_point(constraint.lagrange)?;
        let state_vars = state.restrict_point(constraint.lagrange)?;

        // Derivative of the projection with respect to the trial traction
        let mut d = DMatrix::zeros(dim, dim);
        if map.compressed {
            d[(normal, normal)] = T::one();
        }
        let trial_shear = map.trial.rows(0, normal).norm();
        if map.sliding && trial_shear > T::zero() {
            let direction = map.trial.rows(0, normal) / trial_shear;
            let ratio = map.strength / trial_shear;
            for i in 0..normal {
                for j in 0..normal {
                    let identity = if i == j { T::one() } else { T::zero() };
                    d[(i, j)] = ratio * (identity - direction[i] * direction[j]);
                }
                if map.compressed {
                    let mu = self
                        .friction
                        .friction_coefficient(map.slip, map.slip_rate, props, state_vars);
                    d[(i, normal)] = -mu * direction[i];
                }
            }
        } else {
            for i in 0..normal {
                d[(i, i)] = T::one();
            }
        }

        let a_r = orientation * area;
        let mut coupling = &d * &a_r;
        if map.sliding && trial_shear > T::zero() {
            // Sensitivity of the strength to u+ through slip and slip rate
            let tangential_rows = orientation.rows(0, normal);
            let mut dstrength = DMatrix::<T>::zeros(1, dim);
            if map.slip > T::zero() {
                let derivative = self.friction.calc_friction_derivative(
                    map.slip,
                    map.slip_rate,
                    map.projected[normal],
                    props,
                    state_vars,
                );
                let slip_direction = map.jump.rows(0, normal) / map.slip;
                dstrength += slip_direction.transpose() * tangential_rows * derivative;
            }
            let increment_norm = map.increment.rows(0, normal).norm();
            if self.friction.is_rate_state() && self.dt > T::zero() && increment_norm > T::zero() {
                let derivative = self.friction.calc_friction_rate_derivative(
                    map.slip_rate,
                    map.projected[normal],
                    props,
                    state_vars,
                );
                let rate_direction = map.increment.rows(0, normal) / increment_norm;
                dstrength += rate_direction.transpose() * tangential_rows * (derivative / self.dt);
            }
            let direction = map.trial.rows(0, normal) / trial_shear;
            let term = direction * dstrength * (area / c);
            let mut block = coupling.rows_mut(0, normal);
            block += term;
        }

        let identity = DMatrix::<T>::identity(dim, dim);
        let j_ll = (identity - &d) * (-area / c);
        let a_rt = a_r.transpose();

        let points = vec![constraint.negative, constraint.positive, constraint.lagrange];
        let mut local = LocalMatrix::zeros(points.clone(), points, 3 * dim, 3 * dim);
        local.values.view_mut((0, 2 * dim), (dim, dim)).copy_from(&(-&a_rt));
        local.values.view_mut((dim, 2 * dim), (dim, dim)).copy_from(&a_rt);
        local.values.view_mut((2 * dim, 0), (dim, dim)).copy_from(&(-&coupling));
        local.values.view_mut((2 * dim, dim), (dim, dim)).copy_from(&coupling);
        local.values.view_mut((2 * dim, 2 * dim), (dim, dim)).copy_from(&j_ll);
        Ok(local)
    }
}

impl<T: Real> Integrator<T> for FaultCohesiveDyn<T> {
    fn name(&self) -> &str {
        self.fault.label()
    }

    fn phase(&self) -> IntegratorPhase {
        self.phase
    }

    fn prestep(&mut self, t: T, dt: T) -> Result<(), FaultError> {
        self.phase.check_prestep()?;
        debug!("Dynamic fault '{}' prestep at t = {:?}, dt = {:?}", self.fault.label(), t, dt);
        self.dt = dt;
        self.staged = None;
        self.phase = IntegratorPhase::Stepping;
        Ok(())
    }

    fn compute_residual(&self, residual: &mut Field<T>, _t: T, _dt: T, solution: &Field<T>) -> Result<(), FaultError> {
        self.phase.check_assembly("compute_residual")?;
        let constraints: Vec<usize> = (0..self.fault.num_constraints()).collect();
        assemble_residual_par(residual, &constraints, |&idx| self.local_residual(idx, solution))
    }

    fn compute_jacobian(
        &mut self,
        jacobian: &mut SparseJacobian<T>,
        _t: T,
        _dt: T,
        solution: &Field<T>,
    ) -> Result<(), FaultError> {
        self.phase.check_assembly("compute_jacobian")?;
        let constraints: Vec<usize> = (0..self.fault.num_constraints()).collect();
        assemble_jacobian_par(jacobian, &constraints, |&idx| self.local_jacobian(idx, solution))?;
        debug!("Reformed Jacobian of dynamic fault '{}'", self.fault.label());
        Ok(())
    }

    /// The linearization depends on the trial solution, so it is reformed every iteration.
    fn need_new_jacobian(&self) -> bool {
        true
    }

    fn is_jacobian_symmetric(&self) -> bool {
        false
    }

    fn stage_state_vars(&mut self, _t: T, dt: T, solution: &Field<T>) -> Result<(), FaultError> {
        self.phase.check_update_state()?;
        let maps = (0..self.fault.num_constraints())
            .map(|idx| self.return_map(idx, solution))
            .collect::<Result<Vec<_>, _>>()?;
        let (properties, mut state) = match (&self.properties, &self.state) {
            (Some(properties), Some(state)) => (properties, state.clone()),
            _ => return Err(FaultError::invariant("dynamic fault updated before initialization")),
        };
        let mut jumps = Vec::with_capacity(maps.len());
        for (constraint, map) in self.fault.constraints().iter().zip(&maps) {
            let props = properties.restrict_point(constraint.lagrange)?;
            let mut state_vars = state.restrict_point(constraint.lagrange)?.to_vec();
            self.friction.update_state_vars(
                map.slip,
                map.slip_rate,
                map.projected[self.fault.dim() - 1],
                props,
                &mut state_vars,
                dt,
            );
            state.update_point(constraint.lagrange, &state_vars)?;
            jumps.push(map.jump.clone());
        }
        self.staged = Some((state, jumps));
        Ok(())
    }

    fn commit_state_vars(&mut self) -> Result<(), FaultError> {
        self.phase.check_update_state()?;
        let (state, jumps) = self.staged.take().ok_or_else(|| {
            FaultError::invariant(format!(
                "dynamic fault '{}' committed state that was never staged",
                self.fault.label()
            ))
        })?;
        self.state = Some(state);
        self.previous_jump = jumps;
        self.phase = IntegratorPhase::Accepted;
        Ok(())
    }

    fn reject_step(&mut self) -> Result<(), FaultError> {
        self.phase.require("reject_step", &[IntegratorPhase::Stepping])?;
        self.staged = None;
        self.phase = IntegratorPhase::Idle;
        Ok(())
    }

    fn write_output(&self, t: T, step: usize, solution: &Field<T>, observer: &mut dyn FaultObserver) -> eyre::Result<()> {
        self.phase.check_output()?;
        let (_, state) = self.fields()?;
        let dim = self.fault.dim();
        let (coordinates, cells) = output_geometry(&self.fault, &self.normalizer)?;

        let mut slip = Vec::new();
        let mut traction = Vec::new();
        for (idx, constraint) in self.fault.constraints().iter().enumerate() {
            slip.extend(self.previous_jump[idx].iter().copied());
            traction.extend_from_slice(solution.restrict_point(constraint.lagrange)?);
        }
        let mut fields = vec![
            snapshot_field("slip", dim, slip, self.normalizer.length_scale())?,
            snapshot_field("traction", dim, traction, self.normalizer.pressure_scale())?,
        ];
        for (subfield, info) in state.subfields().iter().enumerate() {
            let mut values = Vec::new();
            for constraint in self.fault.constraints() {
                values.extend_from_slice(state.restrict_subfield(constraint.lagrange, subfield)?);
            }
            fields.push(snapshot_field(&info.name, 1, values, info.scale)?);
        }

        let snapshot = FaultSnapshot {
            label: self.fault.label().to_string(),
            time: self.normalizer.dimensionalize(to_f64(t)?, self.normalizer.time_scale()),
            step,
            coordinates,
            cells,
            fields,
        };
        observer.observe(&snapshot)
    }
}
