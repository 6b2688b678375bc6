//! Orchestration of fault integrators over the steps of an external time stepper.
use crate::allocators::DimAllocator;
use crate::assembly::SparseJacobian;
use crate::error::FaultError;
use crate::faults::kin::to_f64;
use crate::faults::{DISPLACEMENT, LAGRANGE_MULTIPLIER};
use crate::feassemble::Integrator;
use crate::field::{Field, SubfieldInfo};
use crate::io::{FaultObserver, OutputTrigger};
use crate::topology::{Mesh, PointRange};
use crate::Real;
use eyre::WrapErr;
use log::debug;
use nalgebra::{DefaultAllocator, DimName};
use rupture_spatialdata::nondimensional::Nondimensionalizer;

/// Creates the solution field of a mesh with inserted faults.
///
/// Displacement lives on the normal vertices and the fault Lagrange multipliers on the censored
/// vertices, each with one value per spatial dimension. The chart covers all vertices.
pub fn create_solution_field<T, D>(mesh: &Mesh<T, D>, normalizer: &Nondimensionalizer) -> Result<Field<T>, FaultError>
where
    T: Real,
    D: DimName,
    DefaultAllocator: DimAllocator<T, D>,
{
    let dim = D::dim();
    let components: Vec<String> = ["x", "y", "z"].iter().take(dim).map(|c| c.to_string()).collect();
    let subfields = vec![
        SubfieldInfo::new(DISPLACEMENT, components.clone(), normalizer.length_scale()),
        SubfieldInfo::new(LAGRANGE_MULTIPLIER, components, normalizer.pressure_scale()),
    ];
    let vertices = mesh.vertices();
    let mut field = Field::new("solution", PointRange::new(vertices.start, vertices.end), subfields);
    for vertex in mesh.order().normal_vertices().iter() {
        field.set_subfield_fiber_dimension(vertex, 0, dim)?;
    }
    for vertex in mesh.order().censored_vertices().iter() {
        field.set_subfield_fiber_dimension(vertex, 1, dim)?;
    }
    field.allocate();
    Ok(field)
}

/// Convergence of the nonlinear solve of a step, as reported by the external solver.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SolverStatus {
    Converged,
    NotConverged,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// State was advanced and output written where due.
    Accepted,
    /// State is unchanged. The stepper may retry with another time step.
    Rejected,
}

struct FaultOutput {
    trigger: OutputTrigger,
    observer: Box<dyn FaultObserver>,
}

struct IntegratorEntry<T: Real> {
    integrator: Box<dyn Integrator<T>>,
    outputs: Vec<FaultOutput>,
}

/// A set of integrators contributing to one global system.
pub struct Problem<T: Real> {
    entries: Vec<IntegratorEntry<T>>,
    normalizer: Nondimensionalizer,
}

impl<T: Real> Problem<T> {
    pub fn new(normalizer: Nondimensionalizer) -> Self {
        Self {
            entries: Vec::new(),
            normalizer,
        }
    }

    pub fn normalizer(&self) -> &Nondimensionalizer {
        &self.normalizer
    }

    /// Adds an initialized integrator. Names must be unique.
    pub fn add_integrator(&mut self, integrator: Box<dyn Integrator<T>>) -> Result<(), FaultError> {
        if self.integrator(integrator.name()).is_some() {
            return Err(FaultError::configuration(format!(
                "integrator '{}' added twice",
                integrator.name()
            )));
        }
        self.entries.push(IntegratorEntry {
            integrator,
            outputs: Vec::new(),
        });
        Ok(())
    }

    /// Attaches an observer to the integrator named `name`, written to when `trigger` fires.
    pub fn add_output(
        &mut self,
        name: &str,
        trigger: OutputTrigger,
        observer: Box<dyn FaultObserver>,
    ) -> Result<(), FaultError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.integrator.name() == name)
            .ok_or_else(|| FaultError::configuration(format!("no integrator named '{}'", name)))?;
        entry.outputs.push(FaultOutput { trigger, observer });
        Ok(())
    }

    pub fn integrators(&self) -> impl Iterator<Item = &dyn Integrator<T>> {
        self.entries.iter().map(|entry| entry.integrator.as_ref())
    }

    pub fn integrator(&self, name: &str) -> Option<&dyn Integrator<T>> {
        self.integrators().find(|integrator| integrator.name() == name)
    }

    pub fn prestep(&mut self, t: T, dt: T) -> Result<(), FaultError> {
        for entry in &mut self.entries {
            entry.integrator.prestep(t, dt)?;
        }
        Ok(())
    }

    /// Zeroes `residual` and sums the contributions of all integrators.
    pub fn reform_residual(&self, residual: &mut Field<T>, t: T, dt: T, solution: &Field<T>) -> Result<(), FaultError> {
        residual.zero();
        for entry in &self.entries {
            entry.integrator.compute_residual(residual, t, dt, solution)?;
        }
        Ok(())
    }

    /// Reassembles `jacobian` if any integrator needs it, returning whether it did.
    pub fn reform_jacobian(
        &mut self,
        jacobian: &mut SparseJacobian<T>,
        t: T,
        dt: T,
        solution: &Field<T>,
    ) -> Result<bool, FaultError> {
        if !self.entries.iter().any(|entry| entry.integrator.need_new_jacobian()) {
            return Ok(false);
        }
        jacobian.zero();
        for entry in &mut self.entries {
            entry.integrator.compute_jacobian(jacobian, t, dt, solution)?;
        }
        debug!("Reformed Jacobian of {} integrators", self.entries.len());
        Ok(true)
    }

    pub fn is_jacobian_symmetric(&self) -> bool {
        self.entries.iter().all(|entry| entry.integrator.is_jacobian_symmetric())
    }

    /// Finishes the step that produced `solution` at time `t`.
    ///
    /// A converged step advances the state of every integrator and writes output where a
    /// trigger fires. A step that did not converge is rejected and leaves all state unchanged.
    /// State advances for all integrators or none: if any integrator fails to stage its
    /// update, every integrator rejects the step and the error is returned.
    pub fn poststep(
        &mut self,
        t: T,
        dt: T,
        step: usize,
        solution: &Field<T>,
        status: SolverStatus,
    ) -> eyre::Result<StepOutcome> {
        if status == SolverStatus::NotConverged {
            for entry in &mut self.entries {
                entry.integrator.reject_step()?;
            }
            debug!("Rejected step {} at t = {:?}", step, t);
            return Ok(StepOutcome::Rejected);
        }

        let staged = self
            .entries
            .iter_mut()
            .try_for_each(|entry| entry.integrator.stage_state_vars(t, dt, solution));
        if let Err(err) = staged {
            for entry in &mut self.entries {
                entry.integrator.reject_step()?;
            }
            return Err(err).wrap_err_with(|| format!("failed to advance state at step {}", step));
        }
        for entry in &mut self.entries {
            entry.integrator.commit_state_vars()?;
        }
        let time = self
            .normalizer
            .dimensionalize(to_f64(t)?, self.normalizer.time_scale());
        for entry in &mut self.entries {
            let integrator = entry.integrator.as_ref();
            for output in &mut entry.outputs {
                if output.trigger.should_write(time, step) {
                    integrator
                        .write_output(t, step, solution, output.observer.as_mut())
                        .wrap_err_with(|| format!("failed to write output of '{}' at step {}", integrator.name(), step))?;
                }
            }
        }
        Ok(StepOutcome::Accepted)
    }
}
