//! The contract between integrators and the external time stepper.
use crate::assembly::SparseJacobian;
use crate::error::FaultError;
use crate::field::Field;
use crate::io::FaultObserver;
use crate::Real;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Where an integrator is in its time-step cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IntegratorPhase {
    Uninitialized,
    /// Initialized, or a step was rejected.
    Idle,
    /// Between `prestep` and `update_state_vars`.
    Stepping,
    /// State has been updated for the accepted step.
    Accepted,
}

impl Display for IntegratorPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Idle => "idle",
            Self::Stepping => "stepping",
            Self::Accepted => "accepted",
        };
        write!(f, "{}", name)
    }
}

impl IntegratorPhase {
    /// Fails with [`FaultError::InvalidPhase`] unless the phase is one of `allowed`.
    pub fn require(&self, operation: &'static str, allowed: &[IntegratorPhase]) -> Result<(), FaultError> {
        if allowed.contains(self) {
            Ok(())
        } else {
            Err(FaultError::InvalidPhase {
                operation,
                phase: self.to_string(),
            })
        }
    }

    pub fn check_prestep(&self) -> Result<(), FaultError> {
        self.require("prestep", &[Self::Idle, Self::Accepted, Self::Stepping])
    }

    pub fn check_assembly(&self, operation: &'static str) -> Result<(), FaultError> {
        self.require(operation, &[Self::Stepping])
    }

    pub fn check_update_state(&self) -> Result<(), FaultError> {
        self.require("update_state_vars", &[Self::Stepping])
    }

    pub fn check_output(&self) -> Result<(), FaultError> {
        self.require("write_output", &[Self::Accepted, Self::Idle])
    }
}

/// An integrator contributing residual and Jacobian entries to the global system.
///
/// A step runs `prestep`, any number of `compute_residual` and `compute_jacobian` calls,
/// then `update_state_vars` once the solver has converged and optionally `write_output`.
/// Updating state is split into `stage_state_vars`, which may fail and leaves committed
/// state untouched, and `commit_state_vars`, which does not fail after a successful stage.
/// Residual and Jacobian evaluation never modify state that survives the step.
pub trait Integrator<T: Real>: Send + Sync {
    fn name(&self) -> &str;

    fn phase(&self) -> IntegratorPhase;

    /// Prepares the step from `t` to `t + dt`.
    fn prestep(&mut self, t: T, dt: T) -> Result<(), FaultError>;

    /// Adds the contribution at time `t` to `residual`, which has the layout of `solution`.
    fn compute_residual(&self, residual: &mut Field<T>, t: T, dt: T, solution: &Field<T>) -> Result<(), FaultError>;

    /// Adds the contribution to the Jacobian and clears the reformation flag.
    fn compute_jacobian(
        &mut self,
        jacobian: &mut SparseJacobian<T>,
        t: T,
        dt: T,
        solution: &Field<T>,
    ) -> Result<(), FaultError>;

    fn need_new_jacobian(&self) -> bool;

    fn is_jacobian_symmetric(&self) -> bool;

    /// Computes the state after the converged step without committing it.
    fn stage_state_vars(&mut self, t: T, dt: T, solution: &Field<T>) -> Result<(), FaultError>;

    /// Replaces internal state with the staged state and moves to [`IntegratorPhase::Accepted`].
    fn commit_state_vars(&mut self) -> Result<(), FaultError>;

    /// Advances internal state with the converged solution of the step.
    fn update_state_vars(&mut self, t: T, dt: T, solution: &Field<T>) -> Result<(), FaultError> {
        self.stage_state_vars(t, dt, solution)?;
        self.commit_state_vars()
    }

    /// Returns to [`IntegratorPhase::Idle`] after the external stepper rejected a step,
    /// discarding any staged state.
    fn reject_step(&mut self) -> Result<(), FaultError>;

    /// Hands a dimensional snapshot of the fault to `observer`.
    fn write_output(&self, t: T, step: usize, solution: &Field<T>, observer: &mut dyn FaultObserver) -> eyre::Result<()>;
}
