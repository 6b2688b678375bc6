//! Fault integrators and kinematic sources.
//!
//! [`FaultCohesive`] extracts the constraint vertices, orientation and area of one fault from a
//! mesh with cohesive cells. [`FaultCohesiveKin`] prescribes slip on it through
//! [`KinematicSource`]s and [`FaultCohesiveDyn`] bounds its traction with a friction model.
pub mod cohesive;
pub mod dynamic;
pub mod kin;
pub mod kinsrc;

pub use cohesive::{ConstraintVertex, FaultCohesive};
pub use dynamic::FaultCohesiveDyn;
pub use kin::FaultCohesiveKin;
pub use kinsrc::{KinematicSource, SlipTimeFunction};

/// Displacement subfield of the solution, on normal vertices.
pub const DISPLACEMENT: &str = "displacement";
/// Lagrange multiplier subfield of the solution, on the Lagrange vertices of all faults.
pub const LAGRANGE_MULTIPLIER: &str = "lagrange_multiplier_fault";
