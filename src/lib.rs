//! Fault layer of a finite-element crustal deformation code.
//!
//! Faults are inserted into a volumetric [`topology::Mesh`] as cohesive cells with
//! Lagrange-multiplier vertices ([`topology::cohesive`]). Kinematic sources
//! ([`faults::kinsrc`]) prescribe slip on them and friction models ([`friction`]) bound the
//! traction of dynamic ruptures. The fault integrators in [`faults`] turn either into residual
//! and Jacobian contributions for an external solver, through the [`feassemble::Integrator`]
//! trait.
use nalgebra::RealField;

pub mod allocators;
pub mod assembly;
pub mod auxiliary;
pub mod config;
pub mod error;
pub mod faults;
pub mod feassemble;
pub mod field;
pub mod friction;
pub mod io;
pub mod problems;
pub mod topology;

pub use rupture_spatialdata as spatialdata;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
pub extern crate vtkio;

/// Scalar type used throughout the crate.
pub trait Real: RealField + Copy {}

impl<T> Real for T where T: RealField + Copy {}

