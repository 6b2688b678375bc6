//! Spatial data consumed by the fault layer of `rupture`.
//!
//! Spatial databases answer the question "what is the value of this named physical quantity at
//! this point", time histories provide amplitude tables for time-dependent sources and the
//! [`Nondimensionalizer`](nondimensional::Nondimensionalizer) holds the reference scales used to
//! condition the discrete system.
pub mod error;
pub mod geocoords;
pub mod nondimensional;
pub mod spatialdb;
pub mod timehistory;
pub mod units;

mod ascii;

pub use error::{ParseError, QueryError};
