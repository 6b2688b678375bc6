//! Assembly of local fault contributions into global residual vectors and Jacobian matrices.
//!
//! Local contributions are keyed by mesh points. A [`DofMap`] resolves points to global degrees
//! of freedom through the layout of the solution field.
mod global;
mod local;

pub use global::*;
pub use local::*;
