//! Error types of the fault layer.
use rupture_spatialdata::QueryError;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Errors reported by topology adjustment, field handling and fault integrators.
///
/// Configuration and topology errors are fatal for a run. Invariant violations indicate a bug
/// or inconsistent inputs from a collaborator and are never expected in a correct setup.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultError {
    /// Missing label or property, invalid parameter value or a point the database cannot answer.
    Configuration { message: String },
    /// The fault surface cannot be inserted into the mesh.
    Topology { message: String, points: Vec<usize> },
    /// A supported but unimplemented configuration, such as insertion into a mesh with
    /// censored points.
    NotImplemented { feature: String },
    InvariantViolation { message: String },
    /// An integrator operation was called out of order.
    InvalidPhase { operation: &'static str, phase: String },
    /// A collective operation failed.
    Communication { message: String },
}

impl FaultError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn topology(message: impl Into<String>, points: impl IntoIterator<Item = usize>) -> Self {
        Self::Topology {
            message: message.into(),
            points: points.into_iter().collect(),
        }
    }

    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    /// Wraps a failed database query for the given mesh point.
    pub fn from_query(err: QueryError, point: usize) -> Self {
        Self::configuration(format!("spatial database query failed for point {}: {}", point, err))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn is_topology(&self) -> bool {
        matches!(self, Self::Topology { .. })
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented { .. })
    }
}

impl Display for FaultError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FaultError::Configuration { message } => write!(f, "configuration error: {}", message),
            FaultError::Topology { message, points } => {
                write!(f, "topology error: {} (points {:?})", message, points)
            }
            FaultError::NotImplemented { feature } => write!(f, "not implemented: {}", feature),
            FaultError::InvariantViolation { message } => write!(f, "internal invariant violated: {}", message),
            FaultError::InvalidPhase { operation, phase } => {
                write!(f, "operation '{}' is not allowed in integrator phase {}", operation, phase)
            }
            FaultError::Communication { message } => write!(f, "communication failure: {}", message),
        }
    }
}

impl Error for FaultError {}
