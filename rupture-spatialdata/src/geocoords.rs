//! Coordinate systems of spatial data.
use serde::{Deserialize, Serialize};

/// A Cartesian coordinate system.
///
/// Coordinates expressed in this system are converted to meters by multiplying with
/// `to_meters`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordSys {
    space_dim: usize,
    to_meters: f64,
}

impl CoordSys {
    pub fn cartesian(space_dim: usize) -> Self {
        Self {
            space_dim,
            to_meters: 1.0,
        }
    }

    pub fn with_to_meters(self, to_meters: f64) -> Self {
        Self { to_meters, ..self }
    }

    pub fn space_dim(&self) -> usize {
        self.space_dim
    }

    pub fn to_meters(&self) -> f64 {
        self.to_meters
    }

    /// Converts coordinates given in this system to meters, in place.
    pub fn convert_to_meters(&self, coords: &mut [f64]) {
        for x in coords {
            *x *= self.to_meters;
        }
    }

    /// Converts coordinates given in meters to this system, in place.
    pub fn convert_from_meters(&self, coords: &mut [f64]) {
        for x in coords {
            *x /= self.to_meters;
        }
    }
}

impl Default for CoordSys {
    fn default() -> Self {
        Self::cartesian(3)
    }
}
