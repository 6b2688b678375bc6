//! Reference scales for non-dimensionalization.
use crate::units::SECONDS_PER_YEAR;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub struct InvalidScale {
    pub name: &'static str,
    pub value: f64,
}

impl Display for InvalidScale {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} must be positive and finite, got {}", self.name, self.value)
    }
}

impl Error for InvalidScale {}

/// Reference scales used to non-dimensionalize physical quantities.
///
/// Every scale is in SI units. Derived scales (velocity, traction) follow from the base scales.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Nondimensionalizer {
    length_scale: f64,
    time_scale: f64,
    pressure_scale: f64,
    density_scale: f64,
}

impl Default for Nondimensionalizer {
    /// Scales typical of quasi-static crustal deformation: 1 km, 1 year, 30 GPa.
    fn default() -> Self {
        Self {
            length_scale: 1.0e3,
            time_scale: SECONDS_PER_YEAR,
            pressure_scale: 3.0e10,
            density_scale: 1.0e3,
        }
    }
}

impl Nondimensionalizer {
    pub fn new(length_scale: f64, time_scale: f64, pressure_scale: f64, density_scale: f64) -> Result<Self, InvalidScale> {
        let check = |name, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(value)
            } else {
                Err(InvalidScale { name, value })
            }
        };
        Ok(Self {
            length_scale: check("length scale", length_scale)?,
            time_scale: check("time scale", time_scale)?,
            pressure_scale: check("pressure scale", pressure_scale)?,
            density_scale: check("density scale", density_scale)?,
        })
    }

    /// All scales equal to one, so that non-dimensional and physical values coincide.
    pub fn identity() -> Self {
        Self {
            length_scale: 1.0,
            time_scale: 1.0,
            pressure_scale: 1.0,
            density_scale: 1.0,
        }
    }

    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn pressure_scale(&self) -> f64 {
        self.pressure_scale
    }

    pub fn density_scale(&self) -> f64 {
        self.density_scale
    }

    pub fn velocity_scale(&self) -> f64 {
        self.length_scale / self.time_scale
    }

    pub fn nondimensionalize(&self, value: f64, scale: f64) -> f64 {
        value / scale
    }

    pub fn dimensionalize(&self, value: f64, scale: f64) -> f64 {
        value * scale
    }

    pub fn nondimensionalize_slice(&self, values: &mut [f64], scale: f64) {
        for v in values {
            *v /= scale;
        }
    }

    pub fn dimensionalize_slice(&self, values: &mut [f64], scale: f64) {
        for v in values {
            *v *= scale;
        }
    }
}
