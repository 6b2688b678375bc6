//! Fault constitutive models for dynamic rupture.
//!
//! A [`FrictionModel`] maps slip, slip rate, normal traction, per-point properties and state
//! variables to a frictional strength. Properties and state variables are plain slices in the
//! order of [`FrictionModel::properties`] and [`FrictionModel::state_vars`]. Evaluation only
//! reads state; [`FrictionModel::update_state_vars`] is the one operation that changes it.
use crate::error::FaultError;
use crate::Real;
use rupture_spatialdata::nondimensional::Nondimensionalizer;
use serde::{Deserialize, Serialize};

mod rate_state;
mod slip_weakening;
mod static_friction;
mod time_weakening;

/// Physical dimension of a friction property or state variable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PhysicalScale {
    Dimensionless,
    Length,
    Time,
    Pressure,
    Velocity,
}

impl PhysicalScale {
    pub fn value(&self, normalizer: &Nondimensionalizer) -> f64 {
        match self {
            Self::Dimensionless => 1.0,
            Self::Length => normalizer.length_scale(),
            Self::Time => normalizer.time_scale(),
            Self::Pressure => normalizer.pressure_scale(),
            Self::Velocity => normalizer.velocity_scale(),
        }
    }
}

/// Metadata of a friction property or state variable: its spatial database name and scale.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrictionValue {
    pub name: &'static str,
    pub scale: PhysicalScale,
}

const fn value(name: &'static str, scale: PhysicalScale) -> FrictionValue {
    FrictionValue { name, scale }
}

/// The available friction models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrictionModel {
    /// Constant coefficient of friction.
    Static,
    /// Coefficient decreasing linearly with cumulative slip. With `force_healing`, cumulative
    /// slip is reset after every step.
    SlipWeakening {
        #[serde(default)]
        force_healing: bool,
    },
    /// Coefficient decreasing linearly with time since slip started.
    TimeWeakening,
    /// Dieterich-Ruina rate and state friction with the ageing law. Below
    /// `linear_slip_rate` the coefficient is linearized in slip rate.
    RateStateAgeing { linear_slip_rate: f64 },
    /// Rate and state friction with the slip (Ruina) evolution law.
    RateStateSlip { linear_slip_rate: f64 },
}

impl FrictionModel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::SlipWeakening { .. } => "slip_weakening",
            Self::TimeWeakening => "time_weakening",
            Self::RateStateAgeing { .. } => "rate_state_ageing",
            Self::RateStateSlip { .. } => "rate_state_slip",
        }
    }

    pub fn properties(&self) -> &'static [FrictionValue] {
        match self {
            Self::Static => static_friction::PROPERTIES,
            Self::SlipWeakening { .. } => slip_weakening::PROPERTIES,
            Self::TimeWeakening => time_weakening::PROPERTIES,
            Self::RateStateAgeing { .. } | Self::RateStateSlip { .. } => rate_state::PROPERTIES,
        }
    }

    pub fn state_vars(&self) -> &'static [FrictionValue] {
        match self {
            Self::Static => &[],
            Self::SlipWeakening { .. } => slip_weakening::STATE_VARS,
            Self::TimeWeakening => time_weakening::STATE_VARS,
            Self::RateStateAgeing { .. } | Self::RateStateSlip { .. } => rate_state::STATE_VARS,
        }
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties().iter().any(|p| p.name == name)
    }

    pub fn has_state_var(&self, name: &str) -> bool {
        self.state_vars().iter().any(|s| s.name == name)
    }

    /// Whether the strength depends on slip rate.
    pub fn is_rate_state(&self) -> bool {
        self.linear_slip_rate().is_some()
    }

    pub fn linear_slip_rate(&self) -> Option<f64> {
        match self {
            Self::RateStateAgeing { linear_slip_rate } | Self::RateStateSlip { linear_slip_rate } => {
                Some(*linear_slip_rate)
            }
            _ => None,
        }
    }

    /// Checks the model parameters (not the per-point properties).
    pub fn validate(&self) -> Result<(), FaultError> {
        match self.linear_slip_rate() {
            Some(rate) if !(rate.is_finite() && rate > 0.0) => Err(FaultError::configuration(format!(
                "linear slip rate of {} friction must be positive, got {}",
                self.name(),
                rate
            ))),
            _ => Ok(()),
        }
    }

    /// A copy with its own parameters (not the per-point properties) non-dimensionalized.
    pub fn nondimensionalized(&self, normalizer: &Nondimensionalizer) -> Self {
        let velocity = normalizer.velocity_scale();
        match self {
            Self::RateStateAgeing { linear_slip_rate } => Self::RateStateAgeing {
                linear_slip_rate: linear_slip_rate / velocity,
            },
            Self::RateStateSlip { linear_slip_rate } => Self::RateStateSlip {
                linear_slip_rate: linear_slip_rate / velocity,
            },
            other => other.clone(),
        }
    }

    /// Checks a single property value given in SI units.
    pub fn validate_property(&self, index: usize, value: f64) -> Result<(), String> {
        let property = self
            .properties()
            .get(index)
            .ok_or_else(|| format!("{} friction has no property {}", self.name(), index))?;
        let strictly_positive = matches!(
            property.name,
            "slip-weakening-parameter"
                | "time-weakening-parameter"
                | "reference-slip-rate"
                | "characteristic-slip-distance"
                | "constitutive-parameter-a"
        );
        if !value.is_finite() {
            Err(format!("{} must be finite, got {}", property.name, value))
        } else if strictly_positive && value <= 0.0 {
            Err(format!("{} must be positive, got {}", property.name, value))
        } else if value < 0.0 {
            Err(format!("{} must be nonnegative, got {}", property.name, value))
        } else {
            Ok(())
        }
    }

    /// Validates raw database values (in SI units, in property order) and returns them as
    /// properties.
    pub fn db_to_properties(&self, values: &[f64]) -> Result<Vec<f64>, FaultError> {
        self.check_len("properties", self.properties().len(), values.len())?;
        for (index, &v) in values.iter().enumerate() {
            self.validate_property(index, v)
                .map_err(FaultError::configuration)?;
        }
        if let Self::SlipWeakening { .. } | Self::TimeWeakening = self {
            if values[1] > values[0] {
                return Err(FaultError::configuration(format!(
                    "dynamic coefficient {} exceeds static coefficient {}",
                    values[1], values[0]
                )));
            }
        }
        Ok(values.to_vec())
    }

    /// Checks a single state variable value given in SI units.
    pub fn validate_state_var(&self, index: usize, value: f64) -> Result<(), String> {
        let state_var = self
            .state_vars()
            .get(index)
            .ok_or_else(|| format!("{} friction has no state variable {}", self.name(), index))?;
        if !value.is_finite() {
            Err(format!("{} must be finite, got {}", state_var.name, value))
        } else if state_var.name == "state-variable" && value <= 0.0 {
            Err(format!("{} must be positive, got {}", state_var.name, value))
        } else if matches!(state_var.name, "cumulative-slip" | "elapsed-time") && value < 0.0 {
            Err(format!("{} must be nonnegative, got {}", state_var.name, value))
        } else {
            Ok(())
        }
    }

    pub fn db_to_state_vars(&self, values: &[f64]) -> Result<Vec<f64>, FaultError> {
        self.check_len("state variables", self.state_vars().len(), values.len())?;
        for (index, &v) in values.iter().enumerate() {
            self.validate_state_var(index, v)
                .map_err(FaultError::configuration)?;
        }
        Ok(values.to_vec())
    }

    /// Initial value of a state variable absent from the database, if it has one.
    pub fn default_state_var(&self, name: &str) -> Option<f64> {
        match name {
            "cumulative-slip" | "previous-slip" | "elapsed-time" => Some(0.0),
            _ => None,
        }
    }

    fn check_len(&self, what: &str, expected: usize, actual: usize) -> Result<(), FaultError> {
        if expected == actual {
            Ok(())
        } else {
            Err(FaultError::invariant(format!(
                "{} friction has {} {}, got {} values",
                self.name(),
                expected,
                what,
                actual
            )))
        }
    }

    pub fn nondim_properties(&self, values: &mut [f64], normalizer: &Nondimensionalizer) {
        scale_values(self.properties(), values, normalizer, |v, s| v / s);
    }

    pub fn dim_properties(&self, values: &mut [f64], normalizer: &Nondimensionalizer) {
        scale_values(self.properties(), values, normalizer, |v, s| v * s);
    }

    pub fn nondim_state_vars(&self, values: &mut [f64], normalizer: &Nondimensionalizer) {
        scale_values(self.state_vars(), values, normalizer, |v, s| v / s);
    }

    pub fn dim_state_vars(&self, values: &mut [f64], normalizer: &Nondimensionalizer) {
        scale_values(self.state_vars(), values, normalizer, |v, s| v * s);
    }

    /// Frictional strength, always nonnegative.
    ///
    /// `normal_traction` is negative in compression. An open fault (positive normal traction)
    /// has no strength.
    pub fn calc_friction<T: Real>(&self, slip: T, slip_rate: T, normal_traction: T, props: &[T], state: &[T]) -> T {
        if normal_traction > T::zero() {
            return T::zero();
        }
        let (mu, cohesion) = self.coefficient(slip, slip_rate, props, state);
        (cohesion - mu * normal_traction).max(T::zero())
    }

    /// Derivative of [`FrictionModel::calc_friction`] with respect to slip.
    pub fn calc_friction_derivative<T: Real>(
        &self,
        slip: T,
        _slip_rate: T,
        normal_traction: T,
        props: &[T],
        state: &[T],
    ) -> T {
        if normal_traction > T::zero() {
            return T::zero();
        }
        let dmu = match self {
            Self::SlipWeakening { .. } => slip_weakening::coefficient_derivative(slip, props, state),
            _ => T::zero(),
        };
        -dmu * normal_traction
    }

    /// Derivative of [`FrictionModel::calc_friction`] with respect to slip rate.
    pub fn calc_friction_rate_derivative<T: Real>(
        &self,
        slip_rate: T,
        normal_traction: T,
        props: &[T],
        state: &[T],
    ) -> T {
        if normal_traction > T::zero() {
            return T::zero();
        }
        let dmu = match self {
            Self::RateStateAgeing { linear_slip_rate } | Self::RateStateSlip { linear_slip_rate } => {
                rate_state::coefficient_rate_derivative(slip_rate, nalgebra::convert(*linear_slip_rate), props, state)
            }
            _ => T::zero(),
        };
        -dmu * normal_traction
    }

    /// Coefficient of friction, the sensitivity of strength to compressive normal traction.
    pub fn friction_coefficient<T: Real>(&self, slip: T, slip_rate: T, props: &[T], state: &[T]) -> T {
        self.coefficient(slip, slip_rate, props, state).0
    }

    fn coefficient<T: Real>(&self, slip: T, slip_rate: T, props: &[T], state: &[T]) -> (T, T) {
        match self {
            Self::Static => static_friction::coefficient(props),
            Self::SlipWeakening { .. } => slip_weakening::coefficient(slip, props, state),
            Self::TimeWeakening => time_weakening::coefficient(props, state),
            Self::RateStateAgeing { linear_slip_rate } | Self::RateStateSlip { linear_slip_rate } => {
                rate_state::coefficient(slip_rate, nalgebra::convert(*linear_slip_rate), props, state)
            }
        }
    }

    /// Advances the state variables over an accepted step of length `dt`.
    pub fn update_state_vars<T: Real>(
        &self,
        slip: T,
        slip_rate: T,
        _normal_traction: T,
        props: &[T],
        state: &mut [T],
        dt: T,
    ) {
        match self {
            Self::Static => {}
            Self::SlipWeakening { force_healing } => slip_weakening::update_state(slip, *force_healing, state),
            Self::TimeWeakening => time_weakening::update_state(slip, state, dt),
            Self::RateStateAgeing { .. } => rate_state::update_state_ageing(slip_rate, props, state, dt),
            Self::RateStateSlip { .. } => rate_state::update_state_slip(slip_rate, props, state, dt),
        }
    }
}

fn scale_values(
    metadata: &[FrictionValue],
    values: &mut [f64],
    normalizer: &Nondimensionalizer,
    op: impl Fn(f64, f64) -> f64,
) {
    for (v, m) in values.iter_mut().zip(metadata) {
        *v = op(*v, m.scale.value(normalizer));
    }
}
