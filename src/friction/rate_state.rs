//! Dieterich-Ruina rate and state friction.
//!
//! `mu = f0 + a ln(V / V0) + b ln(V0 theta / L)`, linearized in `V` below the linear slip
//! rate so that the coefficient stays finite at zero slip rate. The state variable evolves
//! with the ageing law `theta' = 1 - V theta / L` or the slip law
//! `theta' = -(V theta / L) ln(V theta / L)`, both integrated exactly over a step at constant
//! slip rate.
use super::{value, FrictionValue, PhysicalScale};
use crate::Real;
use numeric_literals::replace_float_literals;

pub(super) const PROPERTIES: &[FrictionValue] = &[
    value("reference-friction-coefficient", PhysicalScale::Dimensionless),
    value("reference-slip-rate", PhysicalScale::Velocity),
    value("characteristic-slip-distance", PhysicalScale::Length),
    value("constitutive-parameter-a", PhysicalScale::Dimensionless),
    value("constitutive-parameter-b", PhysicalScale::Dimensionless),
    value("cohesion", PhysicalScale::Pressure),
];

pub(super) const STATE_VARS: &[FrictionValue] = &[value("state-variable", PhysicalScale::Time)];

const F0: usize = 0;
const V0: usize = 1;
const L: usize = 2;
const A: usize = 3;
const B: usize = 4;
const COHESION: usize = 5;

const THETA: usize = 0;

/// Below this value of `V dt / L` the exponentials are replaced by their expansions.
const SMALL_SLIP_RATIO: f64 = 1.0e-20;

#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
pub(super) fn coefficient<T: Real>(slip_rate: T, linear_slip_rate: T, props: &[T], state: &[T]) -> (T, T) {
    let (f0, v0, l, a, b) = (props[F0], props[V0], props[L], props[A], props[B]);
    let theta = state[THETA];
    let state_term = b * (v0 * theta / l).ln();
    let mu = if slip_rate >= linear_slip_rate {
        f0 + a * (slip_rate / v0).ln() + state_term
    } else {
        f0 + a * (linear_slip_rate / v0).ln() + state_term - a * (1.0 - slip_rate / linear_slip_rate)
    };
    (mu.max(0.0), props[COHESION])
}

/// Derivative of the coefficient with respect to slip rate. Zero where the coefficient is
/// clamped at zero.
pub(super) fn coefficient_rate_derivative<T: Real>(slip_rate: T, linear_slip_rate: T, props: &[T], state: &[T]) -> T {
    let (mu, _) = coefficient(slip_rate, linear_slip_rate, props, state);
    if mu <= T::zero() {
        T::zero()
    } else if slip_rate >= linear_slip_rate {
        props[A] / slip_rate
    } else {
        props[A] / linear_slip_rate
    }
}

#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
pub(super) fn update_state_ageing<T: Real>(slip_rate: T, props: &[T], state: &mut [T], dt: T) {
    let l = props[L];
    let theta = state[THETA];
    let ratio = slip_rate.abs() * dt / l;
    state[THETA] = if ratio > nalgebra::convert::<f64, T>(SMALL_SLIP_RATIO) {
        theta * (-ratio).exp() + l / slip_rate.abs() * (1.0 - (-ratio).exp())
    } else {
        theta * (-ratio).exp() + dt - 0.5 * slip_rate.abs() / l * dt * dt
    };
}

pub(super) fn update_state_slip<T: Real>(slip_rate: T, props: &[T], state: &mut [T], dt: T) {
    let l = props[L];
    let v = slip_rate.abs();
    if v * dt / l > nalgebra::convert::<f64, T>(SMALL_SLIP_RATIO) {
        // theta(t + dt) = (L / V) (V theta / L)^exp(-V dt / L)
        let omega = v * state[THETA] / l;
        state[THETA] = l / v * omega.powf((-(v * dt / l)).exp());
    }
}
