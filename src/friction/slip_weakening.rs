//! Linear slip weakening.
//!
//! The coefficient falls from its static to its dynamic value over the slip-weakening
//! distance `d0`. Cumulative slip is `cumulative-slip + |slip - previous-slip|`, so the
//! coefficient is exactly static at zero slip and exactly dynamic beyond `d0`.
use super::{value, FrictionValue, PhysicalScale};
use crate::Real;

pub(super) const PROPERTIES: &[FrictionValue] = &[
    value("static-coefficient", PhysicalScale::Dimensionless),
    value("dynamic-coefficient", PhysicalScale::Dimensionless),
    value("slip-weakening-parameter", PhysicalScale::Length),
    value("cohesion", PhysicalScale::Pressure),
];

pub(super) const STATE_VARS: &[FrictionValue] = &[
    value("cumulative-slip", PhysicalScale::Length),
    value("previous-slip", PhysicalScale::Length),
];

const MU_S: usize = 0;
const MU_D: usize = 1;
const D0: usize = 2;
const COHESION: usize = 3;

const CUMULATIVE_SLIP: usize = 0;
const PREVIOUS_SLIP: usize = 1;

fn cumulative_slip<T: Real>(slip: T, state: &[T]) -> T {
    state[CUMULATIVE_SLIP] + (slip - state[PREVIOUS_SLIP]).abs()
}

pub(super) fn coefficient<T: Real>(slip: T, props: &[T], state: &[T]) -> (T, T) {
    let (mu_s, mu_d, d0) = (props[MU_S], props[MU_D], props[D0]);
    let d = cumulative_slip(slip, state);
    let mu = if d < d0 { mu_s - (mu_s - mu_d) * d / d0 } else { mu_d };
    (mu, props[COHESION])
}

pub(super) fn coefficient_derivative<T: Real>(slip: T, props: &[T], state: &[T]) -> T {
    let d = cumulative_slip(slip, state);
    if d >= props[D0] {
        return T::zero();
    }
    let increment = slip - state[PREVIOUS_SLIP];
    let direction = if increment < T::zero() { -T::one() } else { T::one() };
    -(props[MU_S] - props[MU_D]) / props[D0] * direction
}

pub(super) fn update_state<T: Real>(slip: T, force_healing: bool, state: &mut [T]) {
    state[CUMULATIVE_SLIP] = if force_healing {
        T::zero()
    } else {
        cumulative_slip(slip, state)
    };
    state[PREVIOUS_SLIP] = slip;
}
