use super::{value, FrictionValue, PhysicalScale};
use crate::Real;

pub(super) const PROPERTIES: &[FrictionValue] = &[
    value("static-coefficient", PhysicalScale::Dimensionless),
    value("dynamic-coefficient", PhysicalScale::Dimensionless),
    value("time-weakening-parameter", PhysicalScale::Time),
    value("cohesion", PhysicalScale::Pressure),
];

pub(super) const STATE_VARS: &[FrictionValue] = &[value("elapsed-time", PhysicalScale::Time)];

const MU_S: usize = 0;
const MU_D: usize = 1;
const T0: usize = 2;
const COHESION: usize = 3;

const ELAPSED_TIME: usize = 0;

pub(super) fn coefficient<T: Real>(props: &[T], state: &[T]) -> (T, T) {
    let (mu_s, mu_d, t0) = (props[MU_S], props[MU_D], props[T0]);
    let elapsed = state[ELAPSED_TIME];
    let mu = if elapsed < t0 {
        mu_s - (mu_s - mu_d) * elapsed / t0
    } else {
        mu_d
    };
    (mu, props[COHESION])
}

/// The clock runs while the fault is slipping.
pub(super) fn update_state<T: Real>(slip: T, state: &mut [T], dt: T) {
    if slip > T::zero() {
        state[ELAPSED_TIME] += dt;
    }
}
