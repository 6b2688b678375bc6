use super::{value, FrictionValue, PhysicalScale};
use crate::Real;

pub(super) const PROPERTIES: &[FrictionValue] = &[
    value("friction-coefficient", PhysicalScale::Dimensionless),
    value("cohesion", PhysicalScale::Pressure),
];

const MU: usize = 0;
const COHESION: usize = 1;

pub(super) fn coefficient<T: Real>(props: &[T]) -> (T, T) {
    (props[MU], props[COHESION])
}
