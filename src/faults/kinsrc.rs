//! Kinematic earthquake sources: slip prescribed as a function of time.
//!
//! A [`KinematicSource`] combines an origin time with a [`SlipTimeFunction`]. Its parameters
//! live in an auxiliary field over the Lagrange vertices of the fault, queried once from a
//! spatial database during initialization.
use crate::auxiliary::{AuxiliaryFactory, QueryCell, QueryPoint, SubfieldQuery};
use crate::error::FaultError;
use crate::field::{Discretization, Field, SubfieldInfo};
use crate::Real;
use log::info;
use nalgebra::{convert, try_convert};
use numeric_literals::replace_float_literals;
use rupture_spatialdata::geocoords::CoordSys;
use rupture_spatialdata::nondimensional::Nondimensionalizer;
use rupture_spatialdata::spatialdb::SpatialDatabase;
use rupture_spatialdata::timehistory::TimeHistory;
use std::collections::BTreeMap;
use std::f64::consts::PI;

pub const INITIATION_TIME: &str = "initiation_time";
pub const RISE_TIME: &str = "rise_time";
pub const FINAL_SLIP: &str = "final_slip";
pub const SLIP_RATE: &str = "slip_rate";

/// Ratio of the Brune time constant to the rise time, so that 95% of the final slip is reached
/// after one rise time.
const BRUNE_TAU_RATIO: f64 = 0.21081916;

/// Names of the fault-frame slip components.
pub fn slip_components(dim: usize) -> Result<Vec<&'static str>, FaultError> {
    match dim {
        2 => Ok(vec!["left-lateral-slip", "fault-opening"]),
        3 => Ok(vec!["left-lateral-slip", "reverse-slip", "fault-opening"]),
        _ => Err(FaultError::not_implemented(format!("kinematic sources in {} dimensions", dim))),
    }
}

/// The time dependence of slip.
#[derive(Debug, Clone, PartialEq)]
pub enum SlipTimeFunction {
    /// Slip grows at a constant rate after onset.
    ConstRate,
    /// Brune's far-field time function, reaching 95% of the final slip after one rise time.
    Brune,
    /// The sine-cosine slip-rate function of Liu et al. (2006), reaching the final slip
    /// exactly after one rise time.
    Liu2006,
    /// Final slip scaled by the amplitude of a table, as a function of time since onset.
    /// Table times are dimensional until the source is initialized.
    TimeHistory(TimeHistory),
}

impl SlipTimeFunction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConstRate => "const_rate",
            Self::Brune => "brune",
            Self::Liu2006 => "liu2006",
            Self::TimeHistory(_) => "time_history",
        }
    }

    /// Auxiliary subfields in the order expected by the slip kernels.
    pub fn subfield_names(&self) -> &'static [&'static str] {
        match self {
            Self::ConstRate => &[INITIATION_TIME, SLIP_RATE],
            Self::Brune | Self::Liu2006 => &[INITIATION_TIME, RISE_TIME, FINAL_SLIP],
            Self::TimeHistory(_) => &[INITIATION_TIME, FINAL_SLIP],
        }
    }

    fn subfield(
        name: &str,
        dim: usize,
        normalizer: &Nondimensionalizer,
    ) -> Result<(SubfieldInfo, SubfieldQuery), FaultError> {
        let components = slip_components(dim)?;
        let subfield = match name {
            INITIATION_TIME => (
                SubfieldInfo::scalar(INITIATION_TIME, normalizer.time_scale()),
                SubfieldQuery::scalar("slip-time"),
            ),
            RISE_TIME => (
                SubfieldInfo::scalar(RISE_TIME, normalizer.time_scale()),
                SubfieldQuery::scalar("rise-time").with_conversion(|values| {
                    if values[0] > 0.0 {
                        Ok(values.to_vec())
                    } else {
                        Err(format!("rise time must be positive, got {}", values[0]))
                    }
                }),
            ),
            FINAL_SLIP => (
                SubfieldInfo::new(
                    FINAL_SLIP,
                    components.iter().map(|c| c.to_string()).collect(),
                    normalizer.length_scale(),
                ),
                SubfieldQuery::new(components.iter().copied()),
            ),
            SLIP_RATE => (
                SubfieldInfo::new(
                    SLIP_RATE,
                    components.iter().map(|c| format!("{}-rate", c)).collect(),
                    normalizer.velocity_scale(),
                ),
                SubfieldQuery::new(components.iter().map(|c| format!("{}-rate", c))),
            ),
            other => {
                return Err(FaultError::invariant(format!("unknown kinematic subfield '{}'", other)));
            }
        };
        Ok(subfield)
    }

    /// Fraction of the final slip and its time derivative after `elapsed` time since onset.
    ///
    /// Not meaningful for [`SlipTimeFunction::ConstRate`].
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn ramp<T: Real>(&self, elapsed: T, rise_time: T) -> Result<(T, T), FaultError> {
        if elapsed < 0.0 {
            return Ok((0.0, 0.0));
        }
        match self {
            Self::ConstRate => Err(FaultError::invariant("constant slip rate has no ramp")),
            Self::Brune => {
                let tau = convert::<f64, T>(BRUNE_TAU_RATIO) * rise_time;
                let s = elapsed / tau;
                let decay = (-s).exp();
                Ok((1.0 - decay * (1.0 + s), s * decay / tau))
            }
            Self::Liu2006 => Ok(liu2006_ramp(elapsed, rise_time)),
            Self::TimeHistory(history) => {
                let elapsed: f64 =
                    try_convert(elapsed).ok_or_else(|| FaultError::invariant("time does not fit in f64"))?;
                Ok((convert(history.value(elapsed)), convert(history.rate(elapsed))))
            }
        }
    }
}

/// Liu et al. (2006) slip and slip rate, normalized to reach one at `t = rise_time`.
///
/// The slip-rate function rises with a sine-cosine shape over `tau1 = 0.13 rise_time` and
/// decays to zero over the remaining `tau2`; slip is its exact integral.
#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
fn liu2006_ramp<T: Real>(t: T, rise_time: T) -> (T, T) {
    if t >= rise_time {
        return (1.0, 0.0);
    }
    let pi = convert::<f64, T>(PI);
    let tau1 = 0.13 * rise_time;
    let tau2 = rise_time - tau1;
    let cn = pi / (1.4 * pi * tau1 + 1.2 * tau1 + 0.3 * pi * tau2);
    if t < tau1 {
        let slip = 0.7 * t - 0.7 * tau1 / pi * (pi * t / tau1).sin() - 1.2 * tau1 / pi * ((0.5 * pi * t / tau1).cos() - 1.0);
        let rate = 0.7 - 0.7 * (pi * t / tau1).cos() + 0.6 * (0.5 * pi * t / tau1).sin();
        (cn * slip, cn * rate)
    } else if t < 2.0 * tau1 {
        let slip = t - 0.3 * tau1 + 1.2 * tau1 / pi - 0.7 * tau1 / pi * (pi * t / tau1).sin()
            + 0.3 * tau2 / pi * (pi * (t - tau1) / tau2).sin();
        let rate = 1.0 - 0.7 * (pi * t / tau1).cos() + 0.3 * (pi * (t - tau1) / tau2).cos();
        (cn * slip, cn * rate)
    } else {
        let slip = 0.3 * t + 1.1 * tau1 + 1.2 * tau1 / pi + 0.3 * tau2 / pi * (pi * (t - tau1) / tau2).sin();
        let rate = 0.3 + 0.3 * (pi * (t - tau1) / tau2).cos();
        (cn * slip, cn * rate)
    }
}

/// A kinematic rupture on one fault.
#[derive(Debug, Clone)]
pub struct KinematicSource<T: Real> {
    name: String,
    /// Non-dimensional once initialized.
    origin_time: T,
    function: SlipTimeFunction,
    discretizations: BTreeMap<String, Discretization>,
    aux: Option<Field<T>>,
}

impl<T: Real> KinematicSource<T> {
    /// A source with a dimensional origin time.
    pub fn new(name: impl Into<String>, function: SlipTimeFunction, origin_time: T) -> Self {
        Self {
            name: name.into(),
            origin_time,
            function,
            discretizations: BTreeMap::new(),
            aux: None,
        }
    }

    pub fn with_discretization(mut self, subfield: impl Into<String>, discretization: Discretization) -> Self {
        self.discretizations.insert(subfield.into(), discretization);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self) -> &SlipTimeFunction {
        &self.function
    }

    pub fn origin_time(&self) -> T {
        self.origin_time
    }

    pub fn is_initialized(&self) -> bool {
        self.aux.is_some()
    }

    /// The auxiliary field of the source, available after initialization.
    pub fn aux_field(&self) -> Option<&Field<T>> {
        self.aux.as_ref()
    }

    /// Declares the auxiliary subfields of the time function and queries them from `db`.
    ///
    /// Re-initializing a source (after remeshing) queries the database again; the origin time
    /// is only non-dimensionalized the first time.
    pub fn initialize(
        &mut self,
        dim: usize,
        points: Vec<QueryPoint<T>>,
        cells: Vec<QueryCell<T>>,
        db: &dyn SpatialDatabase,
        coordsys: &CoordSys,
        normalizer: &Nondimensionalizer,
    ) -> Result<(), FaultError> {
        if let SlipTimeFunction::TimeHistory(history) = &self.function {
            if !self.is_initialized() {
                if history.value(0.0) != 0.0 {
                    return Err(FaultError::configuration(format!(
                        "time history '{}' of kinematic source '{}' must have zero amplitude at zero time, got {}",
                        history.label(),
                        self.name,
                        history.value(0.0)
                    )));
                }
                self.function = SlipTimeFunction::TimeHistory(history.nondimensionalized(normalizer.time_scale()));
            }
        }

        let mut factory = AuxiliaryFactory::new(format!("{} auxiliary", self.name), points).with_cells(cells);
        for name in self.function.subfield_names() {
            let (info, query) = SlipTimeFunction::subfield(name, dim, normalizer)?;
            factory.add_subfield(info, query)?;
        }
        for (name, discretization) in &self.discretizations {
            factory.set_discretization(name, *discretization)?;
        }
        let aux = factory.query_db(db, coordsys, normalizer)?;

        if !self.is_initialized() {
            self.origin_time /= convert::<f64, T>(normalizer.time_scale());
        }
        info!(
            "Initialized kinematic source '{}' ({}) at {} points",
            self.name,
            self.function.name(),
            aux.points().count()
        );
        self.aux = Some(aux);
        Ok(())
    }

    fn require_aux(&self) -> Result<&Field<T>, FaultError> {
        self.aux.as_ref().ok_or_else(|| {
            FaultError::invariant(format!("kinematic source '{}' used before initialization", self.name))
        })
    }

    /// Slip and slip rate at a point of the auxiliary field, in the fault frame.
    pub fn slip_and_rate_at(&self, point: usize, t: T) -> Result<(Vec<T>, Vec<T>), FaultError> {
        let aux = self.require_aux()?;
        let onset = self.origin_time + aux.restrict_subfield(point, 0)?[0];
        let elapsed = t - onset;
        match self.function {
            SlipTimeFunction::ConstRate => {
                let rate = aux.restrict_subfield(point, 1)?;
                if elapsed < T::zero() {
                    Ok((vec![T::zero(); rate.len()], vec![T::zero(); rate.len()]))
                } else {
                    Ok((rate.iter().map(|&r| r * elapsed).collect(), rate.to_vec()))
                }
            }
            SlipTimeFunction::Brune | SlipTimeFunction::Liu2006 => {
                let rise_time = aux.restrict_subfield(point, 1)?[0];
                let final_slip = aux.restrict_subfield(point, 2)?;
                let (fraction, rate) = self.function.ramp(elapsed, rise_time)?;
                Ok((
                    final_slip.iter().map(|&d| d * fraction).collect(),
                    final_slip.iter().map(|&d| d * rate).collect(),
                ))
            }
            SlipTimeFunction::TimeHistory(_) => {
                let final_slip = aux.restrict_subfield(point, 1)?;
                let (amplitude, rate) = self.function.ramp(elapsed, T::zero())?;
                Ok((
                    final_slip.iter().map(|&d| d * amplitude).collect(),
                    final_slip.iter().map(|&d| d * rate).collect(),
                ))
            }
        }
    }

    /// Writes the slip at time `t` into `out`, overwriting previous values.
    pub fn slip(&self, out: &mut Field<T>, t: T) -> Result<(), FaultError> {
        out.zero();
        self.add_slip(out, t)
    }

    /// Adds the slip at time `t` to `out`.
    pub fn add_slip(&self, out: &mut Field<T>, t: T) -> Result<(), FaultError> {
        for point in self.require_aux()?.points() {
            let (slip, _) = self.slip_and_rate_at(point, t)?;
            out.add_to_point(point, &slip)?;
        }
        Ok(())
    }

    /// Writes the slip rate at time `t` into `out`.
    pub fn slip_rate(&self, out: &mut Field<T>, t: T) -> Result<(), FaultError> {
        out.zero();
        for point in self.require_aux()?.points() {
            let (_, rate) = self.slip_and_rate_at(point, t)?;
            out.add_to_point(point, &rate)?;
        }
        Ok(())
    }
}
