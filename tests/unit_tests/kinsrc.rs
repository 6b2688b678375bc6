use matrixcompare::assert_scalar_eq;
use rupture::auxiliary::{QueryCell, QueryPoint};
use rupture::faults::kinsrc::{slip_components, FINAL_SLIP, INITIATION_TIME, RISE_TIME};
use rupture::faults::{KinematicSource, SlipTimeFunction};
use rupture::field::Discretization;
use rupture::spatialdata::geocoords::CoordSys;
use rupture::spatialdata::nondimensional::Nondimensionalizer;
use rupture::spatialdata::spatialdb::UniformDb;
use rupture::spatialdata::timehistory::TimeHistory;

fn points() -> Vec<QueryPoint<f64>> {
    vec![QueryPoint {
        point: 8,
        coordinates: vec![0.0, 1.0],
    }]
}

fn cells() -> Vec<QueryCell<f64>> {
    vec![QueryCell {
        cell: 0,
        coordinates: vec![0.0, 1.0],
        points: vec![8],
    }]
}

fn ramp_db() -> UniformDb {
    UniformDb::new("ramp")
        .with_value("slip-time", 1.0)
        .with_value("rise-time", 2.0)
        .with_value("left-lateral-slip", 3.0)
        .with_value("fault-opening", -1.0)
}

fn initialized(function: SlipTimeFunction, origin_time: f64, db: &UniformDb) -> KinematicSource<f64> {
    let mut source = KinematicSource::new("source", function, origin_time);
    source
        .initialize(2, points(), cells(), db, &CoordSys::cartesian(2), &Nondimensionalizer::identity())
        .unwrap();
    source
}

#[test]
fn subfields_per_function() {
    assert_eq!(SlipTimeFunction::Brune.subfield_names(), &[INITIATION_TIME, RISE_TIME, FINAL_SLIP]);
    assert_eq!(slip_components(3).unwrap().len(), 3);
    assert!(slip_components(1).unwrap_err().is_not_implemented());

    let source = initialized(SlipTimeFunction::Liu2006, 0.0, &ramp_db());
    let aux = source.aux_field().unwrap();
    let names: Vec<_> = aux.subfields().iter().map(|info| info.name.as_str()).collect();
    assert_eq!(names, vec![INITIATION_TIME, RISE_TIME, FINAL_SLIP]);
    assert_eq!(aux.restrict_point(8).unwrap(), &[1.0, 2.0, 3.0, -1.0]);
}

#[test]
fn no_slip_before_onset() {
    for function in [SlipTimeFunction::Brune, SlipTimeFunction::Liu2006] {
        let source = initialized(function, 0.5, &ramp_db());
        let (slip, rate) = source.slip_and_rate_at(8, 1.49).unwrap();
        assert_eq!(slip, vec![0.0, 0.0]);
        assert_eq!(rate, vec![0.0, 0.0]);
    }
}

#[test]
fn brune_reaches_95_percent_after_one_rise_time() {
    let source = initialized(SlipTimeFunction::Brune, 0.0, &ramp_db());
    let (slip, rate) = source.slip_and_rate_at(8, 3.0).unwrap();
    assert_scalar_eq!(slip[0], 0.95 * 3.0, comp = abs, tol = 1e-4);
    assert_scalar_eq!(slip[1], -0.95, comp = abs, tol = 1e-4);
    assert!(rate[0] > 0.0);
}

#[test]
fn liu2006_is_monotone_and_reaches_final_slip() {
    let source = initialized(SlipTimeFunction::Liu2006, 0.0, &ramp_db());
    let mut previous = 0.0;
    for i in 0..=100 {
        let t = 1.0 + 2.0 * i as f64 / 100.0;
        let (slip, rate) = source.slip_and_rate_at(8, t).unwrap();
        assert!(slip[0] >= previous - 1e-12, "slip decreases at t = {}", t);
        assert!(rate[0] >= -1e-12);
        previous = slip[0];
    }
    assert_scalar_eq!(previous, 3.0, comp = abs, tol = 1e-10);
    let (slip, rate) = source.slip_and_rate_at(8, 10.0).unwrap();
    assert_eq!(slip, vec![3.0, -1.0]);
    assert_eq!(rate, vec![0.0, 0.0]);
}

#[test]
fn constant_rate() {
    let db = UniformDb::new("rate")
        .with_value("slip-time", 0.0)
        .with_value("left-lateral-slip-rate", 2.0)
        .with_value("fault-opening-rate", 0.0);
    let source = initialized(SlipTimeFunction::ConstRate, 1.0, &db);
    let (slip, rate) = source.slip_and_rate_at(8, 4.0).unwrap();
    assert_scalar_eq!(slip[0], 6.0, comp = abs, tol = 1e-12);
    assert_eq!(rate, vec![2.0, 0.0]);
}

#[test]
fn time_history_scales_final_slip() {
    let history = TimeHistory::new("ramp", vec![0.0, 2.0, 4.0], vec![0.0, 1.0, 1.5]).unwrap();
    let source = initialized(SlipTimeFunction::TimeHistory(history), 0.0, &ramp_db());
    // One second after onset at t = 1
    let (slip, rate) = source.slip_and_rate_at(8, 2.0).unwrap();
    assert_scalar_eq!(slip[0], 1.5, comp = abs, tol = 1e-12);
    assert_scalar_eq!(rate[0], 1.5, comp = abs, tol = 1e-12);
    // Held at the last amplitude
    let (slip, _) = source.slip_and_rate_at(8, 100.0).unwrap();
    assert_scalar_eq!(slip[0], 4.5, comp = abs, tol = 1e-12);
}

#[test]
fn time_history_must_start_at_zero() {
    let history = TimeHistory::new("offset", vec![0.0, 1.0], vec![0.5, 1.0]).unwrap();
    let mut source = KinematicSource::new("source", SlipTimeFunction::TimeHistory(history), 0.0);
    let err = source
        .initialize(2, points(), cells(), &ramp_db(), &CoordSys::cartesian(2), &Nondimensionalizer::identity())
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn nonpositive_rise_time_is_rejected() {
    let db = ramp_db().with_value("rise-time", 0.0);
    let mut source = KinematicSource::new("source", SlipTimeFunction::Brune, 0.0);
    let err = source
        .initialize(2, points(), cells(), &db, &CoordSys::cartesian(2), &Nondimensionalizer::identity())
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn origin_time_is_nondimensionalized_once() {
    let normalizer = Nondimensionalizer::new(1.0, 2.0, 1.0, 1.0).unwrap();
    let mut source = KinematicSource::new("source", SlipTimeFunction::Brune, 4.0)
        .with_discretization(FINAL_SLIP, Discretization::new(0, 1, false));
    let coordsys = CoordSys::cartesian(2);
    source.initialize(2, points(), cells(), &ramp_db(), &coordsys, &normalizer).unwrap();
    assert_scalar_eq!(source.origin_time(), 2.0, comp = abs, tol = 1e-12);
    source.initialize(2, points(), cells(), &ramp_db(), &coordsys, &normalizer).unwrap();
    assert_scalar_eq!(source.origin_time(), 2.0, comp = abs, tol = 1e-12);
    let aux = source.aux_field().unwrap();
    assert_eq!(aux.subfields()[2].discretization.basis_order, 0);
    // Initiation time of 1 s is 0.5 in units of the time scale
    assert_scalar_eq!(aux.restrict_subfield(8, 0).unwrap()[0], 0.5, comp = abs, tol = 1e-12);
}
