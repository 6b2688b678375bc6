use matrixcompare::assert_scalar_eq;
use rupture_spatialdata::timehistory::TimeHistory;
use rupture_spatialdata::units::SECONDS_PER_YEAR;

fn ramp() -> TimeHistory {
    TimeHistory::new("ramp", vec![0.0, 2.0, 4.0], vec![0.0, 1.0, 1.5]).unwrap()
}

#[test]
fn interpolates_linearly() {
    let history = ramp();
    assert_eq!(history.value(0.0), 0.0);
    assert_eq!(history.value(1.0), 0.5);
    assert_eq!(history.value(2.0), 1.0);
    assert_eq!(history.value(3.0), 1.25);
    assert_eq!(history.rate(1.0), 0.5);
    assert_eq!(history.rate(3.0), 0.25);
}

#[test]
fn holds_end_values_outside_table() {
    let history = ramp();
    assert_eq!(history.value(-1.0), 0.0);
    assert_eq!(history.value(4.0), 1.5);
    assert_eq!(history.value(100.0), 1.5);
    assert_eq!(history.rate(-1.0), 0.0);
    assert_eq!(history.rate(100.0), 0.0);
}

#[test]
fn rejects_unordered_times() {
    assert!(TimeHistory::new("bad", vec![0.0, 1.0, 1.0], vec![0.0, 1.0, 2.0]).is_err());
    assert!(TimeHistory::new("bad", vec![0.0, 1.0], vec![0.0]).is_err());
    assert!(TimeHistory::new("bad", vec![], vec![]).is_err());
}

#[test]
fn parse_time_history() {
    let text = "#TIME HISTORY ascii
TimeHistory {
  num-points = 3 // number of points
  time-units = year
}
 0.0  0.0
 1.0  0.5
 2.0  1.0
";
    let history = TimeHistory::from_ascii("history", text).unwrap();
    assert_eq!(history.times().len(), 3);
    assert_scalar_eq!(history.times()[2], 2.0 * SECONDS_PER_YEAR, comp = float);
    assert_scalar_eq!(history.value(0.5 * SECONDS_PER_YEAR), 0.25, comp = float);

    let nondim = history.nondimensionalized(SECONDS_PER_YEAR);
    assert_scalar_eq!(nondim.value(1.5), 0.75, comp = float);
}

#[test]
fn parse_rejects_wrong_point_count() {
    let text = "#TIME HISTORY ascii
TimeHistory {
  num-points = 4
  time-units = s
}
 0.0  0.0
 1.0  0.5
";
    assert!(TimeHistory::from_ascii("history", text).is_err());
}
