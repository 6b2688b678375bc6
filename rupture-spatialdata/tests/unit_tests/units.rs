use matrixcompare::assert_scalar_eq;
use rupture_spatialdata::units::{parse_scale, SECONDS_PER_YEAR};

#[test]
fn base_units() {
    assert_eq!(parse_scale("m"), Some(1.0));
    assert_eq!(parse_scale("km"), Some(1000.0));
    assert_eq!(parse_scale("MPa"), Some(1.0e6));
    assert_eq!(parse_scale("none"), Some(1.0));
    assert_eq!(parse_scale("year"), Some(SECONDS_PER_YEAR));
}

#[test]
fn compound_units() {
    assert_scalar_eq!(parse_scale("m/s").unwrap(), 1.0, comp = float);
    assert_scalar_eq!(parse_scale("cm/year").unwrap(), 0.01 / SECONDS_PER_YEAR, comp = float);
    assert_scalar_eq!(parse_scale("kg/m**3").unwrap(), 1.0, comp = float);
    assert_scalar_eq!(parse_scale("g/cm**3").unwrap(), 1.0e3, comp = float);
    assert_scalar_eq!(parse_scale("km**2").unwrap(), 1.0e6, comp = float);
}

#[test]
fn unknown_units_are_rejected() {
    assert_eq!(parse_scale("furlong"), None);
    assert_eq!(parse_scale("m/fortnight"), None);
    assert_eq!(parse_scale("m**x"), None);
}
