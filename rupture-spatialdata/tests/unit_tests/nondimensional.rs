use matrixcompare::assert_scalar_eq;
use rupture_spatialdata::nondimensional::Nondimensionalizer;

#[test]
fn scales_must_be_positive() {
    assert!(Nondimensionalizer::new(1.0, 1.0, 1.0, 1.0).is_ok());
    assert!(Nondimensionalizer::new(0.0, 1.0, 1.0, 1.0).is_err());
    assert!(Nondimensionalizer::new(1.0, -2.0, 1.0, 1.0).is_err());
    assert!(Nondimensionalizer::new(1.0, 1.0, f64::NAN, 1.0).is_err());
}

#[test]
fn velocity_scale_is_length_over_time() {
    let normalizer = Nondimensionalizer::new(1.0e3, 10.0, 3.0e10, 3.0e3).unwrap();
    assert_eq!(normalizer.velocity_scale(), 100.0);
}

#[test]
fn nondimensionalize_then_dimensionalize() {
    let normalizer = Nondimensionalizer::new(1.0e3, 10.0, 3.0e10, 3.0e3).unwrap();
    let scale = normalizer.pressure_scale();
    let value = 4.5e9;
    let nondim = normalizer.nondimensionalize(value, scale);
    assert_eq!(nondim, 0.15);
    assert_scalar_eq!(normalizer.dimensionalize(nondim, scale), value, comp = float);

    let mut values = [3.0e10, 6.0e10];
    normalizer.nondimensionalize_slice(&mut values, scale);
    assert_eq!(values, [1.0, 2.0]);
}
