use matrixcompare::assert_scalar_eq;
use rupture::friction::{FrictionModel, PhysicalScale};
use rupture::spatialdata::nondimensional::Nondimensionalizer;

const STATIC_PROPS: [f64; 2] = [0.6, 1.0];
const WEAKENING_PROPS: [f64; 4] = [0.6, 0.2, 0.5, 0.0];
// f0, V0, L, a, b, cohesion
const RATE_STATE_PROPS: [f64; 6] = [0.6, 1.0e-6, 0.02, 0.008, 0.012, 0.0];

#[test]
fn static_friction_strength() {
    let model = FrictionModel::Static;
    assert_scalar_eq!(model.calc_friction(0.0, 0.0, -10.0, &STATIC_PROPS, &[]), 7.0, comp = abs, tol = 1e-12);
    assert_eq!(model.calc_friction(0.0, 0.0, 2.0, &STATIC_PROPS, &[]), 0.0);
    assert_eq!(model.calc_friction_derivative(1.0, 0.0, -10.0, &STATIC_PROPS, &[]), 0.0);
    assert!(!model.is_rate_state());
}

#[test]
fn slip_weakening_coefficient_falls_linearly() {
    let model = FrictionModel::SlipWeakening { force_healing: false };
    let state = [0.0, 0.0];
    let mu = |slip: f64| model.friction_coefficient(slip, 0.0, &WEAKENING_PROPS, &state);
    assert_scalar_eq!(mu(0.0), 0.6, comp = abs, tol = 1e-12);
    assert_scalar_eq!(mu(0.25), 0.4, comp = abs, tol = 1e-12);
    assert_scalar_eq!(mu(0.5), 0.2, comp = abs, tol = 1e-12);
    assert_scalar_eq!(mu(3.0), 0.2, comp = abs, tol = 1e-12);

    let derivative = model.calc_friction_derivative(0.25, 0.0, -10.0, &WEAKENING_PROPS, &state);
    assert_scalar_eq!(derivative, -8.0, comp = abs, tol = 1e-12);
    assert_eq!(model.calc_friction_derivative(1.0, 0.0, -10.0, &WEAKENING_PROPS, &state), 0.0);
}

#[test]
fn slip_weakening_state_accumulates_and_heals() {
    let model = FrictionModel::SlipWeakening { force_healing: false };
    let mut state = [0.0, 0.0];
    model.update_state_vars(0.1, 0.0, -1.0, &WEAKENING_PROPS, &mut state, 1.0);
    model.update_state_vars(0.05, 0.0, -1.0, &WEAKENING_PROPS, &mut state, 1.0);
    assert_scalar_eq!(state[0], 0.15, comp = abs, tol = 1e-12);
    assert_scalar_eq!(state[1], 0.05, comp = abs, tol = 1e-12);

    let healing = FrictionModel::SlipWeakening { force_healing: true };
    healing.update_state_vars(0.3, 0.0, -1.0, &WEAKENING_PROPS, &mut state, 1.0);
    assert_eq!(state, [0.0, 0.3]);
}

#[test]
fn time_weakening_clock_runs_while_slipping() {
    let model = FrictionModel::TimeWeakening;
    let props = [0.6, 0.2, 2.0, 0.0];
    let mut state = [0.0];
    model.update_state_vars(0.0, 0.0, -1.0, &props, &mut state, 0.5);
    assert_eq!(state[0], 0.0);
    model.update_state_vars(0.1, 0.0, -1.0, &props, &mut state, 0.5);
    assert_scalar_eq!(model.friction_coefficient(0.1, 0.0, &props, &state), 0.5, comp = abs, tol = 1e-12);
}

#[test]
fn rate_state_at_steady_state() {
    let linear = FrictionModel::RateStateAgeing { linear_slip_rate: 1.0e-12 };
    let v0 = RATE_STATE_PROPS[1];
    let l = RATE_STATE_PROPS[2];
    let theta = [l / v0];
    let mu = linear.friction_coefficient(0.0, v0, &RATE_STATE_PROPS, &theta);
    assert_scalar_eq!(mu, 0.6, comp = abs, tol = 1e-12);

    // Faster sliding at steady state weakens with b > a
    let v = 100.0 * v0;
    let mu_fast = linear.friction_coefficient(0.0, v, &RATE_STATE_PROPS, &[l / v]);
    assert_scalar_eq!(mu_fast, 0.6 + (0.008 - 0.012) * 100.0f64.ln(), comp = abs, tol = 1e-12);
    assert!(linear.is_rate_state());
}

#[test]
fn rate_state_is_continuous_at_linear_slip_rate() {
    let model = FrictionModel::RateStateSlip { linear_slip_rate: 1.0e-8 };
    let theta = [1.0e4];
    let below = model.friction_coefficient(0.0, 1.0e-8 * (1.0 - 1e-9), &RATE_STATE_PROPS, &theta);
    let above = model.friction_coefficient(0.0, 1.0e-8, &RATE_STATE_PROPS, &theta);
    assert_scalar_eq!(below, above, comp = abs, tol = 1e-9);
    let at_rest = model.friction_coefficient(0.0, 0.0, &RATE_STATE_PROPS, &theta);
    assert!(at_rest.is_finite() && at_rest >= 0.0);
}

#[test]
fn rate_state_rate_derivative_matches_finite_differences() {
    let theta = [2.0e4];
    for (model, rate) in [
        (FrictionModel::RateStateAgeing { linear_slip_rate: 1.0e-8 }, 1.0e-3),
        (FrictionModel::RateStateSlip { linear_slip_rate: 1.0e-2 }, 1.0e-3),
    ] {
        let h = 1.0e-9;
        let strength = |v: f64| model.calc_friction(0.0, v, -10.0, &RATE_STATE_PROPS, &theta);
        let difference = (strength(rate + h) - strength(rate - h)) / (2.0 * h);
        let derivative = model.calc_friction_rate_derivative(rate, -10.0, &RATE_STATE_PROPS, &theta);
        assert_scalar_eq!(derivative, difference, comp = abs, tol = 1e-4);
    }
    assert_eq!(
        FrictionModel::Static.calc_friction_rate_derivative(1.0, -10.0, &STATIC_PROPS, &[]),
        0.0
    );
    let model = FrictionModel::RateStateAgeing { linear_slip_rate: 1.0e-8 };
    assert_eq!(model.calc_friction_rate_derivative(1.0, 2.0, &RATE_STATE_PROPS, &theta), 0.0);
}

#[test]
fn linear_slip_rate_must_be_positive() {
    assert!(FrictionModel::RateStateAgeing { linear_slip_rate: 1.0e-12 }.validate().is_ok());
    assert!(FrictionModel::Static.validate().is_ok());
    for rate in [0.0, -1.0e-6, f64::NAN] {
        let err = FrictionModel::RateStateSlip { linear_slip_rate: rate }.validate().unwrap_err();
        assert!(err.is_configuration());
    }
    assert_eq!(FrictionModel::TimeWeakening.linear_slip_rate(), None);
}

#[test]
fn steady_state_is_a_fixed_point_of_both_evolution_laws() {
    let v = 1.0e-3;
    let theta_ss = RATE_STATE_PROPS[2] / v;
    for model in [
        FrictionModel::RateStateAgeing { linear_slip_rate: 1.0e-12 },
        FrictionModel::RateStateSlip { linear_slip_rate: 1.0e-12 },
    ] {
        let mut state = [theta_ss];
        model.update_state_vars(0.0, v, -1.0, &RATE_STATE_PROPS, &mut state, 7.0);
        assert_scalar_eq!(state[0], theta_ss, comp = abs, tol = 1e-9);
    }
}

#[test]
fn ageing_law_heals_at_rest() {
    let model = FrictionModel::RateStateAgeing { linear_slip_rate: 1.0e-12 };
    let mut state = [1.0];
    model.update_state_vars(0.0, 0.0, -1.0, &RATE_STATE_PROPS, &mut state, 2.5);
    assert_scalar_eq!(state[0], 3.5, comp = abs, tol = 1e-12);
}

#[test]
fn property_validation() {
    let model = FrictionModel::SlipWeakening { force_healing: false };
    assert!(model.db_to_properties(&WEAKENING_PROPS).is_ok());
    assert!(model.db_to_properties(&[0.2, 0.6, 0.5, 0.0]).unwrap_err().is_configuration());
    assert!(model.db_to_properties(&[0.6, 0.2, 0.0, 0.0]).unwrap_err().is_configuration());
    assert!(model.db_to_properties(&[0.6, 0.2]).is_err());
    assert!(model.validate_property(0, f64::NAN).is_err());

    let rate_state = FrictionModel::RateStateAgeing { linear_slip_rate: 1.0e-12 };
    assert!(rate_state.db_to_state_vars(&[0.0]).unwrap_err().is_configuration());
    assert_eq!(rate_state.default_state_var("state-variable"), None);
    assert_eq!(model.default_state_var("previous-slip"), Some(0.0));
}

#[test]
fn scaling_follows_physical_dimensions() {
    let normalizer = Nondimensionalizer::new(10.0, 2.0, 100.0, 1.0).unwrap();
    let model = FrictionModel::RateStateAgeing { linear_slip_rate: 5.0 };
    assert_eq!(model.properties()[1].scale, PhysicalScale::Velocity);

    let mut props = RATE_STATE_PROPS.to_vec();
    props[5] = 200.0;
    model.nondim_properties(&mut props, &normalizer);
    assert_scalar_eq!(props[1], 2.0e-7, comp = abs, tol = 1e-18);
    assert_scalar_eq!(props[2], 0.002, comp = abs, tol = 1e-15);
    assert_scalar_eq!(props[5], 2.0, comp = abs, tol = 1e-12);
    model.dim_properties(&mut props, &normalizer);
    assert_scalar_eq!(props[5], 200.0, comp = abs, tol = 1e-10);

    let mut state = [4.0];
    model.nondim_state_vars(&mut state, &normalizer);
    assert_eq!(state, [2.0]);

    assert_eq!(
        model.nondimensionalized(&normalizer),
        FrictionModel::RateStateAgeing { linear_slip_rate: 1.0 }
    );
}

#[test]
fn friction_models_from_json() {
    let model: FrictionModel = serde_json::from_str(r#"{ "type": "slip_weakening" }"#).unwrap();
    assert_eq!(model, FrictionModel::SlipWeakening { force_healing: false });
    let model: FrictionModel =
        serde_json::from_str(r#"{ "type": "rate_state_ageing", "linear_slip_rate": 1e-12 }"#).unwrap();
    assert_eq!(model.name(), "rate_state_ageing");
    assert!(model.has_state_var("state-variable"));
    assert!(!model.has_property("friction-coefficient"));
}
