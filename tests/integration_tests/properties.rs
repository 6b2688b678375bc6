use crate::integration_tests::tri3_fixture;
use proptest::prelude::*;
use rupture::faults::{FaultCohesive, FaultCohesiveKin, KinematicSource, SlipTimeFunction};
use rupture::friction::FrictionModel;
use rupture::spatialdata::geocoords::CoordSys;
use rupture::spatialdata::nondimensional::Nondimensionalizer;
use rupture::spatialdata::spatialdb::UniformDb;
use rupture::topology::cohesive::{adjust, FaultInsertion};
use rupture::topology::procedural::{create_faulted_quad_mesh_2d, create_faulted_tri_mesh_2d, FAULT_LABEL};
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct SourceParams {
    slip_time: f64,
    rise_time: f64,
    slip: [f64; 2],
}

fn source_params() -> impl Strategy<Value = SourceParams> {
    (0.0..5.0, 0.1..3.0, [-3.0..3.0, 0.0..2.0]).prop_map(|(slip_time, rise_time, slip)| SourceParams {
        slip_time,
        rise_time,
        slip,
    })
}

fn kinematic_fault(function: SlipTimeFunction, params: SourceParams) -> FaultCohesiveKin<f64> {
    let (_, fault, _) = tri3_fixture();
    let db = UniformDb::new("source")
        .with_value("slip-time", params.slip_time)
        .with_value("rise-time", params.rise_time)
        .with_value("left-lateral-slip", params.slip[0])
        .with_value("fault-opening", params.slip[1]);
    let mut kin = FaultCohesiveKin::new(fault);
    kin.add_source(KinematicSource::new("source", function, 0.0), Arc::new(db))
        .unwrap();
    kin.initialize(&CoordSys::cartesian(2), &Nondimensionalizer::identity())
        .unwrap();
    kin
}

fn slip_functions() -> impl Strategy<Value = SlipTimeFunction> {
    prop_oneof![Just(SlipTimeFunction::Brune), Just(SlipTimeFunction::Liu2006)]
}

proptest! {
    #[test]
    fn fault_insertion_keeps_points_contiguous(half_x in 1usize..4, cells_y in 1usize..4, triangles: bool) {
        let cells_x = 2 * half_x;
        let mesh = if triangles {
            create_faulted_tri_mesh_2d::<f64>(cells_x, cells_y, 1.0).unwrap()
        } else {
            create_faulted_quad_mesh_2d::<f64>(cells_x, cells_y, 1.0).unwrap()
        };
        let num_vertices = mesh.order().normal_vertices().len();
        let adjusted = adjust(&mesh, &FaultInsertion::new(FAULT_LABEL, 5)).unwrap();
        let order = adjusted.order();

        prop_assert!(order.is_contiguous_partition());
        prop_assert_eq!(order.normal_cells().len(), mesh.order().normal_cells().len());
        prop_assert_eq!(order.normal_vertices().len(), num_vertices + cells_y + 1);
        prop_assert_eq!(order.censored_vertices().len(), cells_y + 1);
        prop_assert_eq!(order.censored_cells().len(), cells_y);
        for cell in adjusted.cohesive_cells() {
            prop_assert_eq!(adjusted.cone(cell).len(), 6);
            for &point in adjusted.cone(cell) {
                prop_assert!(adjusted.support(point).contains(&cell));
            }
        }

        let fault = FaultCohesive::new(&adjusted, FAULT_LABEL, 5, [0.0, 0.0, 1.0]).unwrap();
        prop_assert_eq!(fault.num_constraints(), cells_y + 1);
        let total_area: f64 = (0..fault.num_constraints()).map(|idx| fault.area(idx)).sum();
        prop_assert!((total_area - cells_y as f64).abs() < 1e-12);
    }

    #[test]
    fn no_slip_before_onset(function in slip_functions(), params in source_params(), fraction in 0.0..1.0) {
        let kin = kinematic_fault(function, params);
        let slip = kin.slip_field(fraction * params.slip_time).unwrap();
        prop_assert!(slip.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn slip_grows_monotonically_to_final_slip(
        function in slip_functions(),
        params in source_params(),
        (t1, t2) in (0.0..10.0, 0.0..10.0),
    ) {
        let kin = kinematic_fault(function, params);
        let (early, late) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
        let early = kin.slip_field(early).unwrap();
        let late = kin.slip_field(late).unwrap();
        for (a, b) in early.values().iter().zip(late.values().iter()) {
            prop_assert!(a.abs() <= b.abs() + 1e-12);
            prop_assert!(a * b >= 0.0);
        }

        let done = kin.slip_field(params.slip_time + 10.0 * params.rise_time).unwrap();
        for (point, expected) in [(8, params.slip), (9, params.slip)] {
            let actual = done.restrict_point(point).unwrap();
            for k in 0..2 {
                prop_assert!((actual[k] - expected[k]).abs() <= 1e-6 * (1.0 + expected[k].abs()));
            }
        }
    }

    #[test]
    fn slip_evaluation_is_repeatable(function in slip_functions(), params in source_params(), t in 0.0..10.0) {
        let kin = kinematic_fault(function, params);
        let first = kin.slip_field(t).unwrap();
        let second = kin.slip_field(t).unwrap();
        prop_assert_eq!(first.values(), second.values());
    }

    #[test]
    fn slip_weakening_strength_is_clamped_and_non_increasing(
        (d1, d2) in (0.0..3.0, 0.0..3.0),
        (mu_s, mu_d) in (0.5..1.0, 0.0..0.5),
        d0 in 0.1..2.0,
        normal_traction in -10.0..0.0,
    ) {
        let friction = FrictionModel::SlipWeakening { force_healing: false };
        let props = [mu_s, mu_d, d0, 0.0];
        let state = [0.0, 0.0];
        let strength = |d: f64| friction.calc_friction(d, 0.0, normal_traction, &props, &state);
        let (near, far) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };
        prop_assert!(strength(far) <= strength(near) + 1e-12);
        prop_assert_eq!(strength(0.0), -mu_s * normal_traction);
        prop_assert_eq!(strength(d0 + near), -mu_d * normal_traction);
    }

    #[test]
    fn friction_is_never_negative(
        slip in 0.0..5.0,
        slip_rate in 0.0..1.0,
        normal_traction in -10.0..10.0,
        (mu_s, mu_d) in (0.0..1.0, 0.0..1.0),
        d0 in 0.01..2.0,
        cohesion in 0.0..1.0,
        state in [0.0..5.0, 0.0..5.0],
    ) {
        let friction = FrictionModel::SlipWeakening { force_healing: false };
        let props = [mu_s, mu_d, d0, cohesion];
        let strength = friction.calc_friction(slip, slip_rate, normal_traction, &props, &state);
        prop_assert!(strength >= 0.0);
        if normal_traction > 0.0 {
            prop_assert_eq!(strength, 0.0);
        }

        let friction = FrictionModel::Static;
        let strength = friction.calc_friction(slip, slip_rate, normal_traction, &[mu_s, cohesion], &[]);
        prop_assert!(strength >= 0.0);
    }
}
