use dlt_core::{nalgebra::Point2, ObjectPoints};
use dlt_gradient::Metric;
use dlt_optimize::{error_bounds, BoundsSettings, Optimizer, OptimizerSettings};
use dlt_pinhole::{Camera, Plane};
use rand::SeedableRng;
use rand_pcg::Pcg64;

const COMPACT: [f64; 8] = [0.02, 0.03, -0.04, 0.01, 0.03, -0.02, -0.01, -0.03];

fn corners() -> ObjectPoints {
    ObjectPoints::from_points([
        Point2::new(1.0, 1.0),
        Point2::new(-1.0, 1.0),
        Point2::new(1.0, -1.0),
        Point2::new(-1.0, -1.0),
    ])
}

#[test]
fn configuration_metric_never_increases_from_the_corners() {
    let settings = OptimizerSettings {
        metric: Metric::ConfigurationMetric,
        iterations: 100,
        ..OptimizerSettings::default()
    };
    let outcome = Optimizer::new(settings, Camera::reference(), corners())
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(outcome.history.len(), 100);
    for pair in outcome.history.windows(2) {
        assert!(
            pair[1].configuration_metric <= pair[0].configuration_metric + 1e-9,
            "metric rose from {} to {} at iteration {}",
            pair[0].configuration_metric,
            pair[1].configuration_metric,
            pair[1].iteration
        );
    }
    for record in &outcome.history {
        assert!(record.points.coordinates().iter().all(|c| c.abs() <= 0.15));
    }
}

#[test]
fn configuration_metric_decreases_from_a_compact_start() {
    let settings = OptimizerSettings {
        metric: Metric::ConfigurationMetric,
        initial_step: 1e-4,
        step_increment: 1e-6,
        iterations: 100,
        normalize_gradient: true,
        ..OptimizerSettings::default()
    };
    let initial = ObjectPoints::from_coordinates(&COMPACT).unwrap();
    let outcome = Optimizer::new(settings, Camera::reference(), initial)
        .unwrap()
        .run()
        .unwrap();
    let first = outcome.initial.configuration_metric;
    let last = outcome.last().configuration_metric;
    assert!(last < first, "metric went from {} to {}", first, last);
}

#[test]
fn condition_number_descent_stays_finite() {
    let settings = OptimizerSettings {
        iterations: 20,
        ..OptimizerSettings::default()
    };
    let initial = ObjectPoints::from_coordinates(&COMPACT).unwrap();
    let outcome = Optimizer::new(settings, Camera::reference(), initial)
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(outcome.history.len(), 20);
    for record in &outcome.history {
        assert!(record.condition_number.is_finite() && record.condition_number >= 1.0);
        assert!(record.gradient.is_finite());
    }
}

#[test]
fn sampled_configurations_have_ordered_bounds() {
    let camera = Camera::reference();
    let plane = Plane::default();
    let settings = BoundsSettings {
        trials: 100,
        ..BoundsSettings::default()
    };
    let mut rng = Pcg64::seed_from_u64(3);
    for count in [4, 5] {
        let points = plane.sample_points(count, 0.15, 0.02, &mut rng).unwrap();
        let bounds = error_bounds(&camera, &points, &settings, &mut rng).unwrap();
        assert!(bounds.lower.is_finite() && bounds.upper.is_finite());
        assert!(bounds.relative_error.is_finite());
        assert!(bounds.lower <= bounds.upper);
    }
}
