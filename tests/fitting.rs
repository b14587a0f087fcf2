//! Fits on synthetic data with known parameters.

use approx::assert_relative_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use pigs_stats::domain::{BootstrapConfig, FitConfig, FitMethod, ModelKind, Series};
use pigs_stats::fit::{fit_bootstrap, fit_covariance, perform_fit};
use pigs_stats::models::predict_all;

const TRUE_PARAMS: [f64; 3] = [1.0, 3.0, 0.5];

fn exponential(n: usize, sigma: f64, seed: u64) -> Series {
    let x: Vec<f64> = (0..n).map(|i| 10.0 * i as f64 / (n - 1) as f64).collect();
    let clean = predict_all(ModelKind::EnProjTime, &x, &TRUE_PARAMS);
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, sigma).unwrap();
    let y = clean.iter().map(|v| v + noise.sample(&mut rng)).collect();
    Series::new(x, y, vec![sigma; n]).unwrap()
}

#[test]
fn noisy_exponential_recovers_parameters() {
    let data = exponential(100, 0.01, 7);
    let report = fit_covariance(ModelKind::EnProjTime, &data, 1.0).unwrap();
    for (p, truth) in report.params.iter().zip(TRUE_PARAMS) {
        assert!(p.error > 0.0);
        assert!(
            (p.value - truth).abs() < 5.0 * p.error,
            "{} = {} +/- {}, expected {truth}",
            p.name,
            p.value,
            p.error
        );
    }
}

#[test]
fn fifty_noisy_points_stay_within_five_sigma() {
    for seed in 0..10 {
        let data = exponential(50, 0.01, seed);
        let report = fit_covariance(ModelKind::EnProjTime, &data, 1.0).unwrap();
        assert_eq!(report.n_points, 50);
        for (p, truth) in report.params.iter().zip(TRUE_PARAMS) {
            assert!(p.error > 0.0 && p.error.is_finite(), "seed {seed}: {p:?}");
            assert!(
                (p.value - truth).abs() < 5.0 * p.error,
                "seed {seed}: {} = {} +/- {}, expected {truth}",
                p.name,
                p.value,
                p.error
            );
        }
    }
}

#[test]
fn bootstrap_agrees_with_covariance_on_noiseless_data() {
    let x: Vec<f64> = (0..40).map(|i| 0.25 * i as f64).collect();
    let y = predict_all(ModelKind::EnProjTime, &x, &TRUE_PARAMS);
    let data = Series::new(x, y, vec![1e-9; 40]).unwrap();

    let covariance = fit_covariance(ModelKind::EnProjTime, &data, 1.0).unwrap();
    let cfg = BootstrapConfig { iterations: 60, workers: 3, seed: 666 };
    let boot = fit_bootstrap(ModelKind::EnProjTime, &data, 1.0, &covariance.values(), &cfg).unwrap();

    assert_eq!(boot.batches, vec![20, 20, 20]);
    for (c, b) in covariance.params.iter().zip(boot.report.params.iter()) {
        assert_relative_eq!(c.value, b.value, max_relative = 1e-6);
    }
}

#[test]
fn bootstrap_is_reproducible_for_a_seed() {
    let data = exponential(30, 0.05, 11);
    let mut cfg = FitConfig::new(ModelKind::EnProjTime, FitMethod::Bootstrap);
    cfg.bootstrap = BootstrapConfig { iterations: 25, workers: 2, seed: 666 };

    let a = perform_fit(&data, &cfg).unwrap();
    let b = perform_fit(&data, &cfg).unwrap();
    let (a, b) = (a.bootstrap.unwrap(), b.bootstrap.unwrap());
    assert_eq!(a.samples, b.samples);
    assert_eq!(a.batches, vec![12, 13]);
}

#[test]
fn domain_limits_the_fitted_points() {
    let data = exponential(101, 0.01, 3);
    let mut cfg = FitConfig::new(ModelKind::EnProjTime, FitMethod::Covariance);
    cfg.interval.domain = Some((2.0, 8.0));
    let outcome = perform_fit(&data, &cfg).unwrap();
    assert_eq!(outcome.data.len(), 61);
    assert_relative_eq!(outcome.data.x[0], 2.0, epsilon = 1e-12);
    assert_relative_eq!(outcome.data.x[60], 8.0, epsilon = 1e-12);
}
