//! Statistical estimators.
//!
//! - block averaging of correlated samples (`block`)
//! - aggregation across ensemble runs (`combine`)
//! - equilibration diagnostics (`equilibration`)
//! - density histograms (`histogram`)

pub mod block;
pub mod combine;
pub mod equilibration;
pub mod histogram;

pub use block::*;
pub use combine::*;
pub use equilibration::*;
pub use histogram::*;

/// Arithmetic mean; `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Variance with Bessel's correction (divides by `n - 1`); `NaN` when `n < 2`.
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (n - 1) as f64
}

/// Population standard deviation (divides by `n`); `NaN` for an empty slice.
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moments_of_small_sample() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(mean(&v), 2.5);
        assert!((sample_variance(&v) - 5.0 / 3.0).abs() < 1e-15);
        assert!((population_std(&v) - 1.25_f64.sqrt()).abs() < 1e-15);
        assert!(sample_variance(&[1.0]).is_nan());
        assert!(mean(&[]).is_nan());
    }
}
