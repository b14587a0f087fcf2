//! Model registry.
//!
//! Each `ModelKind` maps to:
//! - a prediction `f(x; p)` and its analytic gradient `∂f/∂p`
//! - parameter names, box bounds and axis labels
//! - per-parameter x-scaling exponents (see `scale_exponents`)
//! - default Metropolis displacements
//!
//! These are pure functions so the fitting code can stay generic.

use crate::domain::ModelKind;
use crate::math::{saturation, saturation_dg};

const INF: f64 = f64::INFINITY;

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::EnProjTime,
        ModelKind::EnTimeStep,
        ModelKind::SfTime,
        ModelKind::SfProjTime,
    ];

    /// Identifier used in file names and reports.
    pub fn id(self) -> &'static str {
        match self {
            ModelKind::EnProjTime => "en_proj_time",
            ModelKind::EnTimeStep => "en_time_step",
            ModelKind::SfTime => "sf_time",
            ModelKind::SfProjTime => "sf_proj_time",
        }
    }

    pub fn equation(self) -> &'static str {
        match self {
            ModelKind::EnProjTime => "E_0 + B * exp(-C * x)",
            ModelKind::EnTimeStep => "E_0 + A * x ** 4",
            ModelKind::SfTime => "(A / x) * (1 - exp(-G * x)) + C",
            ModelKind::SfProjTime => "B * exp(-C * x) + S",
        }
    }

    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::EnProjTime => &["E_0", "B", "C"],
            ModelKind::EnTimeStep => &["E_0", "A"],
            ModelKind::SfTime => &["A", "G", "C"],
            ModelKind::SfProjTime => &["S", "B", "C"],
        }
    }

    pub fn param_count(self) -> usize {
        self.param_names().len()
    }

    pub fn x_label(self) -> &'static str {
        match self {
            ModelKind::EnProjTime | ModelKind::SfProjTime => "Projection time (K^-1)",
            ModelKind::EnTimeStep => "Time step (K^-1)",
            ModelKind::SfTime => "Imaginary time (K^-1)",
        }
    }

    pub fn y_label(self) -> &'static str {
        match self {
            ModelKind::EnProjTime | ModelKind::EnTimeStep => "Energy per particle (K)",
            ModelKind::SfTime | ModelKind::SfProjTime => "Superfluid fraction",
        }
    }

    /// Lower and upper box bounds, in original x units.
    pub fn bounds(self) -> (Vec<f64>, Vec<f64>) {
        match self {
            ModelKind::SfTime => (vec![0.0, 0.0, -0.1], vec![1000.0, 1000.0, 1.0]),
            _ => {
                let k = self.param_count();
                (vec![-INF; k], vec![INF; k])
            }
        }
    }

    /// Exponent `k` per parameter such that, when the fit runs on `s * x`,
    /// `p_original = p_fit * s^k`.
    ///
    /// Rates multiplying x scale with `s`, amplitudes divided by x scale with `1/s`,
    /// offsets are invariant.
    pub fn scale_exponents(self) -> &'static [i32] {
        match self {
            ModelKind::EnProjTime => &[0, 0, 1],
            ModelKind::EnTimeStep => &[0, 4],
            ModelKind::SfTime => &[-1, 1, 0],
            ModelKind::SfProjTime => &[0, 0, 1],
        }
    }

    /// Initial proposal widths for Metropolis sampling.
    pub fn displacements(self) -> Vec<f64> {
        vec![1.0; self.param_count()]
    }

    /// Default starting point: all ones, pulled strictly inside the bounds.
    pub fn initial_guess(self) -> Vec<f64> {
        let (lower, upper) = self.bounds();
        lower
            .iter()
            .zip(upper.iter())
            .map(|(&lo, &hi)| {
                let guess = 1.0_f64;
                if guess > lo && guess < hi {
                    guess
                } else if lo.is_finite() && hi.is_finite() {
                    0.5 * (lo + hi)
                } else if lo.is_finite() {
                    lo + 1.0
                } else {
                    hi - 1.0
                }
            })
            .collect()
    }

    /// Evaluate `f(x; p)`.
    ///
    /// # Panics
    /// Panics if `p` has fewer than `param_count()` entries.
    pub fn predict(self, x: f64, p: &[f64]) -> f64 {
        match self {
            ModelKind::EnProjTime => p[0] + p[1] * (-p[2] * x).exp(),
            ModelKind::EnTimeStep => p[0] + p[1] * x.powi(4),
            ModelKind::SfTime => p[0] * saturation(x, p[1]) + p[2],
            ModelKind::SfProjTime => p[1] * (-p[2] * x).exp() + p[0],
        }
    }

    /// Write `∂f/∂p_k` at `x` into `out`.
    pub fn gradient(self, x: f64, p: &[f64], out: &mut [f64]) {
        match self {
            ModelKind::EnProjTime => {
                let e = (-p[2] * x).exp();
                out[0] = 1.0;
                out[1] = e;
                out[2] = -p[1] * x * e;
            }
            ModelKind::EnTimeStep => {
                out[0] = 1.0;
                out[1] = x.powi(4);
            }
            ModelKind::SfTime => {
                out[0] = saturation(x, p[1]);
                out[1] = p[0] * saturation_dg(x, p[1]);
                out[2] = 1.0;
            }
            ModelKind::SfProjTime => {
                let e = (-p[2] * x).exp();
                out[0] = 1.0;
                out[1] = e;
                out[2] = -p[1] * x * e;
            }
        }
    }
}

/// Evaluate a model on a grid of x values.
pub fn predict_all(model: ModelKind, x: &[f64], params: &[f64]) -> Vec<f64> {
    x.iter().map(|&xi| model.predict(xi, params)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradients_match_finite_differences() {
        let cases: [(ModelKind, &[f64]); 4] = [
            (ModelKind::EnProjTime, &[1.0, 3.0, 0.5]),
            (ModelKind::EnTimeStep, &[-7.0, 2.0]),
            (ModelKind::SfTime, &[0.3, 2.0, 0.1]),
            (ModelKind::SfProjTime, &[0.2, -0.4, 0.8]),
        ];
        for (model, p) in cases {
            let mut grad = vec![0.0; model.param_count()];
            for &x in &[0.05, 0.7, 3.0] {
                model.gradient(x, p, &mut grad);
                for k in 0..p.len() {
                    let h = 1e-6;
                    let mut hi = p.to_vec();
                    let mut lo = p.to_vec();
                    hi[k] += h;
                    lo[k] -= h;
                    let fd = (model.predict(x, &hi) - model.predict(x, &lo)) / (2.0 * h);
                    assert!(
                        (fd - grad[k]).abs() < 1e-6 * (1.0 + fd.abs()),
                        "{model:?} param {k} at x={x}: fd={fd}, analytic={}",
                        grad[k]
                    );
                }
            }
        }
    }

    #[test]
    fn registry_entries_are_consistent() {
        for model in ModelKind::ALL {
            let k = model.param_count();
            let (lo, hi) = model.bounds();
            assert_eq!(lo.len(), k);
            assert_eq!(hi.len(), k);
            assert_eq!(model.scale_exponents().len(), k);
            let guess = model.initial_guess();
            for i in 0..k {
                assert!(guess[i] > lo[i] && guess[i] < hi[i], "{model:?} guess outside bounds");
            }
        }
    }

    #[test]
    fn sf_time_guess_is_pulled_inside_upper_bound() {
        // C's upper bound is exactly 1.
        let guess = ModelKind::SfTime.initial_guess();
        assert_eq!(guess, vec![1.0, 1.0, 0.45]);
    }
}
