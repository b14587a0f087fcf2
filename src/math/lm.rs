//! Box-constrained Levenberg–Marquardt.
//!
//! Minimizes `Σ r_i(p)^2` subject to `lower <= p <= upper`.
//!
//! Each iteration solves the damped system
//!
//! ```text
//! minimize ||J δ + r||^2 + λ Σ d_k δ_k^2,   d_k = max((JᵀJ)_kk, tiny)
//! ```
//!
//! via `solve_least_squares`, then projects `p + δ` back into the box. Parameters sitting
//! on a bound whose gradient points outward are frozen for that step, so the remaining
//! parameters can still move. Since `d_k` carries the column scale, `λ` is dimensionless
//! and the iterates do not change when every residual is multiplied by a constant.
//!
//! Convergence (any of):
//! - scaled gradient: `max_k |g_k| / (||J_k|| ||r||) <= gtol` (MINPACK's orthogonality test)
//! - on an accepted step taken with `λ <= 1`: relative cost reduction `<= ftol`, or step
//!   length `<= xtol * (xtol + ||p||)`
//! - a rejected step shorter than `xtol * (xtol + ||p||)`
//!
//! Step tests only run after the trial point is evaluated. A heavily damped step is short
//! whether or not the minimum is near, so it never ends the search on its own.
//!
//! Hitting the iteration cap, or non-finite residuals at the starting point, is a
//! numeric error.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;
use crate::math::solve_least_squares;

/// Damping above which the solver gives up on finding a downhill step.
const LAMBDA_MAX: f64 = 1e32;
const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-15;

/// A least-squares objective: residual vector and its Jacobian.
pub trait Residuals {
    /// Number of residuals.
    fn n_residuals(&self) -> usize;

    /// Write `r(p)` into `out` (length `n_residuals()`).
    fn residuals(&self, params: &[f64], out: &mut DVector<f64>);

    /// Write `∂r_i/∂p_k` into `out` (`n_residuals() x params.len()`).
    fn jacobian(&self, params: &[f64], out: &mut DMatrix<f64>);
}

/// Solver tolerances.
#[derive(Debug, Clone)]
pub struct LmOptions {
    pub max_iter: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
        }
    }
}

/// Converged solution.
#[derive(Debug, Clone)]
pub struct LmSolution {
    pub params: Vec<f64>,
    /// `Σ r_i^2` at `params`.
    pub chi2: f64,
    /// Jacobian at `params`.
    pub jacobian: DMatrix<f64>,
    pub iterations: usize,
}

/// Minimize `problem` from `initial` inside `[lower, upper]`.
pub fn minimize<P: Residuals + ?Sized>(
    problem: &P,
    initial: &[f64],
    lower: &[f64],
    upper: &[f64],
    opts: &LmOptions,
) -> Result<LmSolution, AppError> {
    let m = initial.len();
    let n = problem.n_residuals();
    if lower.len() != m || upper.len() != m {
        return Err(AppError::input(format!(
            "Bounds have {} / {} entries but there are {m} parameters.",
            lower.len(),
            upper.len()
        )));
    }
    if n < m {
        return Err(AppError::insufficient(format!(
            "Cannot fit {m} parameters to {n} points."
        )));
    }

    let mut p: Vec<f64> = initial
        .iter()
        .zip(lower.iter().zip(upper.iter()))
        .map(|(&v, (&lo, &hi))| v.clamp(lo, hi))
        .collect();

    let mut r = DVector::<f64>::zeros(n);
    let mut j = DMatrix::<f64>::zeros(n, m);
    problem.residuals(&p, &mut r);
    if !r.iter().all(|v| v.is_finite()) {
        return Err(AppError::numeric(format!(
            "Non-finite residuals at the initial guess {p:?}."
        )));
    }
    problem.jacobian(&p, &mut j);
    let mut chi2 = r.norm_squared();

    let mut lambda = LAMBDA_INIT;
    let mut r_trial = DVector::<f64>::zeros(n);

    for iter in 0..opts.max_iter {
        if chi2 <= f64::MIN_POSITIVE {
            return Ok(LmSolution { params: p, chi2, jacobian: j, iterations: iter });
        }

        let g = j.transpose() * &r;
        let frozen = frozen_at_bounds(&p, &g, lower, upper);
        if scaled_gradient(&j, &g, chi2.sqrt(), &frozen) <= opts.gtol {
            return Ok(LmSolution { params: p, chi2, jacobian: j, iterations: iter });
        }

        let Some(step) = damped_step(&j, &r, lambda, &frozen) else {
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                return Err(stalled(&p));
            }
            continue;
        };

        let trial: Vec<f64> = p
            .iter()
            .zip(step.iter())
            .zip(lower.iter().zip(upper.iter()))
            .map(|((&v, &d), (&lo, &hi))| (v + d).clamp(lo, hi))
            .collect();

        let step_norm = trial
            .iter()
            .zip(p.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt();
        let p_norm = p.iter().map(|v| v * v).sum::<f64>().sqrt();
        let short_step = step_norm <= opts.xtol * (opts.xtol + p_norm);

        problem.residuals(&trial, &mut r_trial);
        let chi2_trial = r_trial.norm_squared();

        if chi2_trial.is_finite() && chi2_trial < chi2 {
            let reduction = (chi2 - chi2_trial) / chi2;
            let lightly_damped = lambda <= 1.0;
            p = trial;
            std::mem::swap(&mut r, &mut r_trial);
            chi2 = chi2_trial;
            problem.jacobian(&p, &mut j);
            lambda = (lambda / 3.0).max(LAMBDA_MIN);

            if lightly_damped && (reduction <= opts.ftol || short_step) {
                return Ok(LmSolution { params: p, chi2, jacobian: j, iterations: iter + 1 });
            }
        } else {
            // No step of this length lowers the cost: p is a minimum to working precision.
            if short_step {
                return Ok(LmSolution { params: p, chi2, jacobian: j, iterations: iter + 1 });
            }
            lambda *= 4.0;
            if lambda > LAMBDA_MAX {
                return Err(stalled(&p));
            }
        }
    }

    Err(AppError::numeric(format!(
        "Least-squares fit did not converge within {} iterations (last parameters {p:?}).",
        opts.max_iter
    )))
}

fn stalled(p: &[f64]) -> AppError {
    AppError::numeric(format!(
        "Least-squares fit stalled: no downhill step found from parameters {p:?}."
    ))
}

/// Parameters on a bound whose descent direction points out of the box.
fn frozen_at_bounds(p: &[f64], g: &DVector<f64>, lower: &[f64], upper: &[f64]) -> Vec<bool> {
    // Descent direction is -g.
    p.iter()
        .enumerate()
        .map(|(k, &v)| (v <= lower[k] && g[k] > 0.0) || (v >= upper[k] && g[k] < 0.0))
        .collect()
}

fn scaled_gradient(j: &DMatrix<f64>, g: &DVector<f64>, r_norm: f64, frozen: &[bool]) -> f64 {
    if r_norm == 0.0 {
        return 0.0;
    }
    let mut worst = 0.0_f64;
    for (k, col) in j.column_iter().enumerate() {
        if frozen[k] {
            continue;
        }
        let col_norm = col.norm();
        if col_norm > 0.0 {
            worst = worst.max(g[k].abs() / (col_norm * r_norm));
        }
    }
    worst
}

fn damped_step(
    j: &DMatrix<f64>,
    r: &DVector<f64>,
    lambda: f64,
    frozen: &[bool],
) -> Option<DVector<f64>> {
    let (n, m) = j.shape();

    let mut a = DMatrix::<f64>::zeros(n + m, m);
    let mut b = DVector::<f64>::zeros(n + m);
    for k in 0..m {
        if !frozen[k] {
            for i in 0..n {
                a[(i, k)] = j[(i, k)];
            }
        }
        let d = j.column(k).norm_squared().max(1e-12);
        a[(n + k, k)] = (lambda * d).sqrt();
    }
    for i in 0..n {
        b[i] = -r[i];
    }

    solve_least_squares(&a, &b)
}
