//! Weighted nonlinear fits of a registered model.
//!
//! Given:
//! - a series `(x_i, y_i, err_i)` already restricted to the fit interval
//! - a model kind (function, Jacobian, bounds)
//! - an x-scaling factor `s > 0`
//!
//! we minimize `χ² = Σ ((y_i - f(s x_i; p)) / err_i)²` inside the model's box bounds and
//! report parameters in original units.
//!
//! Scaling: a parameter with exponent `k` satisfies `p_original = p_fit * s^k`. Bounds and
//! initial guesses are mapped into fit units before solving, estimates and uncertainties
//! are mapped back afterwards. Since `s > 0`, bounds keep their order.
//!
//! `perform_fit` is the full pipeline: interval selection, stride, covariance fit, and the
//! optional bootstrap seeded from the covariance estimate.

use log::{debug, info};
use nalgebra::{DMatrix, DVector};

use crate::domain::{FitConfig, FitMethod, FitReport, Interval, ModelKind, ParamEstimate, Series};
use crate::error::AppError;
use crate::fit::{fit_bootstrap, select_interval, select_stride, BootstrapFit};
use crate::math::{covariance_from_jacobian, minimize, LmOptions, LmSolution, Residuals};

/// Parameter transform between original and fit units.
#[derive(Debug, Clone, Copy)]
pub struct XScaling {
    factor: f64,
    model: ModelKind,
}

impl XScaling {
    pub fn new(model: ModelKind, factor: f64) -> Result<Self, AppError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(AppError::input(format!(
                "x-scaling factor must be finite and positive, got {factor}."
            )));
        }
        Ok(Self { factor, model })
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    fn multipliers(&self) -> impl Iterator<Item = f64> + '_ {
        self.model
            .scale_exponents()
            .iter()
            .map(|&k| self.factor.powi(k))
    }

    /// `p_fit = p_original / s^k`.
    pub fn to_fit_units(&self, params: &[f64]) -> Vec<f64> {
        params.iter().zip(self.multipliers()).map(|(p, m)| p / m).collect()
    }

    /// `p_original = p_fit * s^k`. Also valid for uncertainties and bootstrap samples.
    pub fn to_original_units(&self, params: &[f64]) -> Vec<f64> {
        params.iter().zip(self.multipliers()).map(|(p, m)| p * m).collect()
    }

    pub fn scale_x(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|v| v * self.factor).collect()
    }
}

/// Weighted residuals `r_i = (y_i - f(x_i; p)) / err_i` of a model on fixed data.
#[derive(Debug, Clone)]
pub struct WeightedModel {
    pub model: ModelKind,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub err: Vec<f64>,
}

impl Residuals for WeightedModel {
    fn n_residuals(&self) -> usize {
        self.x.len()
    }

    fn residuals(&self, params: &[f64], out: &mut DVector<f64>) {
        for i in 0..self.x.len() {
            out[i] = (self.y[i] - self.model.predict(self.x[i], params)) / self.err[i];
        }
    }

    fn jacobian(&self, params: &[f64], out: &mut DMatrix<f64>) {
        let mut grad = vec![0.0; params.len()];
        for i in 0..self.x.len() {
            self.model.gradient(self.x[i], params, &mut grad);
            for (k, g) in grad.iter().enumerate() {
                out[(i, k)] = -g / self.err[i];
            }
        }
    }
}

/// Reject data the weighted objective cannot handle.
pub fn validate_fit_data(data: &Series) -> Result<(), AppError> {
    for i in 0..data.len() {
        let (x, y, e) = (data.x[i], data.y[i], data.err[i]);
        if !x.is_finite() || !y.is_finite() {
            return Err(AppError::input(format!(
                "Non-finite data point at row {i}: x = {x}, y = {y}."
            )));
        }
        if !e.is_finite() || e <= 0.0 {
            return Err(AppError::input(format!(
                "Error at row {i} (x = {x}) must be finite and positive, got {e}."
            )));
        }
    }
    Ok(())
}

/// Bounds of `model` in fit units.
pub fn fit_bounds(scaling: &XScaling) -> (Vec<f64>, Vec<f64>) {
    let (lower, upper) = scaling.model.bounds();
    (scaling.to_fit_units(&lower), scaling.to_fit_units(&upper))
}

/// Solve the weighted problem in fit units starting from `initial` (fit units).
pub fn solve_weighted(
    problem: &WeightedModel,
    scaling: &XScaling,
    initial: &[f64],
) -> Result<LmSolution, AppError> {
    let (lower, upper) = fit_bounds(scaling);
    minimize(problem, initial, &lower, &upper, &LmOptions::default())
}

pub(crate) fn build_report(
    model: ModelKind,
    method: FitMethod,
    values: &[f64],
    errors: &[f64],
    n_points: usize,
    chi2: f64,
) -> FitReport {
    FitReport {
        model,
        equation: model.equation().to_string(),
        method,
        params: model
            .param_names()
            .iter()
            .zip(values.iter().zip(errors.iter()))
            .map(|(name, (&value, &error))| ParamEstimate {
                name: (*name).to_string(),
                value,
                error,
            })
            .collect(),
        n_points,
        chi2,
    }
}

/// Covariance-method fit: bounded least squares, uncertainties from `sqrt(diag((JᵀJ)⁻¹))`.
///
/// Errors are treated as absolute standard deviations (no rescaling by reduced χ²).
pub fn fit_covariance(model: ModelKind, data: &Series, x_scaling: f64) -> Result<FitReport, AppError> {
    validate_fit_data(data)?;
    let scaling = XScaling::new(model, x_scaling)?;
    let problem = WeightedModel {
        model,
        x: scaling.scale_x(&data.x),
        y: data.y.clone(),
        err: data.err.clone(),
    };

    let initial = scaling.to_fit_units(&model.initial_guess());
    let solution = solve_weighted(&problem, &scaling, &initial)?;
    debug!(
        "Covariance fit converged after {} iterations (chi2 = {:.6e}, x-scaling {})",
        solution.iterations,
        solution.chi2,
        scaling.factor()
    );

    let cov = covariance_from_jacobian(&solution.jacobian).ok_or_else(|| {
        AppError::numeric(format!(
            "Parameter covariance is unavailable for {} (degenerate Jacobian).",
            model.id()
        ))
    })?;
    let sigma_fit: Vec<f64> = (0..cov.nrows()).map(|k| cov[(k, k)].max(0.0).sqrt()).collect();

    let values = scaling.to_original_units(&solution.params);
    let errors: Vec<f64> = scaling
        .to_original_units(&sigma_fit)
        .into_iter()
        .map(f64::abs)
        .collect();

    Ok(build_report(
        model,
        FitMethod::Covariance,
        &values,
        &errors,
        data.len(),
        solution.chi2,
    ))
}

/// Everything one fit invocation produced.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub interval: Interval,
    pub stride: usize,
    /// Points actually handed to the solver.
    pub data: Series,
    pub covariance: FitReport,
    pub bootstrap: Option<BootstrapFit>,
}

impl FitOutcome {
    /// The report for the requested method.
    pub fn report(&self) -> &FitReport {
        match &self.bootstrap {
            Some(b) => &b.report,
            None => &self.covariance,
        }
    }
}

/// Select the interval, fit by covariance, then bootstrap if requested.
///
/// Metropolis sampling keeps a checkpointed chain on disk and runs through
/// `run_metropolis` instead, so it is rejected here.
pub fn perform_fit(series: &Series, cfg: &FitConfig) -> Result<FitOutcome, AppError> {
    if cfg.method == FitMethod::Metropolis {
        return Err(AppError::input(
            "The Metropolis method runs as its own command; use covariance or bootstrap here.",
        ));
    }
    let interval = select_interval(&series.x, &series.y, &cfg.interval)?;
    let stride = select_stride(interval, &cfg.interval)?;
    let data = series.slice(interval, stride);
    info!(
        "Fitting {} on x in [{}, {}], every {stride} point(s), {} points total",
        cfg.model.id(),
        series.x[interval.start],
        series.x[interval.end],
        data.len()
    );

    let covariance = fit_covariance(cfg.model, &data, cfg.x_scaling)?;
    for p in &covariance.params {
        debug!("Covariance estimate {}: {} +/- {}", p.name, p.value, p.error);
    }

    let bootstrap = match cfg.method {
        FitMethod::Covariance => None,
        FitMethod::Bootstrap => Some(fit_bootstrap(
            cfg.model,
            &data,
            cfg.x_scaling,
            &covariance.values(),
            &cfg.bootstrap,
        )?),
        FitMethod::Metropolis => None,
    };

    Ok(FitOutcome {
        interval,
        stride,
        data,
        covariance,
        bootstrap,
    })
}
