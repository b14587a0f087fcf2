//! Aggregation of one observable across the runs of an ensemble.
//!
//! Inputs are given per run: `runs[r][i]` is the value of run `r` at x index `i`. All
//! runs must share the same length except in `energy_combine`, which tolerates runs that
//! stopped early.
//!
//! Strategies:
//! - `weighted_combine`: `Σ w v / Σ w` per row, no error column
//! - `blocked_combine`: runs grouped into run-blocks, error = population std of block means
//! - `propagated_combine`: row mean, error = `sqrt(Σ err²) / n_runs`
//! - `energy_combine`: NaN-aware row mean over runs of unequal length

use log::debug;

use crate::error::AppError;
use crate::stats::{mean, population_std};

/// Pointwise estimate and standard error.
#[derive(Debug, Clone, PartialEq)]
pub struct Combined {
    pub value: Vec<f64>,
    pub error: Vec<f64>,
}

fn common_len(runs: &[Vec<f64>], what: &str) -> Result<usize, AppError> {
    let Some(first) = runs.first() else {
        return Err(AppError::input(format!("No runs to combine ({what}).")));
    };
    let n = first.len();
    for (r, run) in runs.iter().enumerate() {
        if run.len() != n {
            return Err(AppError::input(format!(
                "Shape mismatch in {what}: run {} has {} rows, expected {n}.",
                r + 1,
                run.len()
            )));
        }
    }
    Ok(n)
}

fn row(runs: &[Vec<f64>], i: usize) -> Vec<f64> {
    runs.iter().map(|run| run[i]).collect()
}

/// Weighted mean across runs: `Σ(w·v) / Σw` per row.
pub fn weighted_combine(values: &[Vec<f64>], weights: &[Vec<f64>]) -> Result<Vec<f64>, AppError> {
    let n = common_len(values, "values")?;
    let n_w = common_len(weights, "weights")?;
    if values.len() != weights.len() || n != n_w {
        return Err(AppError::input(format!(
            "Values ({} runs x {n} rows) and weights ({} runs x {n_w} rows) differ in shape.",
            values.len(),
            weights.len()
        )));
    }

    (0..n)
        .map(|i| {
            let (num, den) = values
                .iter()
                .zip(weights.iter())
                .fold((0.0, 0.0), |(num, den), (v, w)| (num + w[i] * v[i], den + w[i]));
            if den == 0.0 {
                return Err(AppError::numeric(format!(
                    "Weights sum to zero in row {i}; the weighted mean is undefined."
                )));
            }
            Ok(num / den)
        })
        .collect()
}

/// Average runs within run-blocks of `block_size`, then take the mean and population
/// standard deviation across run-blocks.
///
/// Leftover runs (when `block_size` does not divide the run count) are averaged into one
/// extra pseudo-block.
pub fn blocked_combine(runs: &[Vec<f64>], block_size: usize) -> Result<Combined, AppError> {
    if block_size == 0 {
        return Err(AppError::input("Run-block size must be at least 1."));
    }
    let n = common_len(runs, "blocked combination")?;
    let full_blocks = runs.len() / block_size;
    let leftover = runs.len() % block_size;
    debug!(
        "Blocking {} runs into {full_blocks} blocks of {block_size}{}",
        runs.len(),
        if leftover > 0 {
            format!(" plus a pseudo-block of {leftover}")
        } else {
            String::new()
        }
    );

    let mut value = Vec::with_capacity(n);
    let mut error = Vec::with_capacity(n);
    for i in 0..n {
        let samples = row(runs, i);
        let block_means: Vec<f64> = samples.chunks(block_size).map(mean).collect();
        value.push(mean(&block_means));
        error.push(population_std(&block_means));
    }
    Ok(Combined { value, error })
}

/// Row mean with per-run errors added in quadrature: `sqrt(Σ err²) / n_runs`.
pub fn propagated_combine(values: &[Vec<f64>], errors: &[Vec<f64>]) -> Result<Combined, AppError> {
    let n = common_len(values, "values")?;
    let n_e = common_len(errors, "errors")?;
    if values.len() != errors.len() || n != n_e {
        return Err(AppError::input(format!(
            "Values ({} runs x {n} rows) and errors ({} runs x {n_e} rows) differ in shape.",
            values.len(),
            errors.len()
        )));
    }
    let n_runs = values.len() as f64;

    let value = (0..n).map(|i| mean(&row(values, i))).collect();
    let error = (0..n)
        .map(|i| errors.iter().map(|e| e[i] * e[i]).sum::<f64>().sqrt() / n_runs)
        .collect();
    Ok(Combined { value, error })
}

/// NaN-aware row mean over runs that may have stopped early.
///
/// Each run is padded with missing entries up to `expected_len`. Rows missing in every run
/// are dropped, so the result has one entry per row that any run reached. A run longer than
/// `expected_len` is an input error.
pub fn energy_combine(runs: &[Vec<f64>], expected_len: usize) -> Result<Vec<f64>, AppError> {
    if runs.is_empty() {
        return Err(AppError::input("No runs to combine (energy)."));
    }
    if let Some((r, run)) = runs.iter().enumerate().find(|(_, run)| run.len() > expected_len) {
        return Err(AppError::input(format!(
            "Run {} has {} blocks but the run metadata declares {expected_len}.",
            r + 1,
            run.len()
        )));
    }

    let mut out = Vec::with_capacity(expected_len);
    for i in 0..expected_len {
        let present: Vec<f64> = runs
            .iter()
            .filter_map(|run| run.get(i).copied())
            .filter(|v| !v.is_nan())
            .collect();
        if !present.is_empty() {
            out.push(mean(&present));
        }
    }
    Ok(out)
}
