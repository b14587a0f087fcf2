//! Metropolis sampling in parameter space.
//!
//! The chain targets `exp(-χ²(p) / 2)` inside the model's box bounds. Each step:
//!
//! 1. pick a parameter `k` uniformly
//! 2. propose `p_k + (u - 0.5) * δ_k` with `u ~ U(0, 1)`
//! 3. reject proposals outside the bounds or with non-finite χ²
//! 4. accept when `Δχ² < 0`, otherwise with probability `exp(-Δχ² / 2)`
//!
//! Steps are grouped into blocks of `passes`. After every block the chain records the mean
//! parameters over the block and the per-parameter acceptance rates, then rescales each
//! `δ_k` by `rate / target` (clamped to `[0.5, 2]`). The estimate is the block average of
//! the recorded means after `burn_in` blocks.
//!
//! Block `b` draws from its own generator seeded with `seed + b`, so a chain resumed from a
//! checkpoint continues exactly as an uninterrupted one.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::{FitMethod, FitReport, MetropolisConfig, ModelKind, ParamEstimate, Series};
use crate::error::AppError;
use crate::fit::validate_fit_data;
use crate::stats::block_average;

/// Resumable chain state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetropolisState {
    pub model: ModelKind,
    /// First block not yet run.
    pub next_block: usize,
    pub params: Vec<f64>,
    pub displacements: Vec<f64>,
    /// Mean parameters of each finished block.
    pub trace: Vec<Vec<f64>>,
    /// Per-parameter acceptance rate of each finished block; `None` when the parameter was
    /// never proposed in that block.
    pub acceptance: Vec<Vec<Option<f64>>>,
}

impl MetropolisState {
    /// Fresh chain at `start` with the model's default displacements.
    pub fn new(model: ModelKind, start: Vec<f64>) -> Result<Self, AppError> {
        if start.len() != model.param_count() {
            return Err(AppError::input(format!(
                "Model {} has {} parameters but the start point has {}.",
                model.id(),
                model.param_count(),
                start.len()
            )));
        }
        let (lower, upper) = model.bounds();
        let params = start
            .iter()
            .zip(lower.iter().zip(upper.iter()))
            .map(|(&v, (&lo, &hi))| v.clamp(lo, hi))
            .collect();
        Ok(Self {
            model,
            next_block: 0,
            params,
            displacements: model.displacements(),
            trace: Vec::new(),
            acceptance: Vec::new(),
        })
    }

    fn check(&self, model: ModelKind) -> Result<(), AppError> {
        let m = model.param_count();
        if self.model != model
            || self.params.len() != m
            || self.displacements.len() != m
            || self.trace.len() != self.next_block
            || self.acceptance.len() != self.next_block
        {
            return Err(AppError::input(format!(
                "Checkpoint does not match model {} ({} blocks recorded, next block {}).",
                model.id(),
                self.trace.len(),
                self.next_block
            )));
        }
        Ok(())
    }
}

/// Final chain output.
#[derive(Debug, Clone)]
pub struct MetropolisFit {
    pub report: FitReport,
    pub state: MetropolisState,
}

fn chi2(model: ModelKind, data: &Series, params: &[f64]) -> f64 {
    data.x
        .iter()
        .zip(data.y.iter().zip(data.err.iter()))
        .map(|(&x, (&y, &e))| {
            let r = (y - model.predict(x, params)) / e;
            r * r
        })
        .sum()
}

/// Advance the chain by one block of `passes` single-parameter updates.
fn run_block(
    data: &Series,
    state: &mut MetropolisState,
    cfg: &MetropolisConfig,
    bounds: &(Vec<f64>, Vec<f64>),
) {
    let model = state.model;
    let m = state.params.len();
    let mut rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(state.next_block as u64));

    let mut current = chi2(model, data, &state.params);
    let mut tried = vec![0usize; m];
    let mut accepted = vec![0usize; m];
    let mut sums = vec![0.0; m];
    let mut trial = state.params.clone();

    for _ in 0..cfg.passes {
        let k = rng.gen_range(0..m);
        let u: f64 = rng.r#gen();
        tried[k] += 1;

        trial.copy_from_slice(&state.params);
        trial[k] += (u - 0.5) * state.displacements[k];

        if trial[k] >= bounds.0[k] && trial[k] <= bounds.1[k] {
            let proposed = chi2(model, data, &trial);
            if proposed.is_finite() {
                let delta = proposed - current;
                if delta < 0.0 || rng.r#gen::<f64>() < (-delta / 2.0).exp() {
                    state.params[k] = trial[k];
                    current = proposed;
                    accepted[k] += 1;
                }
            }
        }

        for (s, p) in sums.iter_mut().zip(state.params.iter()) {
            *s += p;
        }
    }

    let rates: Vec<Option<f64>> = tried
        .iter()
        .zip(accepted.iter())
        .map(|(&t, &a)| (t > 0).then(|| a as f64 / t as f64))
        .collect();

    for (delta, rate) in state.displacements.iter_mut().zip(rates.iter()) {
        if let Some(rate) = rate {
            *delta *= (rate / cfg.target_acceptance).clamp(0.5, 2.0);
        }
    }

    state
        .trace
        .push(sums.iter().map(|s| s / cfg.passes as f64).collect());
    state.acceptance.push(rates);
    state.next_block += 1;
}

/// Run (or resume) the chain up to `cfg.blocks`.
///
/// `on_checkpoint` is called every `checkpoint_every` blocks and once at the end, with the
/// state after the last finished block.
pub fn run_metropolis<F>(
    data: &Series,
    mut state: MetropolisState,
    cfg: &MetropolisConfig,
    mut on_checkpoint: F,
) -> Result<MetropolisFit, AppError>
where
    F: FnMut(&MetropolisState) -> Result<(), AppError>,
{
    let model = state.model;
    validate_fit_data(data)?;
    state.check(model)?;
    if cfg.passes == 0 {
        return Err(AppError::input("Metropolis passes per block must be at least 1."));
    }
    if !(cfg.target_acceptance > 0.0 && cfg.target_acceptance < 1.0) {
        return Err(AppError::input(format!(
            "Target acceptance must lie in (0, 1), got {}.",
            cfg.target_acceptance
        )));
    }
    if cfg.burn_in + 2 > cfg.blocks {
        return Err(AppError::insufficient(format!(
            "Need at least 2 blocks after a burn-in of {}, but only {} blocks are requested.",
            cfg.burn_in, cfg.blocks
        )));
    }

    let bounds = model.bounds();
    info!(
        "Metropolis: blocks {}..{} of {} passes (seed {})",
        state.next_block, cfg.blocks, cfg.passes, cfg.seed
    );

    while state.next_block < cfg.blocks {
        run_block(data, &mut state, cfg, &bounds);
        debug!(
            "Block {}: params {:?}, acceptance {:?}",
            state.next_block,
            state.params,
            state.acceptance.last()
        );
        if cfg.checkpoint_every > 0 && state.next_block % cfg.checkpoint_every == 0 {
            on_checkpoint(&state)?;
        }
    }
    on_checkpoint(&state)?;

    let kept = &state.trace[cfg.burn_in..cfg.blocks];
    let mut params = Vec::with_capacity(model.param_count());
    for (k, name) in model.param_names().iter().enumerate() {
        let series: Vec<f64> = kept.iter().map(|row| row[k]).collect();
        let est = block_average(&series, 1, 0)?;
        params.push(ParamEstimate {
            name: (*name).to_string(),
            value: est.mean,
            error: est.error,
        });
    }
    let values: Vec<f64> = params.iter().map(|p| p.value).collect();

    let report = FitReport {
        model,
        equation: model.equation().to_string(),
        method: FitMethod::Metropolis,
        params,
        n_points: data.len(),
        chi2: chi2(model, data, &values),
    };
    Ok(MetropolisFit { report, state })
}
