//! Shared domain types.
//!
//! These types are kept lightweight so they can be:
//!
//! - built from CLI flags or directly from library code
//! - passed between combination, interval selection and fitting
//! - exported (fit reports serialize to JSON)

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Default number of runs per run-block in blocked ensemble combination.
pub const DEFAULT_RUN_BLOCK_SIZE: usize = 20;
/// Default number of bootstrap resamples.
pub const DEFAULT_BOOTSTRAP_ITERATIONS: usize = 100_000;
/// Master seed from which per-batch bootstrap seeds are drawn.
pub const DEFAULT_BOOTSTRAP_SEED: u64 = 666;
/// Seed for Metropolis parameter-space sampling.
pub const DEFAULT_METROPOLIS_SEED: u64 = 927;
/// Upper bound on the number of points handed to the fitter.
pub const DEFAULT_MAX_POINTS: usize = 1000;

/// Observable written by the simulation, one file per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ObservableKind {
    /// Superfluid fraction vs imaginary time (`.sd`): x, fraction, error.
    Superfluid,
    /// Energies per simulation block (`.en`): block, kinetic, potential, total.
    Energy,
    /// Structure factor (`.sq`): wavevector, S(q), weight. Not sorted by q.
    StructureFactor,
}

impl ObservableKind {
    /// File extension (with leading dot) of the per-run files.
    pub fn extension(self) -> &'static str {
        match self {
            ObservableKind::Superfluid => ".sd",
            ObservableKind::Energy => ".en",
            ObservableKind::StructureFactor => ".sq",
        }
    }

    /// Name of the combined file written into the ensemble directory.
    pub fn combined_file_name(self) -> &'static str {
        match self {
            ObservableKind::Superfluid => "sf_fractions_combined",
            ObservableKind::Energy => "energies_combined",
            ObservableKind::StructureFactor => "sq_combined",
        }
    }

    /// Header of the combined file (without the leading `# `).
    pub fn combined_header(self) -> &'static str {
        match self {
            ObservableKind::Superfluid => "block  fraction  error",
            ObservableKind::Energy => "block     kinetic     potential       total",
            ObservableKind::StructureFactor => "q  S(q)",
        }
    }

    /// Digits after the decimal point in the combined file.
    pub fn default_precision(self) -> usize {
        match self {
            ObservableKind::Superfluid | ObservableKind::StructureFactor => 4,
            ObservableKind::Energy => 6,
        }
    }
}

/// How superfluid-fraction runs are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CombineMethod {
    /// Block the runs and use the spread of run-block means as the error.
    Blocking,
    /// Plain row mean with per-run errors added in quadrature.
    Propagated,
}

/// How parameter uncertainties are estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FitMethod {
    /// Square roots of the diagonal of the linearized covariance matrix.
    Covariance,
    /// Mean and spread over refits of Gaussian-perturbed datasets.
    Bootstrap,
    /// Block average of a Metropolis chain in parameter space (`metropolis` subcommand).
    #[value(skip)]
    Metropolis,
}

/// Registered physical models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Energy per particle vs projection time: `E_0 + B * exp(-C * x)`.
    EnProjTime,
    /// Energy per particle vs time step (fourth-order propagator): `E_0 + A * x**4`.
    EnTimeStep,
    /// Superfluid fraction vs imaginary time: `(A / x) * (1 - exp(-G * x)) + C`.
    SfTime,
    /// Superfluid fraction vs total projection time: `B * exp(-C * x) + S`.
    SfProjTime,
}

/// An observable series: `(x, y, y_err)` triples with non-decreasing x.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub err: Vec<f64>,
}

impl Series {
    pub fn new(x: Vec<f64>, y: Vec<f64>, err: Vec<f64>) -> Result<Self, AppError> {
        if x.len() != y.len() || x.len() != err.len() {
            return Err(AppError::input(format!(
                "Series columns differ in length: x={}, y={}, err={}.",
                x.len(),
                y.len(),
                err.len()
            )));
        }
        Ok(Self { x, y, err })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Points `start..=end` taking every `stride`-th one.
    pub fn slice(&self, interval: Interval, stride: usize) -> Series {
        let stride = stride.max(1);
        let end = interval.end.min(self.len().saturating_sub(1));
        let pick = |v: &[f64]| -> Vec<f64> {
            if self.is_empty() || interval.start > end {
                return Vec::new();
            }
            v[interval.start..=end].iter().step_by(stride).copied().collect()
        };
        Series {
            x: pick(&self.x),
            y: pick(&self.y),
            err: pick(&self.err),
        }
    }
}

/// Inclusive index range `start..=end` selected for fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: usize,
    pub end: usize,
}

impl Interval {
    pub fn len(&self) -> usize {
        (self.end + 1).saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Per-ensemble aggregate of one observable.
///
/// `columns` holds one vector per output column after `x` (e.g. value and error).
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedSeries {
    pub kind: ObservableKind,
    pub x: Vec<f64>,
    pub columns: Vec<Vec<f64>>,
}

impl CombinedSeries {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Block-averaged mean and its standard error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockEstimate {
    pub mean: f64,
    pub error: f64,
    pub n_blocks: usize,
}

/// Configuration for block averaging of a single file.
#[derive(Debug, Clone)]
pub struct BlockConfig {
    pub block_size: usize,
    /// Leading samples discarded before blocking.
    pub burn_in: usize,
    /// Column indices to average.
    pub columns: Vec<usize>,
    /// Decimals printed for the mean.
    pub mean_precision: usize,
    /// Decimals printed for the error.
    pub error_precision: usize,
    /// Prefix the output line with the file name.
    pub include_filename: bool,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            block_size: 1,
            burn_in: 0,
            columns: vec![1],
            mean_precision: 4,
            error_precision: 5,
            include_filename: false,
        }
    }
}

/// Configuration for combining one observable across an ensemble.
#[derive(Debug, Clone)]
pub struct CombineConfig {
    /// Ensemble directory containing the `run_<N>` directories.
    pub dir: PathBuf,
    pub kind: ObservableKind,
    pub method: CombineMethod,
    /// Runs per run-block (blocking method only).
    pub block_size: usize,
    /// Decimals in the output; `None` uses the observable's default.
    pub precision: Option<usize>,
    /// Output path; `None` writes the default name inside `dir`.
    pub output: Option<PathBuf>,
}

impl CombineConfig {
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.dir.join(self.kind.combined_file_name()))
    }

    pub fn precision(&self) -> usize {
        self.precision.unwrap_or_else(|| self.kind.default_precision())
    }
}

/// Fit-domain trimming policies and down-sampling.
#[derive(Debug, Clone, Default)]
pub struct IntervalConfig {
    /// Explicit `[a, b]` domain; overrides every other policy.
    pub domain: Option<(f64, f64)>,
    /// Fraction of the x span removed (half from each end); active when `> 0`.
    pub p_interval: Option<f64>,
    /// Drop points before the global maximum of y.
    pub trim_before_max: bool,
    /// Drop points after the global minimum of y.
    pub trim_after_min: bool,
    /// Cap on points in the trimmed range; forces a stride when exceeded.
    pub max_points: Option<usize>,
    /// Stride used when `max_points` does not apply.
    pub skip: usize,
}

/// Bootstrap resampling settings.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub iterations: usize,
    /// Number of batches, one per worker thread.
    pub workers: usize,
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_BOOTSTRAP_ITERATIONS,
            workers: 1,
            seed: DEFAULT_BOOTSTRAP_SEED,
        }
    }
}

/// A full fit request as understood by the pipeline.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub model: ModelKind,
    pub method: FitMethod,
    /// Factor applied to x before fitting (numerical conditioning).
    pub x_scaling: f64,
    pub interval: IntervalConfig,
    pub bootstrap: BootstrapConfig,
}

impl FitConfig {
    pub fn new(model: ModelKind, method: FitMethod) -> Self {
        Self {
            model,
            method,
            x_scaling: 1.0,
            interval: IntervalConfig {
                skip: 1,
                ..IntervalConfig::default()
            },
            bootstrap: BootstrapConfig::default(),
        }
    }
}

/// Metropolis parameter-space sampling settings.
#[derive(Debug, Clone)]
pub struct MetropolisConfig {
    pub blocks: usize,
    /// Single-parameter updates per block.
    pub passes: usize,
    /// Leading blocks excluded from the final estimate.
    pub burn_in: usize,
    pub seed: u64,
    /// Blocks between checkpoint writes (0 writes only the final one).
    pub checkpoint_every: usize,
    /// Target acceptance rate for displacement tuning.
    pub target_acceptance: f64,
}

impl Default for MetropolisConfig {
    fn default() -> Self {
        Self {
            blocks: 500,
            passes: 500,
            burn_in: 50,
            seed: DEFAULT_METROPOLIS_SEED,
            checkpoint_every: 10,
            target_acceptance: 0.5,
        }
    }
}

/// One fitted parameter in original (unscaled) units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamEstimate {
    pub name: String,
    pub value: f64,
    pub error: f64,
}

/// Fit output for a single method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    pub model: ModelKind,
    pub equation: String,
    pub method: FitMethod,
    pub params: Vec<ParamEstimate>,
    /// Points used in the fit.
    pub n_points: usize,
    /// Weighted sum of squared residuals at the reported parameters.
    pub chi2: f64,
}

impl FitReport {
    pub fn values(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.value).collect()
    }

    pub fn errors(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.error).collect()
    }

    pub fn param(&self, name: &str) -> Option<&ParamEstimate> {
        self.params.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_is_inclusive_and_strided() {
        let x: Vec<f64> = (0..10).map(f64::from).collect();
        let series = Series::new(x.clone(), x.clone(), vec![1.0; 10]).unwrap();
        let sliced = series.slice(Interval { start: 2, end: 8 }, 3);
        assert_eq!(sliced.x, vec![2.0, 5.0, 8.0]);
    }

    #[test]
    fn series_rejects_ragged_columns() {
        let err = Series::new(vec![1.0], vec![1.0, 2.0], vec![0.1]).unwrap_err();
        assert!(err.is_input());
    }
}
