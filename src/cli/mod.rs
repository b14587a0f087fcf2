//! Command-line parsing for the PIGS post-processing toolkit.
//!
//! The goal of this module is to keep **argument parsing** separate from the statistics
//! and fitting code. Conversion into typed configs happens in `app`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{
    CombineMethod, FitMethod, ModelKind, ObservableKind, DEFAULT_BOOTSTRAP_ITERATIONS, DEFAULT_BOOTSTRAP_SEED,
    DEFAULT_MAX_POINTS, DEFAULT_METROPOLIS_SEED, DEFAULT_RUN_BLOCK_SIZE,
};
use crate::io::DEFAULT_EVAPORATION_THRESHOLD;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "pigs", version, about = "Post-processing for path-integral ground state Monte Carlo output")]
pub struct Cli {
    /// Print progress and per-file detail.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Block-average selected columns of one or more files.
    Block(BlockArgs),
    /// Combine one observable over every run of an ensemble.
    Combine(CombineArgs),
    /// Fit a model to a combined (x, y, error) file.
    Fit(FitArgs),
    /// Sample model parameters with a Metropolis chain.
    Metropolis(MetropolisArgs),
    /// Moving average and RMSD of one column, to judge equilibration.
    Equilibration(EquilibrationArgs),
    /// Report `.vis` files in an ensemble where particles left the substrate.
    Evaporation(EvaporationArgs),
}

#[derive(Debug, Args, Clone)]
pub struct BlockArgs {
    /// Files to average.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Samples per block.
    #[arg(short, long, default_value_t = 1)]
    pub block_size: usize,

    /// Leading samples to discard.
    #[arg(short = 't', long, default_value_t = 0)]
    pub throwaway: usize,

    /// Column indices to average, comma separated.
    #[arg(short, long, value_delimiter = ',', default_value = "1")]
    pub indices: Vec<usize>,

    /// Prefix each output line with the file name.
    #[arg(long)]
    pub include_filename: bool,

    /// Decimals printed for means.
    #[arg(long, default_value_t = 4)]
    pub mean_precision: usize,

    /// Decimals printed for errors.
    #[arg(long, default_value_t = 5)]
    pub error_precision: usize,
}

#[derive(Debug, Args, Clone)]
pub struct CombineArgs {
    /// Ensemble directory containing the `run_<N>` directories.
    #[arg(short, long)]
    pub dirname: PathBuf,

    /// Observable to combine.
    #[arg(short, long, value_enum)]
    pub observable: ObservableKind,

    /// Combination method for superfluid fractions.
    #[arg(short, long, value_enum, default_value_t = CombineMethod::Blocking)]
    pub method: CombineMethod,

    /// Runs per run-block.
    #[arg(short, long, default_value_t = DEFAULT_RUN_BLOCK_SIZE)]
    pub block_size: usize,

    /// Digits after the decimal point (defaults to 4, or 6 for energies).
    #[arg(long)]
    pub precision: Option<usize>,

    /// Output file (defaults to the standard name inside the ensemble directory).
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Fit-domain selection shared by `fit` and `metropolis`.
#[derive(Debug, Args, Clone)]
pub struct IntervalArgs {
    /// Explicit fit domain `a,b`; overrides every other trim.
    #[arg(long, value_parser = parse_domain, allow_hyphen_values = true)]
    pub domain: Option<(f64, f64)>,

    /// Fraction of the x span to drop, half from each end.
    #[arg(long)]
    pub p_interval: Option<f64>,

    /// Drop points before the maximum of y.
    #[arg(long)]
    pub throwaway_first: bool,

    /// Drop points after the minimum of y.
    #[arg(long)]
    pub throwaway_last: bool,

    /// Maximum number of points to fit; a stride is chosen to respect it.
    #[arg(long, default_value_t = DEFAULT_MAX_POINTS)]
    pub max_points: usize,

    /// Fit only every n-th point when `max_points` does not force a stride.
    #[arg(long, default_value_t = 1)]
    pub skip: usize,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Combined file with columns x, y, error.
    #[arg(short, long)]
    pub filename: PathBuf,

    /// Model to fit.
    #[arg(long, value_enum, default_value_t = ModelKind::SfTime)]
    pub model: ModelKind,

    /// Uncertainty estimation method.
    #[arg(short, long, value_enum, default_value_t = FitMethod::Covariance)]
    pub method: FitMethod,

    #[command(flatten)]
    pub interval: IntervalArgs,

    /// Factor applied to x before fitting.
    #[arg(long, default_value_t = 1.0)]
    pub xscaling: f64,

    /// Bootstrap resamples.
    #[arg(long, default_value_t = DEFAULT_BOOTSTRAP_ITERATIONS)]
    pub bootstrap_iterations: usize,

    /// Master seed for the bootstrap batches.
    #[arg(long, default_value_t = DEFAULT_BOOTSTRAP_SEED)]
    pub seed: u64,

    /// Worker threads (defaults to SLURM_CPUS_PER_TASK, then all cores).
    #[arg(long)]
    pub cores: Option<usize>,

    /// Directory for `fit_params.txt` and the distribution files.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Also write the bootstrap distributions of every parameter.
    #[arg(long, requires = "output_dir")]
    pub save_histogram: bool,
}

#[derive(Debug, Args, Clone)]
pub struct MetropolisArgs {
    /// Combined file with columns x, y, error.
    #[arg(short, long)]
    pub filename: PathBuf,

    /// Model to sample.
    #[arg(long, value_enum, default_value_t = ModelKind::SfTime)]
    pub model: ModelKind,

    #[command(flatten)]
    pub interval: IntervalArgs,

    /// Number of blocks.
    #[arg(long, default_value_t = 500)]
    pub blocks: usize,

    /// Single-parameter updates per block.
    #[arg(long, default_value_t = 500)]
    pub passes: usize,

    /// Leading blocks excluded from the estimate.
    #[arg(long, default_value_t = 50)]
    pub burn_in: usize,

    #[arg(long, default_value_t = DEFAULT_METROPOLIS_SEED)]
    pub seed: u64,

    /// Blocks between checkpoint writes (0 writes only at the end).
    #[arg(long, default_value_t = 10)]
    pub checkpoint_every: usize,

    /// Resume from the checkpoint in the output directory.
    #[arg(long)]
    pub restart: bool,

    /// Directory for `raw.param`, `accept.param`, the checkpoint and `fit_params.txt`.
    #[arg(long)]
    pub output_dir: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct EquilibrationArgs {
    /// Trace file (e.g. a `.en` file).
    #[arg(short, long)]
    pub filename: PathBuf,

    /// Column to analyse; defaults to the last one.
    #[arg(short, long)]
    pub column: Option<usize>,

    /// Window of the moving average and RMSD.
    #[arg(short, long, default_value_t = 40)]
    pub window: usize,

    /// Window of the second-order RMSD.
    #[arg(long, default_value_t = 20)]
    pub second_window: usize,
}

#[derive(Debug, Args, Clone)]
pub struct EvaporationArgs {
    /// Ensemble directory.
    #[arg(short, long)]
    pub dirname: PathBuf,

    /// z above which a particle counts as evaporated.
    #[arg(long, default_value_t = DEFAULT_EVAPORATION_THRESHOLD)]
    pub threshold: f64,
}

fn parse_domain(s: &str) -> Result<(f64, f64), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected 'a,b', got '{s}'"))?;
    let a: f64 = a.trim().parse().map_err(|_| format!("invalid number '{a}'"))?;
    let b: f64 = b.trim().parse().map_err(|_| format!("invalid number '{b}'"))?;
    Ok((a, b))
}
