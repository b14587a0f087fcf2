//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs the logger
//! - turns arguments into typed configs
//! - runs the shared workflows in `pipeline`
//! - prints reports

use clap::Parser;
use log::{info, LevelFilter};

use crate::cli::{
    BlockArgs, Cli, CombineArgs, Command, EquilibrationArgs, EvaporationArgs, FitArgs, IntervalArgs, MetropolisArgs,
};
use crate::domain::{
    BlockConfig, BootstrapConfig, CombineConfig, FitConfig, IntervalConfig, MetropolisConfig,
};
use crate::error::AppError;
use crate::report::{format_block_line, format_brief_line, format_equilibration, format_fit_summary, format_metropolis_summary};

pub mod pipeline;

/// Environment variable consulted for the worker count when `--cores` is absent.
pub const CORES_ENV: &str = "SLURM_CPUS_PER_TASK";

/// Entry point for the `pigs` binary.
pub fn run() -> Result<(), AppError> {
    // A `.env` next to the ensemble may set SLURM_CPUS_PER_TASK for local runs.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(log_level(cli.verbose, cli.quiet));

    match cli.command {
        Command::Block(args) => handle_block(args),
        Command::Combine(args) => handle_combine(args),
        Command::Fit(args) => handle_fit(args, cli.verbose),
        Command::Metropolis(args) => handle_metropolis(args, cli.verbose),
        Command::Equilibration(args) => handle_equilibration(args),
        Command::Evaporation(args) => handle_evaporation(args),
    }
}

fn log_level(verbose: bool, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

fn init_logging(level: LevelFilter) {
    colog::default_builder().filter_level(level).init();
}

fn handle_block(args: BlockArgs) -> Result<(), AppError> {
    let cfg = block_config_from_args(&args);
    for (path, estimates) in pipeline::run_block(&args.files, &cfg)? {
        println!("{}", format_block_line(&path, &estimates, &cfg));
    }
    Ok(())
}

fn handle_combine(args: CombineArgs) -> Result<(), AppError> {
    let cfg = combine_config_from_args(&args);
    let (series, path) = pipeline::run_combine(&cfg)?;
    println!("Combined {} rows into {}", series.len(), path.display());
    Ok(())
}

/// Full summary with `--verbose`, otherwise the one-line result batch scripts parse.
fn handle_fit(args: FitArgs, verbose: bool) -> Result<(), AppError> {
    let cfg = fit_config_from_args(&args)?;
    let outcome = pipeline::run_fit(
        &args.filename,
        &cfg,
        args.output_dir.as_deref(),
        args.save_histogram,
    )?;
    if verbose {
        println!("{}", format_fit_summary(&args.filename, &outcome));
    } else {
        println!("{}", format_brief_line(&args.filename, outcome.report()));
    }
    Ok(())
}

fn handle_metropolis(args: MetropolisArgs, verbose: bool) -> Result<(), AppError> {
    let interval = interval_config_from_args(&args.interval);
    let cfg = MetropolisConfig {
        blocks: args.blocks,
        passes: args.passes,
        burn_in: args.burn_in,
        seed: args.seed,
        checkpoint_every: args.checkpoint_every,
        ..MetropolisConfig::default()
    };
    let fit = pipeline::run_metropolis_chain(
        &args.filename,
        args.model,
        &interval,
        &cfg,
        &args.output_dir,
        args.restart,
    )?;
    if verbose {
        println!("{}", format_metropolis_summary(&fit, cfg.burn_in));
    } else {
        println!("{}", format_brief_line(&args.filename, &fit.report));
    }
    Ok(())
}

fn handle_equilibration(args: EquilibrationArgs) -> Result<(), AppError> {
    let trace = pipeline::run_equilibration(&args.filename, args.column, args.window, args.second_window)?;
    print!("{}", format_equilibration(&trace));
    Ok(())
}

fn handle_evaporation(args: EvaporationArgs) -> Result<(), AppError> {
    let flagged = crate::io::detect_evaporation(&args.dirname, args.threshold)?;
    if flagged.is_empty() {
        info!("No evaporation above z = {}", args.threshold);
    }
    for path in flagged {
        println!("{}", path.display());
    }
    Ok(())
}

pub fn block_config_from_args(args: &BlockArgs) -> BlockConfig {
    BlockConfig {
        block_size: args.block_size,
        burn_in: args.throwaway,
        columns: args.indices.clone(),
        mean_precision: args.mean_precision,
        error_precision: args.error_precision,
        include_filename: args.include_filename,
    }
}

pub fn combine_config_from_args(args: &CombineArgs) -> CombineConfig {
    CombineConfig {
        dir: args.dirname.clone(),
        kind: args.observable,
        method: args.method,
        block_size: args.block_size,
        precision: args.precision,
        output: args.output.clone(),
    }
}

pub fn interval_config_from_args(args: &IntervalArgs) -> IntervalConfig {
    IntervalConfig {
        domain: args.domain,
        p_interval: args.p_interval,
        trim_before_max: args.throwaway_first,
        trim_after_min: args.throwaway_last,
        max_points: Some(args.max_points),
        skip: args.skip,
    }
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    Ok(FitConfig {
        model: args.model,
        method: args.method,
        x_scaling: args.xscaling,
        interval: interval_config_from_args(&args.interval),
        bootstrap: BootstrapConfig {
            iterations: args.bootstrap_iterations,
            workers: resolve_workers(args.cores)?,
            seed: args.seed,
        },
    })
}

/// Worker threads: `--cores`, else `SLURM_CPUS_PER_TASK`, else the available parallelism.
pub fn resolve_workers(cores: Option<usize>) -> Result<usize, AppError> {
    let available = std::thread::available_parallelism().map_or(1, |n| n.get());
    workers_from(cores, std::env::var(CORES_ENV).ok().as_deref(), available)
}

fn workers_from(cores: Option<usize>, env: Option<&str>, available: usize) -> Result<usize, AppError> {
    let workers = match (cores, env) {
        (Some(n), _) => n,
        (None, Some(v)) => v.trim().parse().map_err(|_| {
            AppError::input(format!("{CORES_ENV} must be a positive integer, got '{v}'."))
        })?,
        (None, None) => available,
    };
    if workers == 0 {
        return Err(AppError::input("Worker count must be at least 1."));
    }
    Ok(workers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;

    #[test]
    fn worker_precedence() {
        assert_eq!(workers_from(Some(3), Some("8"), 16).unwrap(), 3);
        assert_eq!(workers_from(None, Some(" 8 "), 16).unwrap(), 8);
        assert_eq!(workers_from(None, None, 16).unwrap(), 16);
        assert!(workers_from(Some(0), None, 16).unwrap_err().is_input());
        assert!(workers_from(None, Some("many"), 16).unwrap_err().is_input());
    }

    #[test]
    fn log_levels() {
        assert_eq!(log_level(false, false), LevelFilter::Warn);
        assert_eq!(log_level(true, false), LevelFilter::Debug);
        assert_eq!(log_level(false, true), LevelFilter::Error);
    }

    #[test]
    fn fit_args_map_to_config() {
        let cli = Cli::try_parse_from([
            "pigs", "fit", "-f", "data", "--model", "en-time-step", "--p-interval", "0.2", "--throwaway-first",
            "--cores", "2", "--bootstrap-iterations", "50", "--xscaling", "10",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let cfg = fit_config_from_args(&args).unwrap();
        assert_eq!(cfg.model, ModelKind::EnTimeStep);
        assert_eq!(cfg.interval.p_interval, Some(0.2));
        assert!(cfg.interval.trim_before_max);
        assert!(!cfg.interval.trim_after_min);
        assert_eq!(cfg.interval.max_points, Some(1000));
        assert_eq!(cfg.bootstrap.workers, 2);
        assert_eq!(cfg.bootstrap.iterations, 50);
        assert_eq!(cfg.x_scaling, 10.0);
    }
}
