//! Shared workflows behind the subcommands.
//!
//! Each function goes from files on disk to computed results; printing stays in `app`.
//! Keeping them here makes the whole path testable without spawning the binary.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::domain::{
    BlockConfig, BlockEstimate, CombineConfig, CombinedSeries, FitConfig, IntervalConfig, MetropolisConfig,
    ModelKind, Series,
};
use crate::error::AppError;
use crate::fit::{
    fit_covariance, perform_fit, run_metropolis, select_interval, select_stride, FitOutcome, MetropolisFit,
    MetropolisState,
};
use crate::io::{
    combine_ensemble, read_checkpoint, read_table, write_block_rows, write_checkpoint, write_combined,
    write_distributions, write_fit_params,
};
use crate::stats::{block_average_columns, equilibration_trace, EquilibrationTrace};

/// Checkpoint file name inside the Metropolis output directory.
pub const CHECKPOINT_FILE: &str = "metropolis_checkpoint.json";
pub const RAW_PARAMS_FILE: &str = "raw.param";
pub const ACCEPTANCE_FILE: &str = "accept.param";

/// Block-average the requested columns of every file, in order.
pub fn run_block(files: &[PathBuf], cfg: &BlockConfig) -> Result<Vec<(PathBuf, Vec<BlockEstimate>)>, AppError> {
    files
        .iter()
        .map(|path| {
            let table = read_table(path)?;
            let estimates = block_average_columns(&table.rows, &cfg.columns, cfg.block_size, cfg.burn_in)
                .map_err(|e| AppError::new(e.exit_code(), format!("{}: {}", path.display(), e.message())))?;
            Ok((path.clone(), estimates))
        })
        .collect()
}

/// Combine the ensemble and write the combined file; returns the series and its path.
pub fn run_combine(cfg: &CombineConfig) -> Result<(CombinedSeries, PathBuf), AppError> {
    let series = combine_ensemble(cfg)?;
    let path = cfg.output_path();
    write_combined(&path, &series, cfg.precision())?;
    info!("Wrote {} rows to {}", series.len(), path.display());
    Ok((series, path))
}

fn read_series(path: &Path) -> Result<Series, AppError> {
    let table = read_table(path)?;
    if table.is_empty() {
        return Err(AppError::insufficient(format!(
            "'{}' contains no data rows.",
            path.display()
        )));
    }
    table.to_series()
}

/// Fit a combined `(x, y, error)` file.
///
/// With an output directory, writes `fit_params.txt` and, when `save_histogram` is set and
/// the bootstrap ran, the per-parameter distributions.
pub fn run_fit(
    path: &Path,
    cfg: &FitConfig,
    output_dir: Option<&Path>,
    save_histogram: bool,
) -> Result<FitOutcome, AppError> {
    let series = read_series(path)?;
    let outcome = perform_fit(&series, cfg)?;

    if let Some(dir) = output_dir {
        ensure_dir(dir)?;
        let written = write_fit_params(dir, outcome.report())?;
        info!("Wrote {}", written.display());
        if save_histogram {
            match &outcome.bootstrap {
                Some(boot) => write_distributions(dir, cfg.model.param_names(), &boot.samples)?,
                None => warn!("No bootstrap distributions to save: the covariance method was used."),
            }
        }
    }
    Ok(outcome)
}

/// Run or resume a Metropolis chain on a combined file.
///
/// A fresh chain starts from the covariance fit of the selected points. With `restart`
/// the chain continues from the checkpoint in `output_dir` using the seed stored there.
pub fn run_metropolis_chain(
    path: &Path,
    model: ModelKind,
    interval: &IntervalConfig,
    cfg: &MetropolisConfig,
    output_dir: &Path,
    restart: bool,
) -> Result<MetropolisFit, AppError> {
    let series = read_series(path)?;
    let range = select_interval(&series.x, &series.y, interval)?;
    let stride = select_stride(range, interval)?;
    let data = series.slice(range, stride);
    ensure_dir(output_dir)?;

    let checkpoint_path = output_dir.join(CHECKPOINT_FILE);
    let mut cfg = cfg.clone();
    let state = if restart {
        let checkpoint = read_checkpoint(&checkpoint_path)?;
        if checkpoint.seed != cfg.seed {
            warn!(
                "Using the checkpoint seed {} instead of {}.",
                checkpoint.seed, cfg.seed
            );
            cfg.seed = checkpoint.seed;
        }
        info!(
            "Resuming from {} at block {} (saved {})",
            checkpoint_path.display(),
            checkpoint.state.next_block,
            checkpoint.saved_at
        );
        checkpoint.state
    } else {
        let start = fit_covariance(model, &data, 1.0)?;
        MetropolisState::new(model, start.values())?
    };

    let seed = cfg.seed;
    let fit = run_metropolis(&data, state, &cfg, |state| {
        write_checkpoint(&checkpoint_path, seed, state)
    })?;

    let names = model.param_names();
    write_block_rows(&output_dir.join(RAW_PARAMS_FILE), names, &fit.state.trace)?;
    let rates: Vec<Vec<f64>> = fit
        .state
        .acceptance
        .iter()
        .map(|row| row.iter().map(|r| r.unwrap_or(f64::NAN)).collect())
        .collect();
    write_block_rows(&output_dir.join(ACCEPTANCE_FILE), names, &rates)?;
    write_fit_params(output_dir, &fit.report)?;
    Ok(fit)
}

/// Moving-window equilibration diagnostics of one column (the last by default).
pub fn run_equilibration(
    path: &Path,
    column: Option<usize>,
    window: usize,
    second_window: usize,
) -> Result<EquilibrationTrace, AppError> {
    let table = read_table(path)?;
    let column = match column {
        Some(c) => c,
        None => table.n_cols.checked_sub(1).ok_or_else(|| {
            AppError::insufficient(format!("'{}' contains no data rows.", path.display()))
        })?,
    };
    equilibration_trace(&table.column(column)?, window, second_window)
}

fn ensure_dir(dir: &Path) -> Result<(), AppError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        AppError::input(format!("Failed to create directory '{}': {e}", dir.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitMethod, ObservableKind};
    use crate::models::predict_all;
    use std::fs;

    fn write_sd(dir: &Path) -> PathBuf {
        let x: Vec<f64> = (0..30).map(|i| 0.1 * (i + 1) as f64).collect();
        let y = predict_all(ModelKind::SfTime, &x, &[0.4, 2.0, 0.2]);
        let mut body = String::from("# block  fraction  error\n");
        for (xi, yi) in x.iter().zip(y.iter()) {
            body.push_str(&format!("{xi:e}\t{yi:e}\t1e-4\n"));
        }
        let path = dir.join("sf_fractions_combined");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn block_reports_one_line_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.en");
        let body: String = (0..20).map(|i| format!("{i} {}\n", (i % 2) as f64)).collect();
        fs::write(&path, body).unwrap();
        let cfg = BlockConfig { block_size: 2, ..BlockConfig::default() };
        let out = run_block(&[path.clone()], &cfg).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].1[0].mean, 0.5);
        assert_eq!(out[0].1[0].error, 0.0);
    }

    #[test]
    fn block_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.en");
        fs::write(&path, "1 2\n").unwrap();
        let err = run_block(&[path], &BlockConfig::default()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INSUFFICIENT);
        assert!(err.message().contains("short.en"));
    }

    #[test]
    fn fit_writes_params_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sd(dir.path());
        let out_dir = dir.path().join("out");
        let cfg = FitConfig::new(ModelKind::SfTime, FitMethod::Covariance);
        let outcome = run_fit(&path, &cfg, Some(&out_dir), true).unwrap();
        assert_eq!(outcome.data.len(), 30);
        let text = fs::read_to_string(out_dir.join("fit_params.txt")).unwrap();
        assert!(text.starts_with("#    Parameter   Value   Error:\nA  "));
        assert!(!out_dir.join("C_hist.json").exists());
    }

    #[test]
    fn metropolis_writes_traces_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sd(dir.path());
        let out_dir = dir.path().join("chain");
        let interval = IntervalConfig { skip: 1, ..IntervalConfig::default() };
        let cfg = MetropolisConfig { blocks: 8, passes: 50, burn_in: 2, ..MetropolisConfig::default() };

        let first = run_metropolis_chain(&path, ModelKind::SfTime, &interval, &cfg, &out_dir, false).unwrap();
        assert_eq!(first.state.trace.len(), 8);
        let raw = fs::read_to_string(out_dir.join(RAW_PARAMS_FILE)).unwrap();
        assert_eq!(raw.lines().count(), 9);
        assert!(out_dir.join(ACCEPTANCE_FILE).exists());

        let longer = MetropolisConfig { blocks: 10, ..cfg };
        let resumed = run_metropolis_chain(&path, ModelKind::SfTime, &interval, &longer, &out_dir, true).unwrap();
        assert_eq!(resumed.state.trace.len(), 10);
        assert_eq!(resumed.state.trace[..8], first.state.trace[..]);
    }

    #[test]
    fn restart_survives_blocks_with_untried_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sd(dir.path());
        let out_dir = dir.path().join("chain");
        let interval = IntervalConfig { skip: 1, ..IntervalConfig::default() };
        let cfg = MetropolisConfig {
            blocks: 4,
            passes: 1,
            burn_in: 0,
            checkpoint_every: 1,
            ..MetropolisConfig::default()
        };

        run_metropolis_chain(&path, ModelKind::SfTime, &interval, &cfg, &out_dir, false).unwrap();
        let accept = fs::read_to_string(out_dir.join(ACCEPTANCE_FILE)).unwrap();
        assert!(accept.contains("nan"));

        let longer = MetropolisConfig { blocks: 6, ..cfg };
        let resumed = run_metropolis_chain(&path, ModelKind::SfTime, &interval, &longer, &out_dir, true).unwrap();
        assert_eq!(resumed.state.trace.len(), 6);
    }

    #[test]
    fn equilibration_defaults_to_last_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.en");
        let body: String = (0..10).map(|i| format!("{i} 0 5\n")).collect();
        fs::write(&path, body).unwrap();
        let trace = run_equilibration(&path, None, 4, 2).unwrap();
        assert_eq!(trace.average, vec![5.0; 7]);
        assert!(trace.rmsd.iter().all(|&r| r == 0.0));
    }

    #[test]
    fn combine_uses_default_output_name() {
        let dir = tempfile::tempdir().unwrap();
        for n in 1..=2 {
            let run = dir.path().join(format!("run_{n}"));
            fs::create_dir_all(&run).unwrap();
            fs::write(run.join("a.sq"), "0.5 1.0 2.0\n1.0 3.0 2.0\n").unwrap();
        }
        let cfg = CombineConfig {
            dir: dir.path().to_path_buf(),
            kind: ObservableKind::StructureFactor,
            method: crate::domain::CombineMethod::Blocking,
            block_size: 20,
            precision: None,
            output: None,
        };
        let (series, path) = run_combine(&cfg).unwrap();
        assert_eq!(series.columns[0], vec![1.0, 3.0]);
        assert_eq!(path, dir.path().join(ObservableKind::StructureFactor.combined_file_name()));
        assert!(path.exists());
    }
}
