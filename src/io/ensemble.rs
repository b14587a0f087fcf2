//! Ensemble layout: discovery of per-run files and their combination.
//!
//! An ensemble directory holds one `run_<N>` directory per run, each containing one file
//! per observable (`*.sd`, `*.en`, `*.sq`, `*.vis`) and a `*.sy` run summary. Files are
//! found recursively and ordered by run index, then path, so combination is deterministic.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::domain::{CombineConfig, CombineMethod, CombinedSeries, ObservableKind};
use crate::error::AppError;
use crate::io::{read_table, Table};
use crate::stats::{blocked_combine, energy_combine, propagated_combine, weighted_combine};

/// Threshold on the z coordinate (`.vis` column 2) above which a particle has evaporated.
pub const DEFAULT_EVAPORATION_THRESHOLD: f64 = 10.0;

/// Run index from the nearest `run_<N>` path component.
pub fn run_index(path: &Path) -> Option<usize> {
    path.components().rev().find_map(|c| {
        c.as_os_str()
            .to_str()
            .and_then(|s| s.strip_prefix("run_"))
            .and_then(|n| n.parse().ok())
    })
}

/// All files under `dir` whose extension is `ext` (with or without the dot).
///
/// Sorted by run index (files outside a `run_<N>` directory last), then path. No
/// matching file is an input error.
pub fn discover_run_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, AppError> {
    if !dir.is_dir() {
        return Err(AppError::input(format!(
            "Ensemble directory '{}' does not exist.",
            dir.display()
        )));
    }
    let ext = ext.trim_start_matches('.');

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            AppError::input(format!("Failed to walk '{}': {e}", dir.display()))
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|e| e == ext) {
            files.push(path.to_path_buf());
        }
    }

    if files.is_empty() {
        return Err(AppError::input(format!(
            "No '*.{ext}' files found under '{}'.",
            dir.display()
        )));
    }

    files.sort_by(|a, b| {
        let ka = run_index(a).unwrap_or(usize::MAX);
        let kb = run_index(b).unwrap_or(usize::MAX);
        ka.cmp(&kb).then_with(|| a.cmp(b))
    });
    debug!("Found {} '*.{ext}' files under {}", files.len(), dir.display());
    Ok(files)
}

/// Configured number of simulation blocks, from the `PASS` line of `run_1/*.sy`.
///
/// The block count is the last whitespace-separated field of the first line that
/// contains `PASS`.
pub fn read_block_count(dir: &Path) -> Result<usize, AppError> {
    let run_dir = dir.join("run_1");
    let entries = fs::read_dir(&run_dir).map_err(|e| {
        AppError::input(format!(
            "Failed to read run metadata directory '{}': {e}",
            run_dir.display()
        ))
    })?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|e| e == "sy"))
        .collect();
    candidates.sort();

    let Some(path) = candidates.first() else {
        return Err(AppError::input(format!(
            "No '*.sy' metadata file in '{}'.",
            run_dir.display()
        )));
    };
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::input(format!("Failed to read '{}': {e}", path.display())))?;

    let line = text.lines().find(|l| l.contains("PASS")).ok_or_else(|| {
        AppError::input(format!("No line containing 'PASS' in '{}'.", path.display()))
    })?;
    let field = line.split_whitespace().last().unwrap_or_default();
    field.parse::<usize>().map_err(|_| {
        AppError::input(format!(
            "'{}': cannot read a block count from '{}'.",
            path.display(),
            line.trim()
        ))
    })
}

/// Load every run file, dropping empty ones with a warning.
fn load_runs(files: &[PathBuf], min_cols: usize) -> Result<Vec<Table>, AppError> {
    let mut tables = Vec::with_capacity(files.len());
    for path in files {
        debug!("Processing {}", path.display());
        let table = read_table(path)?;
        if table.is_empty() {
            warn!("Skipping empty run file {}", path.display());
            continue;
        }
        table.require_columns(min_cols)?;
        tables.push(table);
    }
    if tables.is_empty() {
        return Err(AppError::input("Every matching run file is empty."));
    }
    Ok(tables)
}

/// Check that every table shares the first table's x column.
fn common_x(tables: &[Table]) -> Result<Vec<f64>, AppError> {
    let reference = tables[0].column(0)?;
    for table in &tables[1..] {
        let x = table.column(0)?;
        if x.len() != reference.len() {
            return Err(AppError::input(format!(
                "Shape mismatch: '{}' has {} rows, expected {} (as in '{}').",
                table.path.display(),
                x.len(),
                reference.len(),
                tables[0].path.display()
            )));
        }
        if let Some(i) = x
            .iter()
            .zip(reference.iter())
            .position(|(a, b)| (a - b).abs() > 1e-12 * b.abs().max(1.0))
        {
            return Err(AppError::input(format!(
                "Shape mismatch: '{}' row {} has x = {}, expected {}.",
                table.path.display(),
                i + 1,
                x[i],
                reference[i]
            )));
        }
    }
    Ok(reference)
}

fn columns(tables: &[Table], idx: usize) -> Result<Vec<Vec<f64>>, AppError> {
    tables.iter().map(|t| t.column(idx)).collect()
}

/// Combine one observable across the ensemble described by `cfg`.
pub fn combine_ensemble(cfg: &CombineConfig) -> Result<CombinedSeries, AppError> {
    let files = discover_run_files(&cfg.dir, cfg.kind.extension())?;
    info!(
        "Combining {} '{}' files in {}",
        files.len(),
        cfg.kind.extension(),
        cfg.dir.display()
    );

    match cfg.kind {
        ObservableKind::Superfluid => {
            let tables = load_runs(&files, 3)?;
            let x = common_x(&tables)?;
            let values = columns(&tables, 1)?;
            let combined = match cfg.method {
                CombineMethod::Blocking => blocked_combine(&values, cfg.block_size)?,
                CombineMethod::Propagated => propagated_combine(&values, &columns(&tables, 2)?)?,
            };
            Ok(CombinedSeries {
                kind: cfg.kind,
                x,
                columns: vec![combined.value, combined.error],
            })
        }
        ObservableKind::StructureFactor => {
            let mut tables = load_runs(&files, 3)?;
            for t in &mut tables {
                t.sort_by_column(0);
            }
            let x = common_x(&tables)?;
            let value = weighted_combine(&columns(&tables, 1)?, &columns(&tables, 2)?)?;
            Ok(CombinedSeries {
                kind: cfg.kind,
                x,
                columns: vec![value],
            })
        }
        ObservableKind::Energy => {
            let expected = read_block_count(&cfg.dir)?;
            let tables = load_runs(&files, 4)?;
            if let Some(t) = tables.iter().find(|t| t.n_rows() > expected) {
                return Err(AppError::input(format!(
                    "'{}' has {} blocks but the run metadata declares {expected}.",
                    t.path.display(),
                    t.n_rows()
                )));
            }
            let kinetic = energy_combine(&columns(&tables, 1)?, expected)?;
            let potential = energy_combine(&columns(&tables, 2)?, expected)?;
            let total = energy_combine(&columns(&tables, 3)?, expected)?;
            let n = kinetic.len().min(potential.len()).min(total.len());
            Ok(CombinedSeries {
                kind: cfg.kind,
                x: (1..=n).map(|b| b as f64).collect(),
                columns: vec![
                    kinetic[..n].to_vec(),
                    potential[..n].to_vec(),
                    total[..n].to_vec(),
                ],
            })
        }
    }
}

/// `.vis` files under `dir` with any column-2 value above `threshold`.
pub fn detect_evaporation(dir: &Path, threshold: f64) -> Result<Vec<PathBuf>, AppError> {
    let mut flagged = Vec::new();
    for path in discover_run_files(dir, "vis")? {
        debug!("Processing {}", path.display());
        let table = read_table(&path)?;
        table.require_columns(3)?;
        if table.column(2)?.iter().any(|&z| z > threshold) {
            info!("Evaporation detected in {}", path.display());
            flagged.push(path);
        }
    }
    Ok(flagged)
}
