//! Text exports.
//!
//! Formats are consumed by downstream scripts, so column order, delimiters and headers are
//! fixed:
//!
//! - combined series: `# <header>` then tab-separated scientific notation
//! - `fit_params.txt`: `#    Parameter   Value   Error:` then `name  value  error`
//! - bootstrap distributions: `<name>_hist.json` (raw samples) and `<name>_hist.dat`
//!   (density histogram)
//! - Metropolis traces: `raw.param` and `accept.param`, one row per block

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::domain::{CombinedSeries, FitReport, ObservableKind};
use crate::error::AppError;
use crate::stats::{density_histogram, DEFAULT_HISTOGRAM_BINS};

/// Header line of `fit_params.txt`.
pub const FIT_PARAMS_HEADER: &str = "#    Parameter   Value   Error:";
pub const FIT_PARAMS_FILE: &str = "fit_params.txt";

/// C-style `%.{precision}e`: the exponent always has a sign and at least two digits.
pub fn fmt_sci(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return if value.is_nan() {
            "nan".to_string()
        } else if value > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }
    let s = format!("{value:.precision$e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        None => s,
    }
}

fn create(path: &Path) -> Result<BufWriter<File>, AppError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| AppError::input(format!("Failed to create '{}': {e}", path.display())))
}

fn write_err(path: &Path, e: std::io::Error) -> AppError {
    AppError::input(format!("Failed to write '{}': {e}", path.display()))
}

/// Render a combined series in its on-disk format.
pub fn format_combined(series: &CombinedSeries, precision: usize) -> String {
    let mut out = format!("# {}\n", series.kind.combined_header());
    for (i, &x) in series.x.iter().enumerate() {
        let first = match series.kind {
            ObservableKind::Energy => format!("{}", x as i64),
            _ => fmt_sci(x, precision),
        };
        let mut fields = vec![first];
        fields.extend(series.columns.iter().map(|c| fmt_sci(c[i], precision)));
        out.push_str(&fields.join("\t"));
        out.push('\n');
    }
    out
}

pub fn write_combined(path: &Path, series: &CombinedSeries, precision: usize) -> Result<(), AppError> {
    let mut file = create(path)?;
    file.write_all(format_combined(series, precision).as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| write_err(path, e))
}

/// Write `fit_params.txt` into `dir`; returns its path.
pub fn write_fit_params(dir: &Path, report: &FitReport) -> Result<PathBuf, AppError> {
    let path = dir.join(FIT_PARAMS_FILE);
    let mut file = create(&path)?;
    let mut body = format!("{FIT_PARAMS_HEADER}\n");
    for p in &report.params {
        body.push_str(&format!("{}  {}  {}\n", p.name, p.value, p.error));
    }
    file.write_all(body.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| write_err(&path, e))?;
    Ok(path)
}

/// Write `<name>_hist.json` and `<name>_hist.dat` for every parameter distribution.
pub fn write_distributions(dir: &Path, names: &[&str], samples: &[Vec<f64>]) -> Result<(), AppError> {
    for (name, dist) in names.iter().zip(samples.iter()) {
        let json_path = dir.join(format!("{name}_hist.json"));
        let file = create(&json_path)?;
        serde_json::to_writer(file, dist)
            .map_err(|e| AppError::input(format!("Failed to write '{}': {e}", json_path.display())))?;

        let Some(hist) = density_histogram(dist, DEFAULT_HISTOGRAM_BINS) else {
            continue;
        };
        let dat_path = dir.join(format!("{name}_hist.dat"));
        let mut body = String::from("# center  density\n");
        for (c, d) in hist.centers.iter().zip(hist.density.iter()) {
            body.push_str(&format!("{}\t{}\n", fmt_sci(*c, 6), fmt_sci(*d, 6)));
        }
        let mut file = create(&dat_path)?;
        file.write_all(body.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| write_err(&dat_path, e))?;
    }
    Ok(())
}

/// One row per block: block number (1-based) then one value per parameter.
pub fn write_block_rows(path: &Path, names: &[&str], rows: &[Vec<f64>]) -> Result<(), AppError> {
    let mut body = format!("# block  {}\n", names.join("  "));
    for (b, row) in rows.iter().enumerate() {
        let mut fields = vec![(b + 1).to_string()];
        fields.extend(row.iter().map(|v| fmt_sci(*v, 6)));
        body.push_str(&fields.join("\t"));
        body.push('\n');
    }
    let mut file = create(path)?;
    file.write_all(body.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| write_err(path, e))
}
