//! Terminal output.
//!
//! We keep formatting code in one place so:
//! - the statistics and fitting code stays clean and testable
//! - output changes are localized

use std::path::Path;

use crate::domain::{BlockConfig, BlockEstimate, FitReport};
use crate::fit::{FitOutcome, MetropolisFit};
use crate::report::{compute_residuals, reduced_chi2};
use crate::stats::EquilibrationTrace;

/// `"{mean} {error} "` per column, optionally prefixed with the file name.
pub fn format_block_line(path: &Path, estimates: &[BlockEstimate], cfg: &BlockConfig) -> String {
    let mut out = String::new();
    if cfg.include_filename {
        out.push_str(&format!("{} ", path.display()));
    }
    for est in estimates {
        out.push_str(&format!(
            "{:.mp$} {:.ep$} ",
            est.mean,
            est.error,
            mp = cfg.mean_precision,
            ep = cfg.error_precision
        ));
    }
    out
}

/// `"{file} {last_param} {last_error}"`, the one-line fit result for batch scripts.
pub fn format_brief_line(path: &Path, report: &FitReport) -> String {
    match report.params.last() {
        Some(p) => format!("{} {} {}", path.display(), p.value, p.error),
        None => path.display().to_string(),
    }
}

fn format_params(out: &mut String, report: &FitReport) {
    let width = report.params.iter().map(|p| p.name.len()).max().unwrap_or(0);
    for p in &report.params {
        out.push_str(&format!(
            "  {:<width$}  {:>14.6e}  +/- {:.3e}\n",
            p.name, p.value, p.error
        ));
    }
}

/// Multi-line summary of a fit invocation.
pub fn format_fit_summary(path: &Path, outcome: &FitOutcome) -> String {
    let mut out = String::new();
    let cov = &outcome.covariance;

    out.push_str(&format!("=== pigs fit: {} ===\n", path.display()));
    out.push_str(&format!("Model: {} ({})\n", cov.model.id(), cov.equation));
    out.push_str(&format!(
        "Points: {} (x in [{:.4}, {:.4}], every {})\n",
        outcome.data.len(),
        outcome.data.x.first().copied().unwrap_or(f64::NAN),
        outcome.data.x.last().copied().unwrap_or(f64::NAN),
        outcome.stride
    ));

    out.push_str("\nCovariance method:\n");
    format_params(&mut out, cov);
    if let Some(r) = reduced_chi2(cov) {
        out.push_str(&format!("  chi2/dof = {r:.4}\n"));
    }

    if let Some(boot) = &outcome.bootstrap {
        out.push_str(&format!(
            "\nBootstrap method ({} refits):\n",
            boot.batches.iter().sum::<usize>()
        ));
        format_params(&mut out, &boot.report);
    }

    if let Ok(residuals) = compute_residuals(&outcome.data, outcome.report()) {
        if let Some(worst) = residuals
            .iter()
            .max_by(|a, b| a.pull.abs().total_cmp(&b.pull.abs()))
        {
            out.push_str(&format!(
                "\nLargest pull: {:.3} at x = {:.4} (y = {:.6e}, fit = {:.6e})\n",
                worst.pull, worst.x, worst.y, worst.y_fit
            ));
        }
    }

    out
}

pub fn format_metropolis_summary(fit: &MetropolisFit, burn_in: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "=== pigs metropolis: {} ({}) ===\n",
        fit.report.model.id(),
        fit.report.equation
    ));
    out.push_str(&format!(
        "Blocks: {} ({} discarded as burn-in)\n",
        fit.state.trace.len(),
        burn_in
    ));
    format_params(&mut out, &fit.report);
    if let Some(last) = fit.state.acceptance.last() {
        let rates: Vec<String> = last
            .iter()
            .map(|r| r.map_or_else(|| "-".to_string(), |r| format!("{r:.2}")))
            .collect();
        out.push_str(&format!("Last acceptance: [{}]\n", rates.join(", ")));
    }
    out
}

/// One row per full window: start index, moving average, RMSD and second-order RMSD.
pub fn format_equilibration(trace: &EquilibrationTrace) -> String {
    let mut out = String::from("# start  average  rmsd  rmsd2\n");
    for (i, (avg, rmsd)) in trace.average.iter().zip(trace.rmsd.iter()).enumerate() {
        let second = trace
            .second_rmsd
            .get(i)
            .map(|v| format!("{v:.6e}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!("{i}\t{avg:.6e}\t{rmsd:.6e}\t{second}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitMethod, ModelKind, ParamEstimate};

    #[test]
    fn block_line_default_precisions() {
        let est = [BlockEstimate { mean: 1.23456, error: 0.012345678, n_blocks: 10 }];
        let cfg = BlockConfig::default();
        assert_eq!(format_block_line(Path::new("a.en"), &est, &cfg), "1.2346 0.01235 ");

        let cfg = BlockConfig {
            include_filename: true,
            mean_precision: 2,
            ..BlockConfig::default()
        };
        assert_eq!(format_block_line(Path::new("a.en"), &est, &cfg), "a.en 1.23 0.01235 ");
    }

    #[test]
    fn brief_line_reports_last_parameter() {
        let report = FitReport {
            model: ModelKind::SfTime,
            equation: String::new(),
            method: FitMethod::Covariance,
            params: vec![
                ParamEstimate { name: "A".into(), value: 1.0, error: 0.1 },
                ParamEstimate { name: "C".into(), value: 0.25, error: 0.5 },
            ],
            n_points: 5,
            chi2: 0.0,
        };
        assert_eq!(format_brief_line(Path::new("sf_fractions_combined"), &report), "sf_fractions_combined 0.25 0.5");
    }
}
