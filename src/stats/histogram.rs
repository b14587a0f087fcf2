//! Equal-width density histograms for bootstrap parameter distributions.

use serde::Serialize;

/// Bin count used for exported parameter distributions.
pub const DEFAULT_HISTOGRAM_BINS: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct Histogram {
    pub centers: Vec<f64>,
    /// Normalized so that `Σ density * width == 1`.
    pub density: Vec<f64>,
    pub width: f64,
}

/// Density histogram over `[min, max]` of the finite samples.
///
/// Returns `None` when there are no finite samples. A degenerate range (all samples
/// equal) gets a unit-width bin around the value.
pub fn density_histogram(samples: &[f64], bins: usize) -> Option<Histogram> {
    let bins = bins.max(1);
    let finite: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    let mut lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if hi <= lo {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0usize; bins];
    for v in &finite {
        // The maximum belongs to the last bin.
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    let total = finite.len() as f64;
    Some(Histogram {
        centers: (0..bins).map(|i| lo + (i as f64 + 0.5) * width).collect(),
        density: counts.iter().map(|&c| c as f64 / (total * width)).collect(),
        width,
    })
}
