//! Fit-domain selection.
//!
//! Picks the inclusive index range `start..=end` of a series to fit, and the stride used
//! to down-sample it. Policies, highest precedence first:
//!
//! 1. explicit domain `[a, b]`: nearest-value indices of `a` and `b`
//! 2. percentage trim `p`: remove `p/2` of the `[min(x), max(x)]` span from each end
//! 3. trim before the global maximum of y and/or after the global minimum of y
//! 4. the full range
//!
//! Nearest-value lookups resolve ties to the first index, so domain endpoints need not be
//! sample points.

use log::debug;

use crate::domain::{Interval, IntervalConfig};
use crate::error::AppError;

/// Index of the value closest to `target` (first on ties).
pub fn nearest_index(x: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in x.iter().enumerate() {
        let d = (v - target).abs();
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

fn argmax(y: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in y.iter().enumerate() {
        if v > y[best] {
            best = i;
        }
    }
    best
}

fn argmin(y: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in y.iter().enumerate() {
        if v < y[best] {
            best = i;
        }
    }
    best
}

/// Choose the fit range according to `cfg`.
pub fn select_interval(x: &[f64], y: &[f64], cfg: &IntervalConfig) -> Result<Interval, AppError> {
    if x.len() != y.len() {
        return Err(AppError::input(format!(
            "x and y differ in length ({} vs {}).",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Err(AppError::insufficient("Cannot select a fit interval on an empty series."));
    }

    if let Some(p) = cfg.p_interval {
        if !(0.0..=1.0).contains(&p) {
            return Err(AppError::input(format!(
                "Percentage trim must lie in [0, 1], got {p}."
            )));
        }
    }

    let last = x.len() - 1;
    let interval = if let Some((a, b)) = cfg.domain {
        if !a.is_finite() || !b.is_finite() || a > b {
            return Err(AppError::input(format!("Invalid fit domain [{a}, {b}].")));
        }
        Interval {
            start: nearest_index(x, a).unwrap_or(0),
            end: nearest_index(x, b).unwrap_or(last),
        }
    } else if let Some(p) = cfg.p_interval.filter(|&p| p != 0.0) {
        let x_min = x.iter().copied().fold(f64::INFINITY, f64::min);
        let x_max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let half = p * (x_max - x_min) / 2.0;
        Interval {
            start: nearest_index(x, x_min + half).unwrap_or(0),
            end: nearest_index(x, x_max - half).unwrap_or(last),
        }
    } else {
        Interval {
            start: if cfg.trim_before_max { argmax(y) } else { 0 },
            end: if cfg.trim_after_min { argmin(y) } else { last },
        }
    };

    if interval.is_empty() {
        return Err(AppError::input(format!(
            "Fit interval is empty: start index {} lies after end index {} (x = {} .. {}).",
            interval.start, interval.end, x[interval.start], x[interval.end]
        )));
    }

    debug!(
        "Fit interval: indices {}..={} (x = {} .. {})",
        interval.start, interval.end, x[interval.start], x[interval.end]
    );
    Ok(interval)
}

/// Down-sampling stride for `interval`.
///
/// When `max_points` is set and the interval holds more points, the stride is
/// `ceil(len / max_points)`; otherwise the configured `skip` is used as given.
pub fn select_stride(interval: Interval, cfg: &IntervalConfig) -> Result<usize, AppError> {
    let len = interval.len();
    if let Some(max_points) = cfg.max_points {
        if max_points == 0 {
            return Err(AppError::input("Maximum number of fit points must be at least 1."));
        }
        if len > max_points {
            return Ok(len.div_ceil(max_points));
        }
    }
    if cfg.skip == 0 {
        return Err(AppError::input("Skip must be at least 1."));
    }
    Ok(cfg.skip)
}
