//! Equilibration diagnostics based on moving windows.
//!
//! A trace has equilibrated roughly where its moving average flattens and its moving RMSD
//! (the sample standard deviation inside each window) stops trending. Applying the RMSD
//! twice gives a second-order signal that is easier to threshold by eye.

use crate::error::AppError;
use crate::stats::{mean, sample_variance};

fn check_window(window: usize, len: usize) -> Result<(), AppError> {
    if window < 2 {
        return Err(AppError::input(format!("Window must be at least 2, got {window}.")));
    }
    if window > len {
        return Err(AppError::insufficient(format!(
            "Window of {window} samples exceeds the trace length {len}."
        )));
    }
    Ok(())
}

/// Mean of each full window (`len - window + 1` values).
pub fn moving_average(window: usize, x: &[f64]) -> Result<Vec<f64>, AppError> {
    check_window(window, x.len())?;
    Ok(x.windows(window).map(mean).collect())
}

/// Sample standard deviation of each full window (`len - window + 1` values).
pub fn moving_rmsd(window: usize, x: &[f64]) -> Result<Vec<f64>, AppError> {
    check_window(window, x.len())?;
    Ok(x.windows(window).map(|w| sample_variance(w).sqrt()).collect())
}

/// Moving diagnostics of one trace.
#[derive(Debug, Clone)]
pub struct EquilibrationTrace {
    pub average: Vec<f64>,
    pub rmsd: Vec<f64>,
    /// RMSD of the RMSD series with `second_window`.
    pub second_rmsd: Vec<f64>,
}

pub fn equilibration_trace(x: &[f64], window: usize, second_window: usize) -> Result<EquilibrationTrace, AppError> {
    let average = moving_average(window, x)?;
    let rmsd = moving_rmsd(window, x)?;
    let second_rmsd = moving_rmsd(second_window, &rmsd)?;
    Ok(EquilibrationTrace {
        average,
        rmsd,
        second_rmsd,
    })
}
