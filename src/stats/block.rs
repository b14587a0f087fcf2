//! Block averaging of serially correlated samples.
//!
//! The sequence is reduced to consecutive, non-overlapping blocks of `block_size` samples:
//!
//! 1. drop `burn_in` leading samples
//! 2. drop further leading samples until the length divides evenly by `block_size`
//! 3. average each block
//!
//! The estimate is the mean of the block means and the standard error is
//! `sqrt(var_{n-1}(block means) / n_blocks)`.
//!
//! Trimming always removes from the head so the most recent samples are kept.

use log::debug;

use crate::domain::BlockEstimate;
use crate::error::AppError;
use crate::stats::{mean, sample_variance};

/// Block-average a single sequence.
pub fn block_average(data: &[f64], block_size: usize, burn_in: usize) -> Result<BlockEstimate, AppError> {
    if block_size == 0 {
        return Err(AppError::input("Block size must be at least 1."));
    }

    let kept = data.len().saturating_sub(burn_in);
    let n_blocks = kept / block_size;
    if n_blocks < 2 {
        return Err(AppError::insufficient(format!(
            "Need at least 2 blocks of {block_size} samples, but only {kept} samples remain after a burn-in of {burn_in} (from {}).",
            data.len()
        )));
    }

    let start = data.len() - n_blocks * block_size;
    let block_means: Vec<f64> = data[start..]
        .chunks_exact(block_size)
        .map(mean)
        .collect();

    debug!(
        "Block average: {} samples, {} trimmed from the head, {n_blocks} blocks of {block_size}",
        data.len(),
        start
    );

    Ok(BlockEstimate {
        mean: mean(&block_means),
        error: (sample_variance(&block_means) / n_blocks as f64).sqrt(),
        n_blocks,
    })
}

/// Block-average selected columns of a row-major table.
///
/// Every row must have more than the largest requested column index.
pub fn block_average_columns(
    rows: &[Vec<f64>],
    columns: &[usize],
    block_size: usize,
    burn_in: usize,
) -> Result<Vec<BlockEstimate>, AppError> {
    let n_cols = rows.iter().map(Vec::len).min().unwrap_or(0);
    columns
        .iter()
        .map(|&col| {
            if col >= n_cols {
                return Err(AppError::input(format!(
                    "Column index {col} is out of range: the data has {n_cols} columns."
                )));
            }
            let values: Vec<f64> = rows.iter().map(|row| row[col]).collect();
            block_average(&values, block_size, burn_in)
        })
        .collect()
}
