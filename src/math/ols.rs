//! Linear least squares and covariance helpers.
//!
//! Every Levenberg–Marquardt step solves a small damped linear problem of the form:
//!
//! ```text
//! minimize ||J δ + r||^2 + λ ||D δ||^2
//! ```
//!
//! which we express as one stacked least-squares system and hand to SVD.
//!
//! Implementation choices:
//! - SVD handles tall systems (more rows than columns) robustly.
//!   (Nalgebra's `QR::solve` is intended for square systems.)
//! - Parameter dimensions are tiny (2–3 columns), so SVD cost is negligible even inside
//!   bootstrap loops.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-14, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Parameter covariance `(JᵀJ)⁻¹` from a (weighted) Jacobian.
///
/// Singular values below `eps * max(n, p) * s_max` are discarded, so a rank-deficient
/// Jacobian yields a pseudo-inverse rather than a failure. Returns `None` when the
/// decomposition is unavailable or non-finite.
pub fn covariance_from_jacobian(jacobian: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let p = jacobian.ncols();
    let svd = jacobian.clone().svd(false, true);
    let v_t = svd.v_t.as_ref()?;
    let s = &svd.singular_values;

    let s_max = s.iter().copied().fold(0.0_f64, f64::max);
    if !s_max.is_finite() {
        return None;
    }
    let threshold = f64::EPSILON * jacobian.nrows().max(p) as f64 * s_max;

    let mut cov = DMatrix::<f64>::zeros(p, p);
    for (k, &sk) in s.iter().enumerate() {
        if sk > threshold {
            let vk = v_t.row(k);
            cov += vk.transpose() * vk / (sk * sk);
        }
    }

    if cov.iter().all(|v| v.is_finite()) {
        Some(cov)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn covariance_of_straight_line_matches_closed_form() {
        // Unit errors, design [1, x] on x = [0, 1, 2]: (XᵀX)⁻¹ = [[5/6, -1/2], [-1/2, 1/2]].
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let cov = covariance_from_jacobian(&j).unwrap();
        assert!((cov[(0, 0)] - 5.0 / 6.0).abs() < 1e-12);
        assert!((cov[(0, 1)] + 0.5).abs() < 1e-12);
        assert!((cov[(1, 1)] - 0.5).abs() < 1e-12);
    }
}
