//! Reporting utilities: residuals and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{FitReport, Series};
use crate::error::AppError;

/// Fitted value and normalized residual for one point.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResidual {
    pub x: f64,
    pub y: f64,
    pub y_fit: f64,
    /// `(y - y_fit) / err`.
    pub pull: f64,
}

/// Compute fitted values and pulls for each point of the fitted slice.
pub fn compute_residuals(data: &Series, report: &FitReport) -> Result<Vec<FitResidual>, AppError> {
    let params = report.values();
    let mut out = Vec::with_capacity(data.len());
    for i in 0..data.len() {
        let y_fit = report.model.predict(data.x[i], &params);
        if !y_fit.is_finite() {
            return Err(AppError::numeric(format!(
                "Non-finite model prediction at x = {} during residual computation.",
                data.x[i]
            )));
        }
        out.push(FitResidual {
            x: data.x[i],
            y: data.y[i],
            y_fit,
            pull: (data.y[i] - y_fit) / data.err[i],
        });
    }
    Ok(out)
}

/// χ² per degree of freedom; `None` when there are no degrees of freedom left.
pub fn reduced_chi2(report: &FitReport) -> Option<f64> {
    let dof = report.n_points.checked_sub(report.params.len())?;
    (dof > 0).then(|| report.chi2 / dof as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitMethod, ModelKind, ParamEstimate};

    fn report(values: [f64; 2]) -> FitReport {
        FitReport {
            model: ModelKind::EnTimeStep,
            equation: String::new(),
            method: FitMethod::Covariance,
            params: ["E_0", "A"]
                .iter()
                .zip(values)
                .map(|(n, v)| ParamEstimate { name: n.to_string(), value: v, error: 0.0 })
                .collect(),
            n_points: 3,
            chi2: 4.0,
        }
    }

    #[test]
    fn pulls_are_error_normalized() {
        let data = Series::new(vec![0.0, 1.0], vec![1.0, 4.0], vec![0.5, 1.0]).unwrap();
        let res = compute_residuals(&data, &report([1.0, 2.0])).unwrap();
        assert_eq!(res[0].pull, 0.0);
        assert_eq!(res[1].y_fit, 3.0);
        assert_eq!(res[1].pull, 1.0);
    }

    #[test]
    fn reduced_chi2_needs_degrees_of_freedom() {
        let mut r = report([0.0, 0.0]);
        assert_eq!(reduced_chi2(&r), Some(4.0));
        r.n_points = 2;
        assert_eq!(reduced_chi2(&r), None);
    }
}
