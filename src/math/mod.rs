//! Mathematical utilities: stable model terms, least squares and the bounded
//! Levenberg–Marquardt solver.

pub mod basis;
pub mod lm;
pub mod ols;

pub use basis::*;
pub use lm::*;
pub use ols::*;
