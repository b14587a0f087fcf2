//! Curve fitting.
//!
//! Responsibilities:
//!
//! - choose the fit interval and stride (`interval`)
//! - bounded weighted least squares with covariance errors (`fitter`)
//! - parallel parametric bootstrap (`bootstrap`)
//! - Metropolis sampling in parameter space (`metropolis`)

pub mod bootstrap;
pub mod fitter;
pub mod interval;
pub mod metropolis;

pub use bootstrap::*;
pub use fitter::*;
pub use interval::*;
pub use metropolis::*;
