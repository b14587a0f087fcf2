//! `pigs-stats` library crate.
//!
//! Post-processing for path-integral ground state Monte Carlo output. The binary (`pigs`)
//! is a thin wrapper around this library so that:
//!
//! - the statistics and fitting code is testable without spawning processes
//! - the same workflows can be driven from scripts or notebooks bindings later

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod stats;
