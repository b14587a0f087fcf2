//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observable, method and model enums (`ObservableKind`, `CombineMethod`, `FitMethod`, `ModelKind`)
//! - data containers (`Series`, `CombinedSeries`, `Interval`)
//! - configuration structs for each stage
//! - estimates and fit outputs (`BlockEstimate`, `FitReport`)

pub mod types;

pub use types::*;
