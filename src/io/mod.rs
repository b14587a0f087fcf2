//! Input/output helpers.
//!
//! - whitespace-delimited table reader (`table`)
//! - ensemble discovery and combination (`ensemble`)
//! - combined-series, fit and trace exports (`export`)
//! - Metropolis checkpoint JSON (`checkpoint`)

pub mod checkpoint;
pub mod ensemble;
pub mod export;
pub mod table;

pub use checkpoint::*;
pub use ensemble::*;
pub use export::*;
pub use table::*;
