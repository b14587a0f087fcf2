//! Metropolis checkpoint JSON.
//!
//! The checkpoint is the only state that survives between invocations. It wraps the chain
//! state with a timestamp so a stale file is easy to spot.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::fit::MetropolisState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub saved_at: DateTime<Utc>,
    pub seed: u64,
    pub state: MetropolisState,
}

pub fn write_checkpoint(path: &Path, seed: u64, state: &MetropolisState) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::input(format!("Failed to create checkpoint '{}': {e}", path.display()))
    })?;
    let checkpoint = Checkpoint {
        saved_at: Utc::now(),
        seed,
        state: state.clone(),
    };
    serde_json::to_writer_pretty(file, &checkpoint)
        .map_err(|e| AppError::input(format!("Failed to write checkpoint: {e}")))?;
    Ok(())
}

pub fn read_checkpoint(path: &Path) -> Result<Checkpoint, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::input(format!("Failed to open checkpoint '{}': {e}", path.display()))
    })?;
    serde_json::from_reader(file).map_err(|e| {
        AppError::input(format!("Invalid checkpoint '{}': {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;

    #[test]
    fn checkpoint_round_trips_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metropolis.json");
        let mut state = MetropolisState::new(ModelKind::SfTime, vec![0.1, 1.0 / 3.0, 0.2]).unwrap();
        state.trace.push(vec![0.1, 0.3333333333333333, 0.2]);
        state.acceptance.push(vec![Some(0.5), None, Some(1.0)]);
        state.next_block = 1;

        write_checkpoint(&path, 927, &state).unwrap();
        let back = read_checkpoint(&path).unwrap();
        assert_eq!(back.state, state);
        assert_eq!(back.state.acceptance[0][1], None);
        assert_eq!(back.seed, 927);
    }
}
