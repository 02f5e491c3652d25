use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Rotation bookkeeping for the active file
///
/// Created on the first write and kept for the writer's lifetime. Closing the
/// writer releases the file handle but keeps this state, so the logical clock
/// survives a close/reopen cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterState {
    /// Path of the active file
    pub active_path: PathBuf,
    /// Bytes in the active file
    pub current_size: u64,
    /// Logical start of the current period, taken from records
    pub last_rotation: DateTime<Utc>,
}

impl WriterState {
    pub fn new(active_path: PathBuf, current_size: u64, last_rotation: DateTime<Utc>) -> Self {
        Self {
            active_path,
            current_size,
            last_rotation,
        }
    }
}
