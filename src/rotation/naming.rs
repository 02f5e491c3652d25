//! Rotated file naming
//!
//! For an active file `<dir>/<stem>.<ext>`, rotated files are named
//! `<dir>/<stem>.<YYYY-MM-DD_HH-MM-SS>[_<n>].<ext>`, plus `.gz` once compressed.
//! The timestamp is the start of the period the rotated file covers.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};

use super::compress::compressed_path;

/// Timestamp format embedded in rotated file names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Length of a formatted [`TIMESTAMP_FORMAT`] timestamp
const TIMESTAMP_LEN: usize = 19;

/// Naming scheme derived from the active file path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNaming {
    active: PathBuf,
    dir: PathBuf,
    /// File name of the active file
    active_name: String,
    /// `<stem>.`
    prefix: String,
    /// `.<ext>`, or empty when the active file has no extension
    extension: String,
}

impl FileNaming {
    pub fn new(active: impl Into<PathBuf>) -> Self {
        let active = active.into();
        let dir = match active.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let active_name = active
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = active
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = active
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        Self {
            active,
            dir,
            active_name,
            prefix: format!("{}.", stem),
            extension,
        }
    }

    /// Path of the active file
    pub fn active_path(&self) -> &Path {
        &self.active
    }

    /// Directory holding the active and rotated files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rotated file path for the period starting at `period_start`
    ///
    /// Never returns a path that already exists, compressed or not: a `_1`, `_2`, ...
    /// suffix is appended until the name is free.
    pub fn rotated_path(&self, period_start: DateTime<Utc>) -> PathBuf {
        let stamp = period_start.format(TIMESTAMP_FORMAT).to_string();
        let mut suffix = 0;
        loop {
            let candidate = self.candidate(&stamp, suffix);
            if !candidate.exists() && !compressed_path(&candidate).exists() {
                return candidate;
            }
            suffix += 1;
        }
    }

    fn candidate(&self, stamp: &str, suffix: u32) -> PathBuf {
        let name = if suffix == 0 {
            format!("{}{}{}", self.prefix, stamp, self.extension)
        } else {
            format!("{}{}_{}{}", self.prefix, stamp, suffix, self.extension)
        };
        self.dir.join(name)
    }

    /// Whether `name` is a rotated file belonging to this active file
    ///
    /// Compressed or not, the name must carry a timestamp right after `<stem>.`,
    /// so unrelated `<stem>.*.gz` archives are never touched by retention.
    pub fn is_rotated_name(&self, name: &str) -> bool {
        if name == self.active_name {
            return false;
        }
        let Some(rest) = name.strip_prefix(&self.prefix) else {
            return false;
        };
        has_timestamp_prefix(rest)
    }

    /// Ordering key `(timestamp, suffix)` parsed from a rotated file name
    ///
    /// Used to break ties between files with equal modification times.
    pub fn order_key(&self, name: &str) -> Option<(String, u32)> {
        let rest = name.strip_prefix(&self.prefix)?;
        if !has_timestamp_prefix(rest) {
            return None;
        }
        let (stamp, tail) = rest.split_at(TIMESTAMP_LEN);
        let suffix = tail
            .strip_prefix('_')
            .map(|t| {
                t.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
            })
            .and_then(|digits| digits.parse().ok())
            .unwrap_or(0);
        Some((stamp.to_string(), suffix))
    }
}

fn has_timestamp_prefix(s: &str) -> bool {
    s.get(..TIMESTAMP_LEN)
        .is_some_and(|stamp| NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_ok())
}
