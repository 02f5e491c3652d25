//! Active file management and the rotation sequence
//!
//! [`RotatingFile`] owns the single OS handle of the active file. Both write
//! strategies funnel every record through [`RotatingFile::append`], which opens the
//! file lazily, rotates when a trigger fires and appends the record's bytes.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::state::WriterState;
use crate::error::{ErrorContext, ErrorHandler, Operation, Result, WriterError};
use crate::record::{Formatter, LogRecord};
use crate::rotation::{
    apply_retention, discover_rotated_files, gzip_file, should_rotate, FileNaming,
    RotatedFile, RotationPolicy,
};

/// A record together with its formatted bytes, separator included
#[derive(Debug, Clone)]
pub struct PendingRecord {
    pub record: LogRecord,
    pub text: String,
}

impl PendingRecord {
    /// Format `record` for appending
    pub fn new(record: LogRecord, formatter: &dyn Formatter) -> Self {
        let mut text = formatter.format(&record);
        text.push_str(formatter.separator());
        Self { record, text }
    }
}

/// The active log file plus everything needed to rotate it
pub struct RotatingFile {
    naming: FileNaming,
    policy: RotationPolicy,
    /// None until the first successful open
    state: Option<WriterState>,
    /// None while Unopened
    file: Option<File>,
    errors: ErrorHandler,
}

impl RotatingFile {
    /// Create a writer for `path`. Nothing touches the disk until the first append.
    pub fn new(path: impl Into<PathBuf>, policy: RotationPolicy, errors: ErrorHandler) -> Self {
        Self {
            naming: FileNaming::new(path),
            policy,
            state: None,
            file: None,
            errors,
        }
    }

    /// Path of the active file
    pub fn active_path(&self) -> &Path {
        self.naming.active_path()
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Rotation state, once something has been written
    pub fn state(&self) -> Option<&WriterState> {
        self.state.as_ref()
    }

    /// Whether the active file handle is currently open
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Rotated files currently on disk, newest first
    pub fn rotated_files(&self) -> io::Result<Vec<RotatedFile>> {
        discover_rotated_files(&self.naming)
    }

    /// Append one record, rotating first if a trigger fires
    ///
    /// Failures are reported to the error handler with the record; the record is
    /// not retried. The next append reopens the file if needed.
    pub fn append(&mut self, entry: &PendingRecord) {
        if let Err(error) = self.try_append(entry) {
            let operation = match error {
                WriterError::Open { .. } => Operation::Open,
                _ => Operation::Write,
            };
            self.report(operation, &error, Some(&entry.record));
        }
    }

    /// Flush the active file to the OS and disk
    pub fn flush(&mut self) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        if let Err(source) = sync(file) {
            self.file = None;
            self.report(Operation::Flush, &WriterError::Io(source), None);
        }
    }

    /// Flush and release the file handle
    ///
    /// The rotation state is kept; the next append reopens the file.
    pub fn close(&mut self) {
        if self.file.is_some() {
            debug!(path = %self.active_path().display(), "closing log file");
        }
        self.release_handle();
    }

    /// Rotate now, regardless of triggers
    ///
    /// A writer that never wrote anything has nothing to rotate; this is then a
    /// no-op and creates no file.
    pub fn force_rotate(&mut self) {
        if self.state.is_none() {
            debug!("nothing written yet, skipping forced rotation");
            return;
        }
        if let Err(error) = self.rotate(Utc::now()) {
            self.report(Operation::Rotate, &error, None);
        }
    }

    fn try_append(&mut self, entry: &PendingRecord) -> Result<()> {
        let timestamp = entry.record.timestamp;
        self.ensure_open(timestamp)?;

        let rotate = self
            .state
            .as_ref()
            .is_some_and(|state| {
                should_rotate(state, &self.policy, timestamp, entry.text.len() as u64)
            });
        if rotate {
            // A failed rotation keeps appending to the current file
            if let Err(error) = self.rotate(timestamp) {
                warn!(path = %self.active_path().display(), "rotation failed, appending to current file");
                self.report(Operation::Rotate, &error, Some(&entry.record));
            }
            self.ensure_open(timestamp)?;
        }

        let written = match self.file.as_mut() {
            Some(file) => file.write_all(entry.text.as_bytes()),
            None => return Err(WriterError::Closed),
        };
        if let Err(source) = written {
            // Reopen next time; the size is re-read from disk then
            self.file = None;
            return Err(WriterError::Write {
                path: self.active_path().to_path_buf(),
                source,
            });
        }

        if let Some(state) = self.state.as_mut() {
            state.current_size += entry.text.len() as u64;
        }
        Ok(())
    }

    fn ensure_open(&mut self, timestamp: DateTime<Utc>) -> Result<()> {
        if self.file.is_some() {
            return Ok(());
        }

        let path = self.active_path().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| WriterError::Open {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let open_error = |source| WriterError::Open {
            path: path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_error)?;
        let metadata = file.metadata().map_err(open_error)?;
        let size = metadata.len();

        match self.state.as_mut() {
            Some(state) => state.current_size = size,
            None => {
                // A non-empty file left by an earlier run belongs to the period it was last written in
                let last_rotation = match metadata.modified() {
                    Ok(modified) if size > 0 => DateTime::<Utc>::from(modified),
                    _ => timestamp,
                };
                self.state = Some(WriterState::new(path.clone(), size, last_rotation));
            }
        }

        debug!(path = %path.display(), size, "opened log file");
        self.file = Some(file);
        Ok(())
    }

    /// Close, rename, compress, apply retention and reset the period
    ///
    /// A missing or empty active file is left in place rather than renamed, so no
    /// empty rotated file is ever produced. The file is reopened lazily by the
    /// next append.
    fn rotate(&mut self, next_period: DateTime<Utc>) -> Result<()> {
        self.release_handle();

        let Some(period) = self.state.as_ref().map(|state| state.last_rotation) else {
            return Ok(());
        };

        let active = self.active_path().to_path_buf();
        let has_content = fs::metadata(&active)
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if has_content {
            let rotated = self.naming.rotated_path(period);
            fs::rename(&active, &rotated).map_err(|source| WriterError::Rename {
                from: active.clone(),
                to: rotated.clone(),
                source,
            })?;
            info!(from = %active.display(), to = %rotated.display(), "rotated log file");

            if self.policy.compress {
                self.compress(&rotated);
            }
        }

        self.enforce_retention();

        if let Some(state) = self.state.as_mut() {
            state.current_size = 0;
            state.last_rotation = next_period;
        }
        Ok(())
    }

    fn compress(&self, rotated: &Path) {
        match gzip_file(rotated) {
            Ok(compressed) => debug!(path = %compressed.display(), "compressed rotated file"),
            Err(source) => self.report(
                Operation::Compress,
                &WriterError::Compress {
                    path: rotated.to_path_buf(),
                    source,
                },
                None,
            ),
        }
    }

    fn enforce_retention(&self) {
        let result = apply_retention(
            &self.naming,
            &self.policy,
            SystemTime::now(),
            |path, error| {
                (self.errors)(&error, &ErrorContext::new(Operation::Retention, path), None);
            },
        );
        if let Err(source) = result {
            self.report(Operation::Retention, &WriterError::Io(source), None);
        }
    }

    fn release_handle(&mut self) {
        let Some(mut file) = self.file.take() else {
            return;
        };
        if let Err(source) = sync(&mut file) {
            self.report(Operation::Flush, &WriterError::Io(source), None);
        }
    }

    fn report(&self, operation: Operation, error: &WriterError, record: Option<&LogRecord>) {
        let path = error.path().unwrap_or_else(|| self.active_path());
        (self.errors)(error, &ErrorContext::new(operation, path), record);
    }
}

fn sync(file: &mut File) -> io::Result<()> {
    file.flush()?;
    file.sync_data()
}
