//! The log writer
//!
//! [`LogWriter`] is the public entry point. It is built from a path and a
//! [`RotationPolicy`] and runs in one of two strategies: synchronous, where every
//! record is in the file when `write` returns, or buffered, where a background task
//! writes records in batches.

mod buffered;
mod file;
mod state;
mod sync;

pub use buffered::{BufferOptions, BufferedWriter, DEFAULT_FLUSH_INTERVAL, DEFAULT_HIGH_WATERMARK};
pub use file::{PendingRecord, RotatingFile};
pub use state::WriterState;
pub use sync::SyncWriter;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::config::Config;
use crate::error::{stderr_error_handler, ErrorContext, ErrorHandler, Result, WriterError};
use crate::record::{Formatter, LogRecord, PlainFormatter};
use crate::rotation::{RotatedFile, RotationInterval, RotationPolicy};

/// How records travel from `write` to the file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStrategy {
    /// Write through on every call
    #[default]
    Sync,
    /// Queue and write from a background task
    Buffered,
}

enum Inner {
    Sync(SyncWriter),
    Buffered(BufferedWriter),
}

/// A rotating, retained log file writer
pub struct LogWriter {
    inner: Inner,
    active_path: PathBuf,
}

impl LogWriter {
    /// Start building a writer for the active file at `path`
    pub fn builder(path: impl Into<PathBuf>) -> LogWriterBuilder {
        LogWriterBuilder::new(path)
    }

    /// Build a writer from loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.writer_builder().build()
    }

    /// Append a record
    ///
    /// Never fails: I/O problems go to the error handler and the writer keeps going.
    pub fn write(&mut self, record: LogRecord) {
        match &mut self.inner {
            Inner::Sync(writer) => writer.write(record),
            Inner::Buffered(writer) => writer.write(record),
        }
    }

    /// Write out anything pending and flush the active file
    pub async fn flush(&mut self) {
        match &mut self.inner {
            Inner::Sync(writer) => writer.flush(),
            Inner::Buffered(writer) => writer.flush().await,
        }
    }

    /// Write out anything pending and release the active file
    ///
    /// Closing twice is harmless, and a later `write` reopens the file.
    pub async fn close(&mut self) {
        match &mut self.inner {
            Inner::Sync(writer) => writer.close(),
            Inner::Buffered(writer) => writer.close().await,
        }
    }

    /// Rotate now, after writing out anything pending
    pub async fn force_rotate(&mut self) {
        match &mut self.inner {
            Inner::Sync(writer) => writer.force_rotate(),
            Inner::Buffered(writer) => writer.force_rotate().await,
        }
    }

    pub fn strategy(&self) -> WriteStrategy {
        match self.inner {
            Inner::Sync(_) => WriteStrategy::Sync,
            Inner::Buffered(_) => WriteStrategy::Buffered,
        }
    }

    /// Path of the active file
    pub fn active_path(&self) -> &Path {
        &self.active_path
    }

    /// Rotated files currently on disk, newest first
    pub fn rotated_files(&self) -> std::io::Result<Vec<RotatedFile>> {
        crate::rotation::discover_rotated_files(&crate::rotation::FileNaming::new(
            &self.active_path,
        ))
    }
}

/// Builder for [`LogWriter`]
pub struct LogWriterBuilder {
    path: PathBuf,
    policy: RotationPolicy,
    strategy: WriteStrategy,
    buffer: BufferOptions,
    formatter: Arc<dyn Formatter>,
    errors: ErrorHandler,
}

impl LogWriterBuilder {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            policy: RotationPolicy::default(),
            strategy: WriteStrategy::default(),
            buffer: BufferOptions::default(),
            formatter: Arc::new(PlainFormatter::new()),
            errors: stderr_error_handler(),
        }
    }

    /// Replace the whole rotation policy
    pub fn policy(mut self, policy: RotationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.policy = self.policy.with_max_file_size(bytes);
        self
    }

    pub fn max_file_count(mut self, count: usize) -> Self {
        self.policy = self.policy.with_max_file_count(count);
        self
    }

    pub fn max_age(mut self, age: Duration) -> Self {
        self.policy = self.policy.with_max_age(age);
        self
    }

    pub fn interval(mut self, interval: RotationInterval) -> Self {
        self.policy = self.policy.with_interval(interval);
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.policy = self.policy.with_compression(compress);
        self
    }

    pub fn strategy(mut self, strategy: WriteStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Shorthand for the buffered strategy
    pub fn buffered(self) -> Self {
        self.strategy(WriteStrategy::Buffered)
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.buffer.flush_interval = interval;
        self
    }

    pub fn high_watermark(mut self, records: usize) -> Self {
        self.buffer.high_watermark = records;
        self
    }

    /// In buffered mode, flush as soon as an ERROR record is queued
    pub fn sync_error_records(mut self, enabled: bool) -> Self {
        self.buffer.sync_error_records = enabled;
        self
    }

    pub fn formatter(mut self, formatter: impl Formatter + 'static) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    /// Receive runtime errors instead of printing them to stderr
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&WriterError, &ErrorContext, Option<&LogRecord>) + Send + Sync + 'static,
    {
        self.errors = Arc::new(handler);
        self
    }

    /// Validate the settings and create the writer
    ///
    /// No file is opened here. The buffered strategy must be built inside a Tokio
    /// runtime, which then hosts its flush task.
    pub fn build(self) -> Result<LogWriter> {
        self.policy.validate()?;

        if self.path.file_name().is_none() {
            return Err(WriterError::Config(format!(
                "log path {} has no file name",
                self.path.display()
            )));
        }
        if self.path.is_dir() {
            return Err(WriterError::Config(format!(
                "log path {} is a directory",
                self.path.display()
            )));
        }

        let file = RotatingFile::new(self.path.clone(), self.policy, Arc::clone(&self.errors));
        let inner = match self.strategy {
            WriteStrategy::Sync => Inner::Sync(SyncWriter::new(file, self.formatter)),
            WriteStrategy::Buffered => {
                if self.buffer.flush_interval.is_zero() {
                    return Err(WriterError::Config(
                        "flush interval must be greater than zero".to_string(),
                    ));
                }
                if self.buffer.high_watermark == 0 {
                    return Err(WriterError::Config(
                        "high watermark must be at least 1".to_string(),
                    ));
                }
                let runtime = Handle::try_current().map_err(|_| {
                    WriterError::Config(
                        "the buffered strategy needs a running Tokio runtime".to_string(),
                    )
                })?;
                Inner::Buffered(BufferedWriter::new(
                    file,
                    self.formatter,
                    self.buffer,
                    self.errors,
                    runtime,
                ))
            }
        };

        Ok(LogWriter {
            inner,
            active_path: self.path,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::fs::{self, File};
    use std::io::Read;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use flate2::read::GzDecoder;

    use crate::error::{ErrorContext, ErrorHandler, Operation, WriterError};
    use crate::record::LogRecord;
    use crate::rotation::{discover_rotated_files, FileNaming};

    pub type Collected = Arc<Mutex<Vec<(Operation, Option<String>)>>>;

    /// Error handler recording the operation and dropped message of each report
    pub fn collecting_handler() -> (ErrorHandler, Collected) {
        let collected: Collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);
        let handler: ErrorHandler = Arc::new(
            move |_error: &WriterError, context: &ErrorContext, record: Option<&LogRecord>| {
                sink.lock()
                    .unwrap()
                    .push((context.operation, record.map(|r| r.message.clone())));
            },
        );
        (handler, collected)
    }

    /// Every rotated file oldest first, then the active file, decompressed and joined
    pub fn read_all_logs(active: &Path) -> String {
        let mut files = discover_rotated_files(&FileNaming::new(active)).unwrap();
        files.reverse();

        let mut text = String::new();
        for file in files {
            if file.compressed {
                GzDecoder::new(File::open(&file.path).unwrap())
                    .read_to_string(&mut text)
                    .unwrap();
            } else {
                text.push_str(&fs::read_to_string(&file.path).unwrap());
            }
        }
        if active.exists() {
            text.push_str(&fs::read_to_string(active).unwrap());
        }
        text
    }
}
