//! Error types and error reporting for the log writer
//!
//! Runtime I/O problems never reach the logging call site. They are wrapped in a
//! [`WriterError`], tagged with an [`ErrorContext`] and handed to the writer's
//! [`ErrorHandler`]. Only construction-time misconfiguration is returned to the caller.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::record::LogRecord;

/// Errors that can occur while writing, rotating or retaining log files
#[derive(Error, Debug)]
pub enum WriterError {
    /// Unclassified I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to create the log directory or open the active file
    #[error("failed to open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    /// Failed to append a record to the active file
    #[error("failed to write to {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    /// Failed to move the active file to its rotated name
    #[error("failed to rename {} to {}: {source}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// Failed to gzip a rotated file
    #[error("failed to compress {}: {source}", .path.display())]
    Compress { path: PathBuf, source: io::Error },

    /// Failed to delete a rotated file during retention
    #[error("failed to delete {}: {source}", .path.display())]
    Delete { path: PathBuf, source: io::Error },

    /// Invalid writer configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// The background flush worker is gone
    #[error("writer is closed")]
    Closed,

    /// A background flush task panicked or was cancelled
    #[error("background flush failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, WriterError>;

impl WriterError {
    /// Get the underlying I/O error, if any
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            WriterError::Io(e) => Some(e),
            WriterError::Open { source, .. }
            | WriterError::Write { source, .. }
            | WriterError::Rename { source, .. }
            | WriterError::Compress { source, .. }
            | WriterError::Delete { source, .. } => Some(source),
            WriterError::Config(_) | WriterError::Closed | WriterError::Worker(_) => None,
        }
    }

    /// The file this error is about, if it names one
    pub fn path(&self) -> Option<&Path> {
        match self {
            WriterError::Open { path, .. }
            | WriterError::Write { path, .. }
            | WriterError::Compress { path, .. }
            | WriterError::Delete { path, .. } => Some(path),
            WriterError::Rename { from, .. } => Some(from),
            _ => None,
        }
    }

    /// Categorize this error for user-facing diagnostics
    pub fn disk_error_kind(&self) -> DiskErrorKind {
        self.io_error()
            .map(categorize_io_error)
            .unwrap_or(DiskErrorKind::Other)
    }
}

/// Categories of disk errors for user-friendly messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskErrorKind {
    /// Disk is full or quota exceeded
    DiskFull,
    /// Permission denied (read or write)
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// Other IO error
    Other,
}

impl DiskErrorKind {
    /// Get a user-friendly message for this error kind
    pub fn user_message(&self) -> &'static str {
        match self {
            DiskErrorKind::DiskFull => "disk full, free space needed to keep logging",
            DiskErrorKind::PermissionDenied => "permission denied on the log directory",
            DiskErrorKind::NotFound => "file or directory not found",
            DiskErrorKind::Other => "I/O failure",
        }
    }
}

/// Categorize an IO error into a user-friendly category
pub fn categorize_io_error(e: &io::Error) -> DiskErrorKind {
    use std::io::ErrorKind;

    match e.kind() {
        // On some systems, disk full surfaces as WriteZero
        ErrorKind::WriteZero => DiskErrorKind::DiskFull,
        ErrorKind::PermissionDenied => DiskErrorKind::PermissionDenied,
        ErrorKind::NotFound => DiskErrorKind::NotFound,
        _ => {
            #[cfg(unix)]
            {
                if let Some(os_error) = e.raw_os_error() {
                    // ENOSPC = 28, EDQUOT = 122 on Linux / 69 on macOS
                    if os_error == 28 || os_error == 122 || os_error == 69 {
                        return DiskErrorKind::DiskFull;
                    }
                    // EACCES
                    if os_error == 13 {
                        return DiskErrorKind::PermissionDenied;
                    }
                }
            }
            DiskErrorKind::Other
        }
    }
}

/// The writer step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Open,
    Write,
    Rotate,
    Compress,
    Retention,
    Flush,
    Close,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Open => "open",
            Operation::Write => "write",
            Operation::Rotate => "rotate",
            Operation::Compress => "compress",
            Operation::Retention => "retention",
            Operation::Flush => "flush",
            Operation::Close => "close",
        }
    }
}

/// Diagnostic information passed to the error handler alongside the error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// What the writer was doing
    pub operation: Operation,
    /// File the operation targeted, if any
    pub path: Option<PathBuf>,
}

impl ErrorContext {
    pub fn new(operation: Operation, path: impl AsRef<Path>) -> Self {
        Self {
            operation,
            path: Some(path.as_ref().to_path_buf()),
        }
    }

    pub fn without_path(operation: Operation) -> Self {
        Self {
            operation,
            path: None,
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} {}", self.operation.as_str(), path.display()),
            None => f.write_str(self.operation.as_str()),
        }
    }
}

/// Callback receiving every runtime error of a writer
///
/// Arguments are the error, what the writer was doing, and the record being
/// written when the failure happened (if any).
pub type ErrorHandler =
    Arc<dyn Fn(&WriterError, &ErrorContext, Option<&LogRecord>) + Send + Sync + 'static>;

/// Default error handler: one human-readable line per error on stderr
pub fn stderr_error_handler() -> ErrorHandler {
    Arc::new(
        |error: &WriterError, context: &ErrorContext, record: Option<&LogRecord>| {
            eprintln!("{}", describe_error(error, context, record));
        },
    )
}

/// Render an error report as a single line
pub fn describe_error(
    error: &WriterError,
    context: &ErrorContext,
    record: Option<&LogRecord>,
) -> String {
    let kind = error.disk_error_kind();
    let mut line = match kind {
        DiskErrorKind::Other => format!("logroll: {}: {}", context, error),
        _ => format!("logroll: {}: {} ({})", context, kind.user_message(), error),
    };
    if let Some(record) = record {
        line.push_str(&format!(
            " [record {} {}: {}]",
            record.level.as_str(),
            record.target,
            record.message
        ));
    }
    line
}
