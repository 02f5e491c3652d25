//! logroll - rotating, retained log file writer
//!
//! Appends structured log records to a file, rotates it by size or calendar
//! period, optionally gzips rotated files and prunes old ones by count and age.

pub mod config;
pub mod error;
pub mod layer;
pub mod record;
pub mod rotation;
pub mod writer;

pub use error::{ErrorContext, ErrorHandler, Result, WriterError};
pub use layer::{init_file_logging, FileLayer, LoggingGuard};
pub use record::{Formatter, JsonFormatter, LogLevel, LogRecord, PlainFormatter};
pub use rotation::{RotationInterval, RotationPolicy};
pub use writer::{LogWriter, LogWriterBuilder, WriteStrategy};
