//! tracing integration
//!
//! [`FileLayer`] turns `tracing` events into [`LogRecord`]s and writes them through
//! a [`LogWriter`], so an application can send its own logs to rotated files.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::Config;
use crate::record::{LogLevel, LogRecord};
use crate::writer::LogWriter;

/// Events from this crate are never written, so the writer cannot log into itself
const OWN_TARGET: &str = "logroll";

type SharedWriter = Arc<Mutex<Option<LogWriter>>>;

fn lock(writer: &SharedWriter) -> MutexGuard<'_, Option<LogWriter>> {
    writer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Layer writing every event it sees to a log file
pub struct FileLayer {
    writer: SharedWriter,
    active_path: PathBuf,
}

impl FileLayer {
    pub fn new(writer: LogWriter) -> Self {
        let active_path = writer.active_path().to_path_buf();
        Self {
            writer: Arc::new(Mutex::new(Some(writer))),
            active_path,
        }
    }

    /// Guard that closes this layer's writer on shutdown
    pub fn guard(&self) -> LoggingGuard {
        LoggingGuard {
            writer: Arc::clone(&self.writer),
            active_path: self.active_path.clone(),
        }
    }
}

impl<S> Layer<S> for FileLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(OWN_TARGET) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        if visitor.message.is_empty() {
            visitor.message = metadata.name().to_string();
        }

        let mut record = LogRecord::new(
            LogLevel::from(*metadata.level()),
            metadata.target(),
            visitor.message,
        );
        record.fields = visitor.fields;

        if let Some(writer) = lock(&self.writer).as_mut() {
            writer.write(record);
        }
    }
}

/// Collects the `message` field and every other field of an event
#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message.clear();
            write!(self.message, "{:?}", value).ok();
        } else {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }
}

/// Keeps file logging alive; call [`LoggingGuard::shutdown`] before exiting
pub struct LoggingGuard {
    writer: SharedWriter,
    active_path: PathBuf,
}

impl LoggingGuard {
    /// Path of the active log file
    pub fn active_path(&self) -> &Path {
        &self.active_path
    }

    /// Write out pending records and close the file
    ///
    /// Events logged afterwards are discarded.
    pub async fn shutdown(self) {
        let writer = lock(&self.writer).take();
        if let Some(mut writer) = writer {
            writer.close().await;
        }
    }
}

/// Install a global subscriber that writes events to the configured log file
///
/// The level filter comes from `RUST_LOG`, defaulting to `info`. A buffered
/// configuration must be initialized inside a Tokio runtime.
pub fn init_file_logging(config: &Config) -> Result<LoggingGuard> {
    let writer = LogWriter::from_config(config).context("Failed to create log writer")?;
    let layer = FileLayer::new(writer);
    let guard = layer.guard();

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
