//! Record formatters
//!
//! A formatter turns a [`LogRecord`] into the text of one log entry. The writer
//! appends [`Formatter::separator`] after every entry.

use super::LogRecord;

/// Renders records as text for the file writer
pub trait Formatter: Send + Sync {
    /// Render one record. The result should not end with the separator.
    fn format(&self, record: &LogRecord) -> String;

    /// Text appended after every formatted record
    ///
    /// Formatters whose output may contain literal newlines should return a
    /// distinguishing multi-character separator.
    fn separator(&self) -> &str {
        "\n"
    }
}

/// Human-readable single-line format, close to `tracing_subscriber::fmt`
///
/// `2024-01-01T12:00:00.000000Z  INFO app::db: connected pool=4`
#[derive(Debug, Clone)]
pub struct PlainFormatter {
    separator: String,
}

impl PlainFormatter {
    pub fn new() -> Self {
        Self {
            separator: "\n".to_string(),
        }
    }

    /// Use a custom record separator (for messages that contain newlines)
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

impl Default for PlainFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for PlainFormatter {
    fn format(&self, record: &LogRecord) -> String {
        let mut line = format!(
            "{} {:>5} {}: {}",
            record.timestamp.format("%Y-%m-%dT%H:%M:%S%.6fZ"),
            record.level,
            record.target,
            record.message
        );
        for (key, value) in &record.fields {
            line.push(' ');
            line.push_str(key);
            line.push('=');
            line.push_str(value);
        }
        line
    }

    fn separator(&self) -> &str {
        &self.separator
    }
}

/// One JSON object per line
///
/// Newlines inside messages are escaped by JSON, so `"\n"` stays a safe separator.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> String {
        serde_json::to_string(record).unwrap_or_else(|e| {
            format!(
                r#"{{"level":"ERROR","target":"logroll","message":"unserializable record: {}"}}"#,
                e
            )
        })
    }
}
