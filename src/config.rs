//! Configuration management for logroll

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::record::{JsonFormatter, PlainFormatter};
use crate::rotation::RotationPolicy;
use crate::writer::{LogWriterBuilder, WriteStrategy, DEFAULT_HIGH_WATERMARK};

/// Record layout in the log file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    /// `<timestamp> <LEVEL> <target>: <message> key=value...`
    #[default]
    Plain,
    /// One JSON object per record
    Json,
}

/// Writer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Active log file. `~` is expanded.
    #[serde(default = "default_log_path")]
    pub path: PathBuf,

    /// "sync" (default) or "buffered"
    #[serde(default)]
    pub strategy: WriteStrategy,

    /// Buffered mode: maximum time a record waits in the queue (default: 1000ms)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Buffered mode: queue length that forces a flush (default: 256)
    #[serde(default = "default_high_watermark")]
    pub buffer_high_watermark: usize,

    /// Buffered mode: write ERROR records out immediately
    #[serde(default)]
    pub sync_error_records: bool,

    /// "plain" (default) or "json"
    #[serde(default)]
    pub format: FormatKind,

    /// Text written after each plain record
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Rotation triggers, retention limits and compression
    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_path() -> PathBuf {
    logs_dir().join("logroll.log")
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_high_watermark() -> usize {
    DEFAULT_HIGH_WATERMARK
}

fn default_separator() -> String {
    "\n".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            strategy: WriteStrategy::default(),
            flush_interval_ms: default_flush_interval_ms(),
            buffer_high_watermark: default_high_watermark(),
            sync_error_records: false,
            format: FormatKind::default(),
            separator: default_separator(),
            rotation: RotationPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default file, or return default if not found
    pub fn load() -> Result<Self> {
        let path = config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file, creating its directory if needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Reject settings the writer cannot run with
    pub fn validate(&self) -> Result<()> {
        self.rotation.validate().context("Invalid [rotation] settings")?;
        if self.path.as_os_str().is_empty() {
            anyhow::bail!("Log path must not be empty");
        }
        if self.flush_interval_ms == 0 {
            anyhow::bail!("flush_interval_ms must be greater than zero");
        }
        if self.buffer_high_watermark == 0 {
            anyhow::bail!("buffer_high_watermark must be at least 1");
        }
        Ok(())
    }

    /// The active log file with `~` expanded
    pub fn log_path(&self) -> PathBuf {
        let raw = self.path.to_string_lossy();
        PathBuf::from(shellexpand::tilde(&raw).into_owned())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// A writer builder carrying every setting of this configuration
    pub fn writer_builder(&self) -> LogWriterBuilder {
        let builder = crate::writer::LogWriter::builder(self.log_path())
            .policy(self.rotation.clone())
            .strategy(self.strategy)
            .flush_interval(self.flush_interval())
            .high_watermark(self.buffer_high_watermark)
            .sync_error_records(self.sync_error_records);

        match self.format {
            FormatKind::Plain => {
                builder.formatter(PlainFormatter::new().with_separator(self.separator.clone()))
            }
            FormatKind::Json => builder.formatter(JsonFormatter),
        }
    }
}

/// Get the base configuration directory (~/.logroll)
/// Falls back to ./.logroll if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine home directory, using current directory for config");
        PathBuf::from(".logroll")
    })
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".logroll"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the default logs directory
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}
