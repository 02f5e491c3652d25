//! Rotation and retention of log files
//!
//! A file rotates when *any* configured trigger fires (size or calendar period).
//! After each rotation, rotated files are deleted to satisfy the count and age limits.
//! If no trigger is set, the active file simply grows forever.

mod compress;
pub mod naming;
pub mod retention;
mod trigger;

pub use compress::{gzip_file, COMPRESSED_SUFFIX};
pub use naming::FileNaming;
pub use retention::{apply_retention, discover_rotated_files, select_for_deletion, RotatedFile};
pub use trigger::should_rotate;

use std::time::Duration;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WriterError};

/// Calendar period after which the active file rotates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationInterval {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl RotationInterval {
    /// Key identifying the calendar bucket a timestamp falls into (UTC)
    ///
    /// Two timestamps belong to the same period iff their keys are equal.
    /// Weeks are ISO weeks, keyed by ISO year.
    pub fn period_key(&self, ts: DateTime<Utc>) -> (i32, u32, u32, u32) {
        match self {
            RotationInterval::Hourly => (ts.year(), ts.month(), ts.day(), ts.hour()),
            RotationInterval::Daily => (ts.year(), ts.month(), ts.day(), 0),
            RotationInterval::Weekly => {
                let week = ts.iso_week();
                (week.year(), week.week(), 0, 0)
            }
            RotationInterval::Monthly => (ts.year(), ts.month(), 0, 0),
        }
    }
}

/// Controls when the active file rotates and which rotated files are kept
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationPolicy {
    /// Rotate once the active file reaches this many bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<u64>,
    /// Total files to keep, counting the active file (at least 2)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_count: Option<usize>,
    /// Delete rotated files last modified longer ago than this
    #[serde(
        rename = "max_age_secs",
        with = "duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_age: Option<Duration>,
    /// Rotate when a record falls into a new calendar period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<RotationInterval>,
    /// Gzip rotated files
    pub compress: bool,
}

impl RotationPolicy {
    /// Specifies the maximum active file size.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Specifies the maximum number of files, active file included.
    pub fn with_max_file_count(mut self, count: usize) -> Self {
        self.max_file_count = Some(count);
        self
    }

    /// Specifies the maximum age of rotated files.
    pub fn with_max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    /// Specifies the calendar rotation period.
    pub fn with_interval(mut self, interval: RotationInterval) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Enables gzip compression of rotated files.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Whether any rotation trigger is configured
    pub fn rotates(&self) -> bool {
        self.max_file_size.is_some() || self.interval.is_some()
    }

    /// Whether any retention limit is configured
    pub fn retains(&self) -> bool {
        self.max_file_count.is_some() || self.max_age.is_some()
    }

    /// Reject settings that can only be programming mistakes
    pub fn validate(&self) -> Result<()> {
        if let Some(count) = self.max_file_count {
            if count < 2 {
                return Err(WriterError::Config(format!(
                    "max_file_count must be at least 2 (the active file plus one rotated file), got {}",
                    count
                )));
            }
        }
        if self.max_file_size == Some(0) {
            return Err(WriterError::Config(
                "max_file_size must be greater than zero".to_string(),
            ));
        }
        if self.max_age == Some(Duration::ZERO) {
            return Err(WriterError::Config(
                "max_age must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serializes `Option<Duration>` as whole seconds
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_u64(duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_validate_rejects_small_file_count() {
        assert!(RotationPolicy::default()
            .with_max_file_count(1)
            .validate()
            .is_err());
        assert!(RotationPolicy::default()
            .with_max_file_count(0)
            .validate()
            .is_err());
        assert!(RotationPolicy::default()
            .with_max_file_count(2)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_size() {
        assert!(RotationPolicy::default()
            .with_max_file_size(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_default_policy_never_rotates() {
        let policy = RotationPolicy::default();
        assert!(policy.validate().is_ok());
        assert!(!policy.rotates());
        assert!(!policy.retains());
    }

    #[test]
    fn test_weekly_key_uses_iso_year() {
        // 2024-12-30 is in ISO week 1 of 2025
        let a = RotationInterval::Weekly.period_key(ts(2024, 12, 30, 0, 0, 0));
        let b = RotationInterval::Weekly.period_key(ts(2025, 1, 2, 0, 0, 0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_policy_toml_roundtrip() {
        let policy = RotationPolicy::default()
            .with_max_file_size(1024)
            .with_max_age(Duration::from_secs(3600))
            .with_interval(RotationInterval::Daily);
        let text = toml::to_string(&policy).unwrap();
        assert!(text.contains("max_age_secs = 3600"));
        assert!(text.contains("interval = \"daily\""));
        let parsed: RotationPolicy = toml::from_str(&text).unwrap();
        assert_eq!(parsed, policy);
    }
}
