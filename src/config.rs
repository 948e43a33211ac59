//! Tunables for the upload pipeline and the sync daemon.
//!
//! Everything here can be overridden from a TOML file; missing keys fall back
//! to the defaults below.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default cap for the exponential retry backoff, in minutes
pub const DEFAULT_BACKOFF_CAP_MINUTES: u64 = 30;

/// Retry backoff in minutes: `min(2^retry_count, cap)`
pub fn backoff_minutes(retry_count: u32, cap_minutes: u64) -> u64 {
    2u64.checked_pow(retry_count)
        .unwrap_or(u64::MAX)
        .min(cap_minutes)
}

/// Payload, retry and scheduling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Hard ceiling of one submission, in bytes
    pub max_payload_bytes: usize,
    /// Photos above this estimated size get re-encoded
    pub max_photo_bytes: usize,
    /// More photos than this in one catch report triggers a warning
    pub max_photos_per_submission: usize,
    /// Longest side of a re-encoded photo, in pixels
    pub reduced_photo_dimension: u32,
    /// JPEG quality used when re-encoding (1-100)
    pub reduced_photo_quality: u8,
    /// Automatic attempts before an upload is permanently failed
    pub max_retry_attempts: u32,
    pub backoff_cap_minutes: u64,
    /// Interval of the periodic reconciliation sweep
    pub sync_interval_minutes: u64,
    /// Delay between enqueue and the first processing attempt
    pub debounce_seconds: u64,
    /// Delay between "back online" and the triggered sweep
    pub reconnect_debounce_seconds: u64,
    /// How long a completed upload stays visible before eviction
    pub completed_grace_seconds: u64,
    pub progress_tick_millis: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 5 * 1024 * 1024,
            max_photo_bytes: 1024 * 1024,
            max_photos_per_submission: 5,
            reduced_photo_dimension: 1280,
            reduced_photo_quality: 70,
            max_retry_attempts: 5,
            backoff_cap_minutes: DEFAULT_BACKOFF_CAP_MINUTES,
            sync_interval_minutes: 5,
            debounce_seconds: 2,
            reconnect_debounce_seconds: 2,
            completed_grace_seconds: 3,
            progress_tick_millis: 500,
        }
    }
}

impl SyncConfig {
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_secs(self.debounce_seconds)
    }

    pub fn reconnect_debounce_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_debounce_seconds)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_minutes * 60)
    }

    pub fn completed_grace(&self) -> Duration {
        Duration::from_secs(self.completed_grace_seconds)
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_millis)
    }

    /// Delay before the next automatic attempt after `retry_count` failures
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        Duration::from_secs(backoff_minutes(retry_count, self.backoff_cap_minutes) * 60)
    }

    /// Validates ranges that would otherwise break scheduling or optimization
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_payload_bytes == 0 {
            return Err(AppError::Config(
                "max_payload_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_photo_bytes > self.max_payload_bytes {
            return Err(AppError::Config(
                "max_photo_bytes must not exceed max_payload_bytes".to_string(),
            ));
        }
        if self.reduced_photo_dimension == 0 {
            return Err(AppError::Config(
                "reduced_photo_dimension must be greater than zero".to_string(),
            ));
        }
        if !(1..=100).contains(&self.reduced_photo_quality) {
            return Err(AppError::Config(
                "reduced_photo_quality must be between 1 and 100".to_string(),
            ));
        }
        if self.max_retry_attempts == 0 {
            return Err(AppError::Config(
                "max_retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.sync_interval_minutes == 0 {
            return Err(AppError::Config(
                "sync_interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.progress_tick_millis == 0 {
            return Err(AppError::Config(
                "progress_tick_millis must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings of the `fangbuch` sync daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub database_path: PathBuf,
    /// Base URL of the submission API, e.g. `https://portal.example.org/api`
    pub api_base_url: String,
    /// Seconds between two connectivity probes
    pub probe_interval_seconds: u64,
    pub request_timeout_seconds: u64,
    pub sync: SyncConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            database_path: crate::database::get_database_path(),
            api_base_url: "http://localhost:8080/api".to_string(),
            probe_interval_seconds: 15,
            request_timeout_seconds: 60,
            sync: SyncConfig::default(),
        }
    }
}

impl DaemonConfig {
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn from_toml(s: &str) -> Result<Self, AppError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the daemon configuration, falling back to defaults if the file is missing
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.api_base_url.trim().is_empty() {
            return Err(AppError::Config("api_base_url must not be empty".to_string()));
        }
        if self.probe_interval_seconds == 0 {
            return Err(AppError::Config(
                "probe_interval_seconds must be at least 1".to_string(),
            ));
        }
        self.sync.validate()
    }
}
