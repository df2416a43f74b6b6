//! Configuration (tailview.toml).
//!
//! All tuning knobs of the merge pipeline live here with serde defaults, so
//! an empty or partial TOML file yields a working setup and tests can dial
//! individual thresholds without touching the rest.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::logging::LogConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Merge pipeline tuning
    pub pipeline: PipelineConfig,
    /// File-following behaviour
    pub follow: FollowConfig,
    /// Logging setup
    pub log: LogConfig,
}

/// Tuning knobs of the producer/consumer merge pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum records in flight between producer and consumer. The producer
    /// stalls at this many undispatched records and switches to private
    /// buffering; the value bounds consumer-side queue growth.
    pub congestion_ceiling: usize,

    /// How long the consumer may run without draining its queue before it is
    /// considered busy and asks the producer to take the stream back.
    pub busy_threshold_ms: u64,

    /// During catch-up buffering, emit a progress notice every this many
    /// buffered records.
    pub progress_every: usize,

    /// Poll interval while the producer waits for in-flight records to drain.
    pub drain_poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            congestion_ceiling: 20,
            busy_threshold_ms: 200,
            progress_every: 5000,
            drain_poll_interval_ms: 10,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn busy_threshold(&self) -> Duration {
        Duration::from_millis(self.busy_threshold_ms)
    }

    #[must_use]
    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }
}

/// File-following behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    /// Poll interval for new data once a file set is caught up
    pub poll_interval_ms: u64,

    /// Re-scan interval for newly rotated files in the set
    pub rescan_interval_ms: u64,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            rescan_interval_ms: 1000,
        }
    }
}

impl FollowConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn rescan_interval(&self) -> Duration {
        Duration::from_millis(self.rescan_interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::ReadFailed(path.display().to_string(), e.to_string())
        })?;
        let config: Self =
            toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, from `tailview.toml` in the working
    /// directory if that exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> crate::Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let local = PathBuf::from("tailview.toml");
        if local.exists() {
            return Self::load(&local);
        }
        Ok(Self::default())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.pipeline.congestion_ceiling == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.congestion_ceiling must be at least 1".to_string(),
            )
            .into());
        }
        if self.pipeline.progress_every == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.progress_every must be at least 1".to_string(),
            )
            .into());
        }
        if self.pipeline.drain_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.drain_poll_interval_ms must be at least 1".to_string(),
            )
            .into());
        }
        Ok(())
    }
}
