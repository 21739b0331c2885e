//! Engine configuration
//!
//! Stored as YAML; every field has a default so a partial file (or none at
//! all) is fine:
//!
//! ```yaml
//! poll_interval_ms: 10
//! start_lead_per_track_ms: 10
//! format_retry:
//!   max_attempts: 50
//! audio:
//!   buffer_size: !Fixed 256
//! catalog_path: /home/me/Music/stemplayer/catalog.yaml
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::default_catalog_path;
use crate::audio::AudioConfig;
use crate::transport::RetryPolicy;

/// Timing, retry and output settings for the stem player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Control-loop tick period
    pub poll_interval_ms: u64,
    /// Remaining time at which a playing song advances; defaults to one tick
    pub auto_advance_threshold_ms: Option<u64>,
    /// Scheduling headroom, multiplied by the song's track count
    pub start_lead_per_track_ms: u64,
    /// How often the live output format is compared against the route's
    pub format_check_interval_ms: u64,
    pub format_retry: RetryPolicy,
    pub audio: AudioConfig,
    pub catalog_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            auto_advance_threshold_ms: None,
            start_lead_per_track_ms: 10,
            format_check_interval_ms: 500,
            format_retry: RetryPolicy::default(),
            audio: AudioConfig::default(),
            catalog_path: default_catalog_path(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn auto_advance_threshold(&self) -> Duration {
        self.auto_advance_threshold_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.poll_interval())
    }

    pub fn start_lead_per_track(&self) -> Duration {
        Duration::from_millis(self.start_lead_per_track_ms)
    }

    /// Ticks between format drift checks (at least one)
    pub fn format_check_ticks(&self) -> u32 {
        let ticks = self.format_check_interval_ms / self.poll_interval_ms.max(1);
        ticks.clamp(1, u32::MAX as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_defaults_to_poll_interval() {
        let config = EngineConfig::default();
        assert_eq!(config.auto_advance_threshold(), Duration::from_millis(10));

        let config = EngineConfig {
            auto_advance_threshold_ms: Some(250),
            ..EngineConfig::default()
        };
        assert_eq!(config.auto_advance_threshold(), Duration::from_millis(250));
    }

    #[test]
    fn test_format_check_ticks() {
        assert_eq!(EngineConfig::default().format_check_ticks(), 50);

        let config = EngineConfig {
            format_check_interval_ms: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.format_check_ticks(), 1);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = "poll_interval_ms: 20\nformat_retry:\n  max_attempts: 3\n";
        let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.poll_interval(), Duration::from_millis(20));
        assert_eq!(config.auto_advance_threshold(), Duration::from_millis(20));
        assert_eq!(config.format_retry.max_attempts, 3);
        assert_eq!(config.format_retry.max_backoff_ms, 200);
        assert_eq!(config.start_lead_per_track_ms, 10);
        assert_eq!(config.format_check_ticks(), 25);
    }
}
