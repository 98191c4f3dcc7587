use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::audio::vad::VadConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub reconnect: ReconnectConfig,
    /// Outbound queue of the control and status channels
    pub queue: QueueConfig,
    /// Outbound queue of the hotword channel; stale audio is of little use
    pub hotword_queue: QueueConfig,
    pub request_timeout_ms: u64,
    pub vad: VadConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued frame to make room
    DropOldest,
    /// Discard the frame being queued
    RejectNewest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            queue: QueueConfig::default(),
            hotword_queue: QueueConfig {
                capacity: 8,
                overflow: OverflowPolicy::DropOldest,
            },
            request_timeout_ms: 10_000,
            vad: VadConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_ms: 1000,
            max_ms: 10_000,
            multiplier: 1.5,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            overflow: OverflowPolicy::DropOldest,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reconnect_policy() {
        let config = ClientConfig::default();
        assert_eq!(config.reconnect.initial_ms, 1000);
        assert_eq!(config.reconnect.max_ms, 10_000);
        assert_eq!(config.reconnect.multiplier, 1.5);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            request_timeout_ms = 2500

            [queue]
            capacity = 16
            overflow = "reject_newest"

            [vad]
            hangover_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.request_timeout_ms, 2500);
        assert_eq!(config.queue.capacity, 16);
        assert_eq!(config.queue.overflow, OverflowPolicy::RejectNewest);
        assert_eq!(config.vad.hangover_ms, 500);
        assert_eq!(config.vad.rms_start, VadConfig::default().rms_start);
        assert_eq!(config.reconnect, ReconnectConfig::default());
        assert_eq!(config.hotword_queue.capacity, 8);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            ClientConfig::load("/nonexistent/jarvis-client.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
