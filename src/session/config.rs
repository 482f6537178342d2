//! Session configuration.
//!
//! Options are declared when a session is opened. The module keeps a default
//! set, normally loaded from a TOML file, which includes the control policy
//! applied when a caller does not pick one.

use crate::control::ControlPolicy;
use crate::device::{FlashMode, ResolutionPreference, TorchMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Largest accepted capture queue depth.
pub const MAX_QUEUE_DEPTH: usize = 64;

/// Configuration for a camera session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Stream resolution preference.
    pub resolution: ResolutionPreference,
    /// Maximum outstanding capture requests.
    pub queue_depth: usize,
    /// Strict rejects out-of-range controls, permissive clamps them.
    pub control_policy: ControlPolicy,
    /// Flash mode used when a capture does not ask for one.
    pub flash: FlashMode,
    /// Torch state applied when the session starts.
    pub torch: TorchMode,
    /// How long the device may take to finish a capture, in milliseconds.
    pub capture_timeout_ms: u64,
    /// Record audio with videos (requires microphone authorization).
    pub record_audio: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            resolution: ResolutionPreference::Highest,
            queue_depth: 4,
            control_policy: ControlPolicy::Strict,
            flash: FlashMode::Off,
            torch: TorchMode::Off,
            capture_timeout_ms: 5_000,
            record_audio: false,
        }
    }
}

impl SessionConfig {
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    pub fn with_policy(mut self, policy: ControlPolicy) -> Self {
        self.control_policy = policy;
        self
    }

    pub fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout_ms = timeout.as_millis() as u64;
        self
    }

    #[inline]
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_depth == 0 || self.queue_depth > MAX_QUEUE_DEPTH {
            return Err(ConfigError::InvalidQueueDepth);
        }
        if self.capture_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid queue depth (must be 1-{MAX_QUEUE_DEPTH})")]
    InvalidQueueDepth,
    #[error("capture timeout must be positive")]
    InvalidTimeout,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Metrics server port (0 to disable).
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { port: 0 }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.session.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue_depth, 4);
    }

    #[test]
    fn test_zero_depth_invalid() {
        let config = SessionConfig::default().with_queue_depth(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidQueueDepth)
        ));
    }

    #[test]
    fn test_parse_toml() {
        let config = FileConfig::from_toml(
            r#"
            [session]
            queue_depth = 2
            control_policy = "permissive"
            flash = "auto"
            resolution = "lowest"

            [metrics]
            port = 9100
            "#,
        )
        .unwrap();

        assert_eq!(config.session.queue_depth, 2);
        assert_eq!(config.session.control_policy, ControlPolicy::Permissive);
        assert_eq!(config.session.flash, FlashMode::Auto);
        assert_eq!(config.session.resolution, ResolutionPreference::Lowest);
        assert_eq!(config.session.capture_timeout_ms, 5_000);
        assert_eq!(config.metrics.port, 9100);
    }

    #[test]
    fn test_parse_rejects_invalid_values() {
        let err = FileConfig::from_toml("[session]\ncapture_timeout_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout));

        let err = FileConfig::from_toml("[session]\nqueue_depth = \"four\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
