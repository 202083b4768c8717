//! Engine configuration
//!
//! One flat JSON file, loaded at startup. Every field has a default,
//! so a missing or partial file still yields a runnable engine. Zero
//! is rejected where it would stall the engine (the refresh interval,
//! the gate wait slice) and allowed where it means "do not wait" (the
//! as-of timeout).

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event};

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Config file unreadable: {0}")]
    Io(String),

    /// The file is not valid JSON for this shape.
    #[error("Config file malformed: {0}")]
    Parse(String),

    /// A field value is outside its allowed range.
    #[error("Config invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Io(_) => "CONFIG_IO_FAILED",
            ConfigError::Parse(_) => "CONFIG_PARSE_FAILED",
            ConfigError::Invalid(_) => "CONFIG_INVALID",
        }
    }
}

/// Tunable knobs of the route engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between refresh ticks.
    pub refresh_interval_secs: u64,
    /// Milliseconds a gate wait sleeps between probes.
    pub gate_wait_slice_ms: u64,
    /// Default cap on an as-of wait; zero means probe once and give up.
    pub default_asof_timeout_ms: u64,
    /// Build absolute URLs with the https scheme.
    pub https: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 5,
            gate_wait_slice_ms: 250,
            default_asof_timeout_ms: 2000,
            https: false,
        }
    }
}

impl EngineConfig {
    /// Loads and validates a JSON config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        config.validate()?;

        let interval = config.refresh_interval_secs.to_string();
        let https = config.https.to_string();
        let source = path.display().to_string();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("https", https.as_str()),
                ("interval_secs", interval.as_str()),
                ("path", source.as_str()),
            ],
        );
        Ok(config)
    }

    /// Rejects values that would stall the engine.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "refresh_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.gate_wait_slice_ms == 0 {
            return Err(ConfigError::Invalid(
                "gate_wait_slice_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Interval between refresh ticks.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Sleep slice between gate probes.
    pub fn gate_wait_slice(&self) -> Duration {
        Duration::from_millis(self.gate_wait_slice_ms)
    }

    /// Default as-of wait cap.
    pub fn default_asof_timeout(&self) -> Duration {
        Duration::from_millis(self.default_asof_timeout_ms)
    }
}
