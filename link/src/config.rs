//! TOML configuration for the engine.
//!
//! ```toml
//! [engine]
//! page_size = 500
//! streaming_updates = true
//!
//! [timeouts]
//! wait_threshold_ms = 250
//! ```
//!
//! Both tables and every key are optional.

use serde::Deserialize;
use std::path::Path;

use crate::error::{Result, ShellLinkError};
use crate::models::EngineOptions;
use crate::timeouts::EngineTimeouts;

/// Complete engine configuration: options plus timings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub options: EngineOptions,
    pub timeouts: EngineTimeouts,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    engine: EngineOptions,
    #[serde(default)]
    timeouts: RawTimeouts,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTimeouts {
    wait_threshold_ms: Option<u64>,
}

impl EngineConfig {
    pub fn new(options: EngineOptions, timeouts: EngineTimeouts) -> Self {
        Self { options, timeouts }
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text)
            .map_err(|e| ShellLinkError::ConfigurationError(e.to_string()))?;

        if raw.engine.page_size == 0 {
            return Err(ShellLinkError::ConfigurationError(
                "engine.page_size must be at least 1".to_string(),
            ));
        }
        if raw.engine.command_channel_capacity == 0 {
            return Err(ShellLinkError::ConfigurationError(
                "engine.command_channel_capacity must be at least 1".to_string(),
            ));
        }

        let mut timeouts = EngineTimeouts::builder();
        if let Some(ms) = raw.timeouts.wait_threshold_ms {
            timeouts = timeouts.wait_threshold_ms(ms);
        }

        Ok(Self {
            options: raw.engine,
            timeouts: timeouts.build(),
        })
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ShellLinkError::ConfigurationError(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&text)
    }
}
