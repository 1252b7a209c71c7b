//! Configuration module for adaq-rs
//!
//! One TOML file configures the decoder, the reader pipeline and the
//! emulator. Every section and every field has a default, so an empty
//! file is a valid configuration.
//!
//! # Example
//! ```ignore
//! let config = Config::load("config.toml")?;
//! let decoder = ZleDecoder::new(config.decoder.clone());
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::data_source_emulator::EmulatorConfig;
use crate::reader::decoder::zle::constants::HEADER_SIZE_WORDS;
use crate::reader::{ReaderConfig, ZleConfig};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub decoder: ZleConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub emulator: EmulatorConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load the file if it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            info!(path = %path.display(), "Loading configuration");
            Self::load(path)
        } else {
            info!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string and validate it
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decoder.num_channels == 0 {
            return Err(ConfigError::Invalid(
                "decoder.num_channels must be at least 1".into(),
            ));
        }
        if (self.decoder.max_event_words as usize) <= HEADER_SIZE_WORDS {
            return Err(ConfigError::Invalid(format!(
                "decoder.max_event_words must exceed the {}-word header",
                HEADER_SIZE_WORDS
            )));
        }
        self.reader
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.emulator
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let emulated = self.emulator.max_event_words();
        if emulated > u64::from(self.decoder.max_event_words) {
            return Err(ConfigError::Invalid(format!(
                "emulator events can reach {} words, above decoder.max_event_words = {}",
                emulated, self.decoder.max_event_words
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::decoder::{BoundaryPolicy, ChannelSelection, ReservedTagPolicy};

    const SAMPLE_CONFIG: &str = r#"
[decoder]
num_channels = 4
max_event_words = 50000
channel_selection = "header"
reserved_tag = "reject"
boundary_check = "reject"

[reader]
read_timeout_ms = 250
buffer_size = 65536

[emulator]
num_channels = 4
window_samples = 1024
threshold = 300
seed = 12345
"#;

    #[test]
    fn test_parse_config() {
        let config = Config::from_toml(SAMPLE_CONFIG).unwrap();

        assert_eq!(config.decoder.num_channels, 4);
        assert_eq!(config.decoder.max_event_words, 50_000);
        assert_eq!(config.decoder.channel_selection, ChannelSelection::Header);
        assert_eq!(config.decoder.reserved_tag, ReservedTagPolicy::Reject);
        assert_eq!(config.decoder.boundary_check, BoundaryPolicy::Reject);

        assert_eq!(config.reader.read_timeout_ms, 250);
        assert_eq!(config.reader.buffer_size, 65536);
        // Unset fields keep their defaults
        assert_eq!(config.reader.events_per_read, 64);

        assert_eq!(config.emulator.window_samples, 1024);
        assert_eq!(config.emulator.threshold, 300);
        assert_eq!(config.emulator.seed, Some(12345));
        assert_eq!(config.emulator.baseline, 200);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.decoder.boundary_check, BoundaryPolicy::Warn);
        assert_eq!(config.decoder.reserved_tag, ReservedTagPolicy::Data);
    }

    #[test]
    fn test_invalid_policy_name() {
        let result = Config::from_toml("[decoder]\nboundary_check = \"maybe\"\n");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_validate_rejects_zero_channels() {
        let result = Config::from_toml("[decoder]\nnum_channels = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_tiny_sanity_bound() {
        let result = Config::from_toml("[decoder]\nmax_event_words = 4\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_odd_emulator_window() {
        let result = Config::from_toml("[emulator]\nwindow_samples = 101\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_emulator_events_above_sanity_bound() {
        let result = Config::from_toml(
            "[emulator]\nnum_channels = 1\nwindow_samples = 200000\nthreshold = 0\n",
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        // Raising the decoder bound makes the same emulator acceptable
        let config = Config::from_toml(
            "[decoder]\nmax_event_words = 200000\n\n[emulator]\nnum_channels = 1\nwindow_samples = 200000\nthreshold = 0\n",
        )
        .unwrap();
        assert!(config.emulator.max_event_words() <= u64::from(config.decoder.max_event_words));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/adaq.toml"),
            Err(ConfigError::IoError(_))
        ));
        assert_eq!(
            Config::load_or_default("/nonexistent/adaq.toml").unwrap(),
            Config::default()
        );
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = Config::from_toml(SAMPLE_CONFIG).unwrap();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }
}
