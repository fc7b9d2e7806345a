//! Flow configuration file format and operations.

use std::path::Path;
use std::time::Duration;

use sdrflow_core::{DEFAULT_DATA_WAIT, DEFAULT_QUEUE_CAPACITY, GraphOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::schema::ControlSchema;

/// Engine section of a flow configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of queues created without an explicit one.
    pub queue_capacity: usize,

    /// Inbound-queue wait per cycle, in milliseconds.
    pub data_wait_ms: u64,

    /// Prefix of subgraph thread names.
    pub thread_name_prefix: String,

    /// `tracing` filter directive overriding `RUST_LOG`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            data_wait_ms: DEFAULT_DATA_WAIT.as_millis() as u64,
            thread_name_prefix: "sdrflow".to_string(),
            log_filter: None,
        }
    }
}

impl EngineConfig {
    /// Converts to the engine's options.
    pub fn graph_options(&self) -> GraphOptions {
        GraphOptions {
            default_queue_capacity: self.queue_capacity,
            data_wait: Duration::from_millis(self.data_wait_ms),
            thread_name_prefix: self.thread_name_prefix.clone(),
        }
    }
}

/// A complete flow configuration.
///
/// # TOML Format
///
/// ```toml
/// [engine]
/// queue_capacity = 64
/// data_wait_ms = 5
/// thread_name_prefix = "radio"
/// log_filter = "sdrflow_core=debug"
///
/// [controls.freq]
/// kind = "double"
///
/// [controls.gain]
/// kind = "double"
/// min = 0.0
/// max = 4.0
/// ```
///
/// A missing `[controls]` table means the radio tuner defaults
/// ([`ControlSchema::radio_defaults`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Engine options.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Accepted controls.
    #[serde(default = "ControlSchema::radio_defaults")]
    pub controls: ControlSchema,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            controls: ControlSchema::radio_defaults(),
        }
    }
}

impl FlowConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), controls = config.controls.len(), "loaded flow config");
        Ok(config)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: FlowConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
            }
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks engine options and control ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        self.controls.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdrflow_core::ControlKind;

    #[test]
    fn empty_document_uses_defaults() {
        let config = FlowConfig::from_toml("").unwrap();
        assert_eq!(config, FlowConfig::default());
        assert_eq!(config.engine.queue_capacity, 100);
        assert_eq!(config.engine.data_wait_ms, 10);
        assert_eq!(config.controls, ControlSchema::radio_defaults());
    }

    #[test]
    fn partial_engine_section_keeps_other_defaults() {
        let config = FlowConfig::from_toml("[engine]\nqueue_capacity = 8\n").unwrap();
        assert_eq!(config.engine.queue_capacity, 8);
        assert_eq!(config.engine.thread_name_prefix, "sdrflow");
        assert!(config.engine.log_filter.is_none());
    }

    #[test]
    fn explicit_controls_replace_defaults() {
        let config = FlowConfig::from_toml(
            r#"
            [controls.gain]
            kind = "double"
            min = 0.0
            max = 4.0
            "#,
        )
        .unwrap();
        assert_eq!(config.controls.len(), 1);
        let spec = config.controls.get("gain").unwrap();
        assert_eq!(spec.kind, ControlKind::Double);
        assert_eq!(spec.max, Some(4.0));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = FlowConfig::from_toml("[engine]\nqueue_capacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroCapacity));
    }

    #[test]
    fn unknown_kind_is_a_parse_error() {
        let err = FlowConfig::from_toml("[controls.x]\nkind = \"complex\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn graph_options_conversion() {
        let engine = EngineConfig {
            queue_capacity: 32,
            data_wait_ms: 25,
            thread_name_prefix: "radio".into(),
            log_filter: None,
        };
        let options = engine.graph_options();
        assert_eq!(options.default_queue_capacity, 32);
        assert_eq!(options.data_wait, Duration::from_millis(25));
        assert_eq!(options.thread_name_prefix, "radio");
    }

    #[test]
    fn toml_round_trip() {
        let mut config = FlowConfig::default();
        config.engine.log_filter = Some("debug".into());
        let text = config.to_toml().unwrap();
        assert!(text.contains("[controls.freq]"), "{text}");
        assert_eq!(FlowConfig::from_toml(&text).unwrap(), config);
    }
}
