//! Error types for configuration operations.

use std::path::PathBuf;

use sdrflow_core::ControlKind;
use thiserror::Error;

/// Errors that can occur while loading configuration or parsing control
/// updates.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Control name absent from the schema
    #[error("unknown parameter {0}")]
    UnknownParameter(String),

    /// Query segment that is not exactly `name=value`
    #[error("malformed parameter pair '{0}'")]
    MalformedPair(String),

    /// Value that does not parse as the parameter's kind
    #[error("invalid value '{value}' for {kind} parameter '{name}'")]
    InvalidValue {
        /// Parameter name.
        name: String,
        /// Declared kind.
        kind: ControlKind,
        /// Raw text that failed to parse.
        value: String,
    },

    /// Range with `min > max`
    #[error("control '{name}' has min {min} above max {max}")]
    InvalidRange {
        /// Control name.
        name: String,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// Range declared on a bool or text control
    #[error("control '{name}' of kind {kind} cannot have a range")]
    RangeOnNonNumeric {
        /// Control name.
        name: String,
        /// Declared kind.
        kind: ControlKind,
    },

    /// Engine queue capacity of zero
    #[error("engine queue_capacity must be greater than zero")]
    ZeroCapacity,
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a create directory error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(name: &str, kind: ControlKind, value: &str) -> Self {
        ConfigError::InvalidValue {
            name: name.to_string(),
            kind,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn mock_io_err() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, "mock")
    }

    // --- factory methods ---

    #[test]
    fn read_file_factory_produces_correct_variant() {
        let err = ConfigError::read_file("/some/path", mock_io_err());
        assert!(
            matches!(err, ConfigError::ReadFile { ref path, .. } if path == std::path::Path::new("/some/path"))
        );
    }

    #[test]
    fn create_dir_factory_produces_correct_variant() {
        let err = ConfigError::create_dir("/dir/path", mock_io_err());
        assert!(
            matches!(err, ConfigError::CreateDir { ref path, .. } if path == std::path::Path::new("/dir/path"))
        );
    }

    // --- Display formatting ---

    #[test]
    fn write_file_display() {
        let err = ConfigError::write_file("/a/flow.toml", mock_io_err());
        let msg = err.to_string();
        assert!(msg.contains("failed to write file"), "got: {msg}");
        assert!(msg.contains("/a/flow.toml"), "got: {msg}");
    }

    #[test]
    fn unknown_parameter_display() {
        let err = ConfigError::UnknownParameter("volume".to_string());
        assert_eq!(err.to_string(), "unknown parameter volume");
    }

    #[test]
    fn invalid_value_display() {
        let err = ConfigError::invalid_value("mono", ControlKind::Bool, "yes");
        assert_eq!(
            err.to_string(),
            "invalid value 'yes' for bool parameter 'mono'"
        );
    }

    #[test]
    fn invalid_range_display() {
        let err = ConfigError::InvalidRange {
            name: "bw".to_string(),
            min: 10.0,
            max: 1.0,
        };
        assert_eq!(err.to_string(), "control 'bw' has min 10 above max 1");
    }

    // --- Error::source() chain ---

    #[test]
    fn io_variants_expose_source() {
        assert!(ConfigError::read_file("/x", mock_io_err()).source().is_some());
        assert!(ConfigError::write_file("/x", mock_io_err()).source().is_some());
    }

    #[test]
    fn parse_variants_have_no_source() {
        assert!(ConfigError::MalformedPair("x".into()).source().is_none());
        assert!(ConfigError::ZeroCapacity.source().is_none());
    }
}
