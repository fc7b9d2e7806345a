//! Shared CLI helpers used across multiple commands.

use std::path::Path;

use sdrflow_config::FlowConfig;
use tracing_subscriber::EnvFilter;

/// Parse a `key=value` string for clap's `value_parser`.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("Invalid parameter format: '{s}' (expected key=value)"))
}

/// Loads the flow config at `path`, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<FlowConfig> {
    match path {
        Some(path) => Ok(FlowConfig::load(path)?),
        None => Ok(FlowConfig::default()),
    }
}

/// Installs the global subscriber on stderr.
///
/// A config `log_filter` wins over `RUST_LOG`; the fallback is `info`.
pub fn init_tracing(config: &FlowConfig) {
    let filter = match &config.engine.log_filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
