//! Error types for configuration loading

use thiserror::Error;

/// Errors that can occur while loading or parsing configuration
#[derive(Debug, Error)]
pub enum ConfigParamsError {
    /// Error from the underlying `config` sources (files, environment)
    #[error("Configuration load error: {0}")]
    Load(#[from] config::ConfigError),

    /// A `key=value;...` string could not be parsed
    #[error("Configuration parse error: {0}")]
    Parse(String),
}
