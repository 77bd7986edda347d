// --- File: crates/docpersist_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// Errors raised by the external services docpersist depends on.
///
/// Discovery services, credential stores and configuration readers report
/// their failures through this type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Missing or invalid configuration for a service
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ServiceError {
    /// Stable code for the error category
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::ConfigError(_) => "CONFIG_ERROR",
        }
    }
}

impl From<docpersist_config::ConfigParamsError> for ServiceError {
    fn from(err: docpersist_config::ConfigParamsError) -> Self {
        ServiceError::ConfigError(err.to_string())
    }
}

// Utility functions for error handling
pub fn config_error<T: fmt::Display>(message: T) -> ServiceError {
    ServiceError::ConfigError(message.to_string())
}
