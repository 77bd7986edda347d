//! Logging utilities for docpersist.
//!
//! This module provides a standardized approach to logging across the docpersist
//! crates. Components log through the `tracing` macros and attach the caller's
//! correlation id as a `correlation_id` field; this module only installs the
//! subscriber that prints those events.

use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber at INFO level.
///
/// # Examples
///
/// ```
/// use docpersist_common::logging;
///
/// // Initialize with default log level (INFO)
/// logging::init();
///
/// // Initialize with a specific log level
/// logging::init_with_level(tracing::Level::DEBUG);
/// ```
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize the tracing subscriber with a specific log level.
///
/// `RUST_LOG` directives are honoured; the level given here applies to the
/// `docpersist*` targets. Calling this more than once is harmless.
///
/// # Arguments
///
/// * `level` - The minimum log level to display for docpersist crates.
pub fn init_with_level(level: Level) {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("docpersist={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    // try_init: a global default subscriber may already be set (tests, embedding apps)
    let result = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true),
        )
        .with(filter)
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
}

/// Log a result, with different messages for success and error cases.
///
/// # Arguments
///
/// * `result` - The result to log.
/// * `success_message` - The message to log if the result is Ok.
/// * `error_context` - Additional context information to include if the result is Err.
///
/// # Returns
///
/// The original result, allowing this function to be used in a chain.
pub fn log_result<T, E: std::fmt::Display>(
    result: Result<T, E>,
    success_message: &str,
    error_context: &str,
) -> Result<T, E> {
    match &result {
        Ok(_) => info!("{}", success_message),
        Err(e) => error!("{}: {}", error_context, e),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_with_level(Level::DEBUG);
        init();
    }

    #[test]
    fn test_log_result_passes_value_through() {
        let ok: Result<i32, String> = Ok(3);
        assert_eq!(log_result(ok, "done", "failed"), Ok(3));

        let err: Result<i32, String> = Err("boom".to_string());
        assert_eq!(log_result(err, "done", "failed"), Err("boom".to_string()));
    }
}
