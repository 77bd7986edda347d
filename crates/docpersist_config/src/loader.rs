//! Loading [`ConfigParams`] from files and the environment

use crate::error::ConfigParamsError;
use crate::params::ConfigParams;
use config::{Config, Environment, File};
use once_cell::sync::OnceCell;
use std::env;
use std::path::Path;
use tracing::debug;

static INIT_DOTENV: OnceCell<()> = OnceCell::new();

/// Ensures that the dotenv file is loaded into the environment variables.
///
/// The file name comes from `DOTENV_OVERRIDE` and defaults to `.env`. Loading
/// happens at most once per process; a missing file is not an error.
///
/// # Returns
///
/// The path of the dotenv file that was (or would have been) loaded
pub fn ensure_dotenv_loaded() -> String {
    let dotenv_path = env::var("DOTENV_OVERRIDE").unwrap_or_else(|_| ".env".to_string());

    INIT_DOTENV.get_or_init(|| {
        dotenv::from_filename(&dotenv_path).ok();
    });

    dotenv_path
}

/// Load configuration using the process environment.
///
/// * `CONFIG_DIR` - directory holding `default.*` and `{RUN_ENV}.*` files (default `config`)
/// * `RUN_ENV` - environment specific file name (default `debug`)
/// * `PREFIX` - environment variable prefix (default `DOCPERSIST`)
///
/// # Errors
///
/// Returns an error if a present config file cannot be parsed
pub fn load_config() -> Result<ConfigParams, ConfigParamsError> {
    ensure_dotenv_loaded();

    let config_dir = env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());
    let prefix = env::var("PREFIX").unwrap_or_else(|_| "DOCPERSIST".to_string());

    load_config_from(Path::new(&config_dir), &run_env, &prefix)
}

/// Load configuration from `dir/default.*`, `dir/{run_env}.*` and
/// `{prefix}_SECTION__KEY` environment variables, later sources winning.
///
/// Both files are optional.
///
/// # Errors
///
/// Returns an error if a present config file cannot be parsed
pub fn load_config_from(
    dir: &Path,
    run_env: &str,
    prefix: &str,
) -> Result<ConfigParams, ConfigParamsError> {
    let default_path = dir.join("default");
    let env_path = dir.join(run_env);

    debug!("Loading configuration from {}", dir.display());

    let builder = Config::builder()
        .add_source(File::with_name(&default_path.to_string_lossy()).required(false))
        .add_source(File::with_name(&env_path.to_string_lossy()).required(false))
        .add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("_")
                .separator("__"),
        );

    let value: serde_json::Value = builder.build()?.try_deserialize()?;
    let params = ConfigParams::from_value(&value);

    debug!("Loaded {} configuration keys", params.len());
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_from_environment_only() {
        env::set_var("DPLOADTEST_CONNECTION__HOST", "envhost");
        env::set_var("DPLOADTEST_CONNECTION__PORT", "27019");

        let config = load_config_from(
            Path::new("does-not-exist"),
            "debug",
            "DPLOADTEST",
        )
        .unwrap();

        let connection = config.get_section("connection");
        assert_eq!(connection.get("host"), Some("envhost"));
        assert_eq!(connection.get_as_integer_with_default("port", 0), 27019);

        env::remove_var("DPLOADTEST_CONNECTION__HOST");
        env::remove_var("DPLOADTEST_CONNECTION__PORT");
    }

    #[test]
    fn test_ensure_dotenv_loaded_defaults_path() {
        if env::var("DOTENV_OVERRIDE").is_err() {
            assert_eq!(ensure_dotenv_loaded(), ".env");
        }
    }
}
