//! Engine options read from configuration

use crate::driver::ConnectSettings;
use docpersist_config::ConfigParams;
use std::time::Duration;

const DEFAULT_MAX_POOL_SIZE: u32 = 2;
const DEFAULT_KEEP_ALIVE: i64 = 1;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_MAX_PAGE_SIZE: i64 = 100;

/// Recognised engine settings.
///
/// | key | default |
/// |---|---|
/// | `collection` | none |
/// | `options.max_pool_size` | 2 |
/// | `options.keep_alive` | 1 |
/// | `options.connect_timeout` | 5000 (ms) |
/// | `options.auto_reconnect` | true |
/// | `options.max_page_size` | 100 |
/// | `options.debug` | true |
/// | `options.replica_set` | false |
#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceOptions {
    pub collection: Option<String>,
    pub max_pool_size: u32,
    pub keep_alive: i64,
    pub connect_timeout: Duration,
    pub auto_reconnect: bool,
    pub max_page_size: i64,
    pub debug: bool,
    pub replica_set: bool,
}

impl Default for PersistenceOptions {
    fn default() -> Self {
        Self::from_config(&ConfigParams::new())
    }
}

impl PersistenceOptions {
    /// The defaults as configuration parameters
    pub fn default_config() -> ConfigParams {
        ConfigParams::from_tuples([
            ("options.max_pool_size", DEFAULT_MAX_POOL_SIZE.to_string()),
            ("options.keep_alive", DEFAULT_KEEP_ALIVE.to_string()),
            (
                "options.connect_timeout",
                DEFAULT_CONNECT_TIMEOUT_MS.to_string(),
            ),
            ("options.auto_reconnect", "true".to_string()),
            ("options.max_page_size", DEFAULT_MAX_PAGE_SIZE.to_string()),
            ("options.debug", "true".to_string()),
            ("options.replica_set", "false".to_string()),
        ])
    }

    /// Read options from configuration, falling back to the defaults
    pub fn from_config(config: &ConfigParams) -> Self {
        let config = config.set_defaults(&Self::default_config());

        let max_pool_size = config
            .get_as_nullable_integer("options.max_pool_size")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let connect_timeout = config
            .get_as_nullable_integer("options.connect_timeout")
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS);

        Self {
            collection: config.get_as_nullable_string("collection"),
            max_pool_size,
            keep_alive: config.get_as_integer_with_default("options.keep_alive", DEFAULT_KEEP_ALIVE),
            connect_timeout: Duration::from_millis(connect_timeout),
            auto_reconnect: config.get_as_boolean_with_default("options.auto_reconnect", true),
            max_page_size: config
                .get_as_integer_with_default("options.max_page_size", DEFAULT_MAX_PAGE_SIZE),
            debug: config.get_as_boolean_with_default("options.debug", true),
            replica_set: config.get_as_boolean_with_default("options.replica_set", false),
        }
    }

    /// Settings handed to the driver on connect
    pub fn connect_settings(&self, replica_set: bool) -> ConnectSettings {
        ConnectSettings {
            max_pool_size: self.max_pool_size,
            keep_alive: self.keep_alive,
            connect_timeout: self.connect_timeout,
            auto_reconnect: self.auto_reconnect,
            max_page_size: self.max_page_size,
            debug: self.debug,
            replica_set,
        }
    }
}
