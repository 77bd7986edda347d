//! Configuration for docpersist components
//!
//! Components are configured through [`ConfigParams`], a flat, insertion-ordered
//! map of dotted keys (`connection.host`, `options.max_page_size`, ...) to string
//! values. Values are converted on read through the typed getters, so the same
//! map can come from code, from a config file or from environment variables.
//!
//! # Example
//!
//! ```rust
//! use docpersist_config::ConfigParams;
//!
//! let config = ConfigParams::from_tuples([
//!     ("collection", "dummies"),
//!     ("connection.host", "localhost"),
//!     ("connection.port", "27017"),
//! ]);
//!
//! let connection = config.get_section("connection");
//! assert_eq!(connection.get_as_integer_with_default("port", 0), 27017);
//! ```

pub mod error;
pub mod loader;
pub mod params;

pub use error::ConfigParamsError;
pub use loader::{ensure_dotenv_loaded, load_config, load_config_from};
pub use params::ConfigParams;
