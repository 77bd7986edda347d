//! Error types for the persistence layer

use crate::driver::DriverError;
use docpersist_common::ServiceError;
use thiserror::Error;

/// Errors that can occur when resolving connections or working with a collection
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// No connection descriptor was configured
    #[error("Database connection is not set")]
    NoConnection,

    /// A connection descriptor without `uri` has no host
    #[error("Connection host is not set")]
    NoHost,

    /// A connection descriptor without `uri` has no (or a zero) port
    #[error("Connection port is not set")]
    NoPort,

    /// A connection descriptor without `uri` has no database
    #[error("Connection database is not set")]
    NoDatabase,

    /// A discovery or store key was given but nothing can resolve it
    #[error("Cannot resolve {0}")]
    CannotResolve(String),

    /// The discovery service or credential store failed
    #[error("Service lookup failed: {0}")]
    Service(#[from] ServiceError),

    /// The driver failed to connect
    #[error("Connection to the database failed: {source}")]
    ConnectFailed {
        #[source]
        source: DriverError,
    },

    /// The driver failed to disconnect
    #[error("Disconnect from the database failed: {source}")]
    DisconnectFailed {
        #[source]
        source: DriverError,
    },

    /// Removing all documents of the bound collection failed
    #[error("Clearing collection {collection} failed: {source}")]
    ClearFailed {
        collection: String,
        #[source]
        source: DriverError,
    },

    /// No collection handle is bound to the engine
    #[error("Collection is not defined")]
    CollectionNotDefined,

    /// An engine was built without a collection name
    #[error("Collection name is required")]
    CollectionRequired,

    /// A document could not be converted to or from the public shape
    #[error("Document conversion failed: {0}")]
    Conversion(String),

    /// Any other driver failure, passed through unchanged
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl PersistenceError {
    /// Stable code identifying the error
    pub fn code(&self) -> &'static str {
        match self {
            PersistenceError::NoConnection => "NO_CONNECTION",
            PersistenceError::NoHost => "NO_HOST",
            PersistenceError::NoPort => "NO_PORT",
            PersistenceError::NoDatabase => "NO_DATABASE",
            PersistenceError::CannotResolve(_) => "CANNOT_RESOLVE",
            PersistenceError::Service(e) => e.code(),
            PersistenceError::ConnectFailed { .. } => "CONNECT_FAILED",
            PersistenceError::DisconnectFailed { .. } => "DISCONNECT_FAILED",
            PersistenceError::ClearFailed { .. } => "CLEAR_FAILED",
            PersistenceError::CollectionNotDefined => "COLLECTION_NOT_DEFINED",
            PersistenceError::CollectionRequired => "COLLECTION_REQUIRED",
            PersistenceError::Conversion(_) => "CONVERSION_FAILED",
            PersistenceError::Driver(e) => e.code(),
        }
    }

    /// Whether this is a connection configuration problem
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PersistenceError::NoConnection
                | PersistenceError::NoHost
                | PersistenceError::NoPort
                | PersistenceError::NoDatabase
                | PersistenceError::CannotResolve(_)
        )
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Conversion(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_connection_errors_keep_their_cause() {
        let err = PersistenceError::ConnectFailed {
            source: DriverError::Connection("refused".to_string()),
        };
        assert_eq!(err.code(), "CONNECT_FAILED");
        assert!(err.to_string().contains("refused"));
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("Database connection error: refused".to_string())
        );
    }

    #[test]
    fn test_codes() {
        assert_eq!(PersistenceError::NoHost.code(), "NO_HOST");
        assert!(PersistenceError::NoPort.is_config_error());
        assert!(!PersistenceError::CollectionNotDefined.is_config_error());
        assert_eq!(
            PersistenceError::from(DriverError::NotConnected).code(),
            "NOT_CONNECTED"
        );
    }
}
