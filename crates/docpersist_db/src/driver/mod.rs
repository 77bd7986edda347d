//! Document store driver abstraction
//!
//! The persistence engine never talks to a database directly. It goes through
//! [`DocumentDriver`] for the connection lifecycle and through
//! [`DocumentCollection`] handles for reads and writes. Documents, filters,
//! sort and projection specs are all plain JSON objects ([`Document`]) using
//! MongoDB query syntax, with the primary key stored under `_id`.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod filter;
pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;

pub use memory::MemoryDriver;
#[cfg(feature = "mongodb")]
pub use mongo::MongoDriver;

/// A stored document, a filter, a sort order or a projection
pub type Document = Map<String, Value>;

/// Field holding the primary key of stored documents
pub const ID_FIELD: &str = "_id";

/// Errors reported by a document store driver
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DriverError {
    /// An operation was issued before `connect` or after `disconnect`
    #[error("Not connected to the database")]
    NotConnected,

    /// Connecting to the server failed
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Insert of a document whose `_id` already exists
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Malformed filter, sort or projection
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Any other failure from the backend
    #[error("Database error: {0}")]
    Backend(String),
}

impl DriverError {
    pub fn code(&self) -> &'static str {
        match self {
            DriverError::NotConnected => "NOT_CONNECTED",
            DriverError::Connection(_) => "CONNECTION",
            DriverError::DuplicateKey(_) => "DUPLICATE_KEY",
            DriverError::InvalidQuery(_) => "INVALID_QUERY",
            DriverError::Backend(_) => "BACKEND",
        }
    }
}

/// Settings passed through to the driver on connect
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectSettings {
    pub max_pool_size: u32,
    pub keep_alive: i64,
    pub connect_timeout: Duration,
    pub auto_reconnect: bool,
    pub max_page_size: i64,
    pub debug: bool,
    /// Connect in replica-set (cluster aware) mode
    pub replica_set: bool,
}

/// Cursor options for [`DocumentCollection::find`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    pub sort: Option<Document>,
    pub projection: Option<Document>,
}

/// Connection lifecycle of a document store.
#[async_trait]
pub trait DocumentDriver: Send + Sync {
    /// Connect to the server described by `uri`
    async fn connect(&self, uri: &str, settings: &ConnectSettings) -> Result<(), DriverError>;

    async fn disconnect(&self) -> Result<(), DriverError>;

    /// Whether the connection is ready for use
    fn is_connected(&self) -> bool;

    /// Handle to a named collection.
    ///
    /// Handles can be taken before connecting; their operations fail with
    /// [`DriverError::NotConnected`] until the driver is connected.
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection>;
}

/// Operations on one collection.
///
/// Every operation returning a document returns it as stored after the write
/// (or before it, for removals).
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    fn name(&self) -> &str;

    async fn find(
        &self,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, DriverError>;

    async fn count(&self, filter: &Document) -> Result<u64, DriverError>;

    async fn find_by_id(&self, id: &Value) -> Result<Option<Document>, DriverError>;

    async fn insert(&self, document: Document) -> Result<Document, DriverError>;

    /// Replace the first document matching `filter`. With `upsert`, inserts
    /// `replacement` when nothing matches.
    async fn find_one_and_replace(
        &self,
        filter: &Document,
        replacement: Document,
        upsert: bool,
    ) -> Result<Option<Document>, DriverError>;

    /// Set only the given fields (`$set`) on the document with this id
    async fn find_by_id_and_update(
        &self,
        id: &Value,
        fields: Document,
    ) -> Result<Option<Document>, DriverError>;

    async fn find_by_id_and_remove(&self, id: &Value) -> Result<Option<Document>, DriverError>;

    /// Remove every matching document, returning how many were removed
    async fn remove_many(&self, filter: &Document) -> Result<u64, DriverError>;
}

/// `{ "_id": id }`
pub fn id_filter(id: Value) -> Document {
    let mut filter = Document::new();
    filter.insert(ID_FIELD.to_string(), id);
    filter
}

/// `{ "_id": { "$in": ids } }`
pub fn ids_filter(ids: Vec<Value>) -> Document {
    let mut condition = Document::new();
    condition.insert("$in".to_string(), Value::Array(ids));
    id_filter(Value::Object(condition))
}
