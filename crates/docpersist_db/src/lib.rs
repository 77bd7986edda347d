//! Document database persistence for docpersist
//!
//! This crate provides a generic persistence layer over a document database.
//! It is database agnostic: all storage work goes through the
//! [`DocumentDriver`] and [`DocumentCollection`] traits, with an in-process
//! [`MemoryDriver`] always available and a MongoDB driver behind a feature flag.
//!
//! # Features
//!
//! - Connection resolution from configuration, discovery and credential stores
//! - `mongodb://` URI composition for single nodes and replica sets
//! - A persistence engine with lifecycle, paging and keyed CRUD operations
//! - Pluggable conversion between stored documents and public entities
//!
//! # Usage
//!
//! Add the crate to your dependencies:
//!
//! ```toml
//! [dependencies]
//! docpersist-db = { version = "0.1.0" }
//! ```
//!
//! To talk to a real MongoDB server:
//!
//! ```toml
//! [dependencies]
//! docpersist-db = { version = "0.1.0", features = ["mongodb"] }
//! ```
//!
//! See [`engine`] for a complete example.

pub mod converter;
pub mod driver;
pub mod engine;
pub mod entity;
pub mod error;
pub mod options;
pub mod paging;
pub mod repository;
pub mod resolver;

// Re-export the engine, its building blocks and the drivers for ease of use
pub use converter::{DocumentConverter, JsonConverter};
pub use driver::{
    ConnectSettings, Document, DocumentCollection, DocumentDriver, DriverError, FindOptions,
    MemoryDriver,
};
#[cfg(feature = "mongodb")]
pub use driver::MongoDriver;
pub use engine::{EngineState, PersistenceEngine, PersistenceEngineBuilder};
pub use entity::{EntityKey, Identifiable};
pub use error::PersistenceError;
pub use options::PersistenceOptions;
pub use paging::{DataPage, PagingParams};
pub use repository::Repository;
pub use resolver::{compose_uri, ConnectionResolver};
