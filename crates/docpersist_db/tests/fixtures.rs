//! Test fixtures for the persistence engine tests
//!
//! This module provides the `Dummy` entity, engine factory functions and a
//! spying driver that records which collection operations were issued.

#![allow(dead_code)]

use async_trait::async_trait;
use docpersist_config::ConfigParams;
use docpersist_db::{
    ConnectSettings, Document, DocumentCollection, DocumentDriver, DriverError, FindOptions,
    Identifiable, MemoryDriver, PersistenceEngine,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Entity stored by the tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dummy {
    pub id: Option<String>,
    pub key: String,
    #[serde(default)]
    pub content: String,
}

impl Identifiable<String> for Dummy {
    fn id(&self) -> Option<&String> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

pub fn dummy(key: &str, content: &str) -> Dummy {
    Dummy {
        id: None,
        key: key.to_string(),
        content: content.to_string(),
    }
}

/// Turns a `json!` object into a document
pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

pub fn local_config() -> ConfigParams {
    ConfigParams::from_tuples([
        ("collection", "dummies"),
        ("connection.host", "localhost"),
        ("connection.port", "27017"),
        ("connection.database", "test"),
    ])
}

/// An opened engine over a fresh in-memory store
pub async fn open_engine(driver: Arc<dyn DocumentDriver>) -> PersistenceEngine<Dummy, String> {
    let engine = PersistenceEngine::<Dummy, String>::builder("dummies", driver)
        .configure(local_config())
        .build()
        .expect("engine builds");
    engine.open(Some("test")).await.expect("engine opens");
    engine.clear(Some("test")).await.expect("collection clears");
    engine
}

pub async fn open_memory_engine() -> PersistenceEngine<Dummy, String> {
    open_engine(Arc::new(MemoryDriver::new())).await
}

/// Driver wrapper recording the operations issued on its collections
#[derive(Clone, Default)]
pub struct SpyDriver {
    inner: MemoryDriver,
    calls: Arc<Mutex<Vec<&'static str>>>,
    fail_count: Arc<AtomicBool>,
}

impl SpyDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations issued so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn count_calls(&self) -> usize {
        self.calls().iter().filter(|call| **call == "count").count()
    }

    pub fn reset(&self) {
        self.calls.lock().clear();
    }

    /// Make every following `count` fail
    pub fn fail_count(&self, fail: bool) {
        self.fail_count.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentDriver for SpyDriver {
    async fn connect(&self, uri: &str, settings: &ConnectSettings) -> Result<(), DriverError> {
        self.inner.connect(uri, settings).await
    }

    async fn disconnect(&self) -> Result<(), DriverError> {
        self.inner.disconnect().await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        Arc::new(SpyCollection {
            inner: self.inner.collection(name),
            calls: Arc::clone(&self.calls),
            fail_count: Arc::clone(&self.fail_count),
        })
    }
}

struct SpyCollection {
    inner: Arc<dyn DocumentCollection>,
    calls: Arc<Mutex<Vec<&'static str>>>,
    fail_count: Arc<AtomicBool>,
}

impl SpyCollection {
    fn record(&self, call: &'static str) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl DocumentCollection for SpyCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find(
        &self,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, DriverError> {
        self.record("find");
        self.inner.find(filter, options).await
    }

    async fn count(&self, filter: &Document) -> Result<u64, DriverError> {
        self.record("count");
        if self.fail_count.load(Ordering::SeqCst) {
            return Err(DriverError::Backend("count refused".to_string()));
        }
        self.inner.count(filter).await
    }

    async fn find_by_id(&self, id: &Value) -> Result<Option<Document>, DriverError> {
        self.record("find_by_id");
        self.inner.find_by_id(id).await
    }

    async fn insert(&self, document: Document) -> Result<Document, DriverError> {
        self.record("insert");
        self.inner.insert(document).await
    }

    async fn find_one_and_replace(
        &self,
        filter: &Document,
        replacement: Document,
        upsert: bool,
    ) -> Result<Option<Document>, DriverError> {
        self.record("find_one_and_replace");
        self.inner
            .find_one_and_replace(filter, replacement, upsert)
            .await
    }

    async fn find_by_id_and_update(
        &self,
        id: &Value,
        fields: Document,
    ) -> Result<Option<Document>, DriverError> {
        self.record("find_by_id_and_update");
        self.inner.find_by_id_and_update(id, fields).await
    }

    async fn find_by_id_and_remove(&self, id: &Value) -> Result<Option<Document>, DriverError> {
        self.record("find_by_id_and_remove");
        self.inner.find_by_id_and_remove(id).await
    }

    async fn remove_many(&self, filter: &Document) -> Result<u64, DriverError> {
        self.record("remove_many");
        self.inner.remove_many(filter).await
    }
}
