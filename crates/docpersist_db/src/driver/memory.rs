//! In-process document store
//!
//! [`MemoryDriver`] behaves like a small document server: collections survive
//! disconnects and reconnects of the same driver, documents keep insertion
//! order, and every operation fails with [`DriverError::NotConnected`] while
//! the driver is disconnected.

use super::filter::{matches, project, set_path, sort_documents};
use super::{
    ConnectSettings, Document, DocumentCollection, DocumentDriver, DriverError, FindOptions,
    ID_FIELD,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

const URI_SCHEME: &str = "mongodb://";

#[derive(Debug, Default)]
struct MemoryState {
    connected: AtomicBool,
    settings: RwLock<Option<ConnectSettings>>,
    uri: RwLock<Option<String>>,
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryState {
    fn ensure_connected(&self) -> Result<(), DriverError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DriverError::NotConnected)
        }
    }
}

/// Document store driver keeping all data in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    state: Arc<MemoryState>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// URI of the current (or last) connection
    pub fn connected_uri(&self) -> Option<String> {
        self.state.uri.read().clone()
    }

    /// Settings of the current (or last) connection
    pub fn connect_settings(&self) -> Option<ConnectSettings> {
        self.state.settings.read().clone()
    }
}

#[async_trait]
impl DocumentDriver for MemoryDriver {
    async fn connect(&self, uri: &str, settings: &ConnectSettings) -> Result<(), DriverError> {
        if !uri.starts_with(URI_SCHEME) {
            return Err(DriverError::Connection(format!(
                "unsupported connection scheme in '{}'",
                uri
            )));
        }

        *self.state.uri.write() = Some(uri.to_string());
        *self.state.settings.write() = Some(settings.clone());
        self.state.connected.store(true, Ordering::SeqCst);

        debug!(replica_set = settings.replica_set, "Memory store connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DriverError> {
        self.state.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        Arc::new(MemoryCollection {
            name: name.to_string(),
            state: Arc::clone(&self.state),
        })
    }
}

/// Handle to one collection of a [`MemoryDriver`]
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    name: String,
    state: Arc<MemoryState>,
}

impl MemoryCollection {
    fn with_documents<R>(&self, f: impl FnOnce(&mut Vec<Document>) -> R) -> Result<R, DriverError> {
        self.state.ensure_connected()?;
        let mut collections = self.state.collections.write();
        let documents = collections.entry(self.name.clone()).or_default();
        Ok(f(documents))
    }

    fn read_documents<R>(&self, f: impl FnOnce(&[Document]) -> R) -> Result<R, DriverError> {
        self.state.ensure_connected()?;
        let collections = self.state.collections.read();
        let documents = collections
            .get(&self.name)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(f(documents))
    }
}

fn position_of(documents: &[Document], id: &Value) -> Option<usize> {
    documents
        .iter()
        .position(|d| d.get(ID_FIELD).is_some_and(|v| v == id))
}

fn first_match(documents: &[Document], filter: &Document) -> Result<Option<usize>, DriverError> {
    for (index, document) in documents.iter().enumerate() {
        if matches(document, filter)? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(
        &self,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, DriverError> {
        let mut found = self.read_documents(|documents| {
            let mut found = Vec::new();
            for document in documents {
                if matches(document, filter)? {
                    found.push(document.clone());
                }
            }
            Ok::<_, DriverError>(found)
        })??;

        if let Some(sort) = &options.sort {
            sort_documents(&mut found, sort)?;
        }

        let skip = options.skip.unwrap_or(0) as usize;
        let found = found.into_iter().skip(skip);
        // A limit of 0 means "no limit", a negative one is taken as its absolute value
        let found: Vec<Document> = match options.limit {
            Some(limit) if limit != 0 => found.take(limit.unsigned_abs() as usize).collect(),
            _ => found.collect(),
        };

        match &options.projection {
            Some(projection) => found.into_iter().map(|d| project(d, projection)).collect(),
            None => Ok(found),
        }
    }

    async fn count(&self, filter: &Document) -> Result<u64, DriverError> {
        self.read_documents(|documents| {
            let mut count = 0u64;
            for document in documents {
                if matches(document, filter)? {
                    count += 1;
                }
            }
            Ok::<_, DriverError>(count)
        })?
    }

    async fn find_by_id(&self, id: &Value) -> Result<Option<Document>, DriverError> {
        self.read_documents(|documents| position_of(documents, id).map(|i| documents[i].clone()))
    }

    async fn insert(&self, mut document: Document) -> Result<Document, DriverError> {
        if !document.contains_key(ID_FIELD) {
            document.insert(
                ID_FIELD.to_string(),
                Value::String(uuid::Uuid::new_v4().simple().to_string()),
            );
        }

        self.with_documents(|documents| {
            let id = document.get(ID_FIELD).cloned().unwrap_or(Value::Null);
            if position_of(documents, &id).is_some() {
                return Err(DriverError::DuplicateKey(format!(
                    "{} already contains _id {}",
                    self.name, id
                )));
            }
            documents.push(document.clone());
            Ok::<_, DriverError>(document)
        })?
    }

    async fn find_one_and_replace(
        &self,
        filter: &Document,
        mut replacement: Document,
        upsert: bool,
    ) -> Result<Option<Document>, DriverError> {
        self.with_documents(|documents| -> Result<Option<Document>, DriverError> {
            let Some(index) = first_match(documents, filter)? else {
                if !upsert {
                    return Ok(None);
                }
                if !replacement.contains_key(ID_FIELD) {
                    let id = filter
                        .get(ID_FIELD)
                        .filter(|v| !v.is_object())
                        .cloned()
                        .unwrap_or_else(|| Value::String(uuid::Uuid::new_v4().simple().to_string()));
                    replacement.insert(ID_FIELD.to_string(), id);
                }
                documents.push(replacement.clone());
                return Ok(Some(replacement));
            };

            let id = documents[index].get(ID_FIELD).cloned().unwrap_or(Value::Null);
            replacement.insert(ID_FIELD.to_string(), id);
            documents[index] = replacement.clone();
            Ok(Some(replacement))
        })?
    }

    async fn find_by_id_and_update(
        &self,
        id: &Value,
        fields: Document,
    ) -> Result<Option<Document>, DriverError> {
        self.with_documents(|documents| {
            position_of(documents, id).map(|index| {
                let document = &mut documents[index];
                for (path, value) in fields {
                    if path != ID_FIELD {
                        set_path(document, &path, value);
                    }
                }
                document.clone()
            })
        })
    }

    async fn find_by_id_and_remove(&self, id: &Value) -> Result<Option<Document>, DriverError> {
        self.with_documents(|documents| position_of(documents, id).map(|i| documents.remove(i)))
    }

    async fn remove_many(&self, filter: &Document) -> Result<u64, DriverError> {
        self.with_documents(|documents| {
            let mut kept = Vec::with_capacity(documents.len());
            let mut removed = 0u64;
            for document in documents.drain(..) {
                if matches(&document, filter)? {
                    removed += 1;
                } else {
                    kept.push(document);
                }
            }
            *documents = kept;
            Ok::<_, DriverError>(removed)
        })?
    }
}
