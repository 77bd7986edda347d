//! Persistence engine bound to one collection
//!
//! [`PersistenceEngine`] owns the connection lifecycle of a
//! [`DocumentDriver`] and a handle to one named collection. On top of the
//! driver it adds paging, primary key assignment, shape conversion through a
//! [`DocumentConverter`] and error wrapping.
//!
//! # Example
//!
//! ```rust,no_run
//! use docpersist_db::{Identifiable, MemoryDriver, PersistenceEngine};
//! use docpersist_config::ConfigParams;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Dummy {
//!     id: Option<String>,
//!     key: String,
//! }
//!
//! impl Identifiable<String> for Dummy {
//!     fn id(&self) -> Option<&String> {
//!         self.id.as_ref()
//!     }
//!
//!     fn set_id(&mut self, id: String) {
//!         self.id = Some(id);
//!     }
//! }
//!
//! async fn run() -> Result<(), docpersist_db::PersistenceError> {
//!     let config = ConfigParams::from_tuples([
//!         ("connection.host", "localhost"),
//!         ("connection.port", "27017"),
//!         ("connection.database", "test"),
//!     ]);
//!     let engine = PersistenceEngine::<Dummy, String>::builder("dummies", Arc::new(MemoryDriver::new()))
//!         .configure(config)
//!         .build()?;
//!
//!     engine.open(Some("123")).await?;
//!     let created = engine
//!         .create(Some("123"), Dummy { id: None, key: "a".to_string() })
//!         .await?;
//!     assert!(created.id.is_some());
//!     engine.close(Some("123")).await
//! }
//! ```

use crate::converter::{DocumentConverter, JsonConverter};
use crate::driver::{
    id_filter, ids_filter, Document, DocumentCollection, DocumentDriver, FindOptions,
};
use crate::entity::{EntityKey, Identifiable};
use crate::error::PersistenceError;
use crate::options::PersistenceOptions;
use crate::paging::{DataPage, PagingParams};
use crate::resolver::ConnectionResolver;
use docpersist_common::IdGenerator;
use docpersist_config::ConfigParams;
use parking_lot::Mutex;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Lifecycle state of a [`PersistenceEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unopened,
    Opening,
    Open,
    Closing,
    Closed,
}

/// Builder for [`PersistenceEngine`]
pub struct PersistenceEngineBuilder<T, K: EntityKey> {
    collection: String,
    driver: Arc<dyn DocumentDriver>,
    converter: Arc<dyn DocumentConverter<T>>,
    resolver: ConnectionResolver,
    id_generator: Arc<dyn IdGenerator<K>>,
    config: Option<ConfigParams>,
}

impl<T, K: EntityKey> PersistenceEngineBuilder<T, K> {
    /// Start a builder for entities that need a custom converter
    pub fn with_converter(
        collection: impl Into<String>,
        driver: Arc<dyn DocumentDriver>,
        converter: Arc<dyn DocumentConverter<T>>,
    ) -> Self {
        Self {
            collection: collection.into(),
            driver,
            converter,
            resolver: ConnectionResolver::new(),
            id_generator: K::default_generator(),
            config: None,
        }
    }

    pub fn resolver(mut self, resolver: ConnectionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn converter(mut self, converter: Arc<dyn DocumentConverter<T>>) -> Self {
        self.converter = converter;
        self
    }

    pub fn id_generator(mut self, id_generator: Arc<dyn IdGenerator<K>>) -> Self {
        self.id_generator = id_generator;
        self
    }

    /// Configuration applied with [`PersistenceEngine::configure`] on build
    pub fn configure(mut self, config: ConfigParams) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the engine
    ///
    /// # Errors
    ///
    /// Returns `COLLECTION_REQUIRED` if the collection name is empty
    pub fn build(self) -> Result<PersistenceEngine<T, K>, PersistenceError> {
        if self.collection.trim().is_empty() {
            return Err(PersistenceError::CollectionRequired);
        }

        let collection = self.driver.collection(&self.collection);
        let mut engine = PersistenceEngine {
            collection_name: Some(self.collection),
            collection: Some(collection),
            driver: self.driver,
            resolver: self.resolver,
            converter: self.converter,
            id_generator: self.id_generator,
            config: PersistenceOptions::default_config(),
            options: PersistenceOptions::default(),
            state: Mutex::new(EngineState::Unopened),
        };
        if let Some(config) = self.config {
            engine.configure(&config);
        }
        Ok(engine)
    }
}

/// Lifecycle and CRUD operations over one collection of entities `T` keyed by `K`
pub struct PersistenceEngine<T, K: EntityKey> {
    collection_name: Option<String>,
    collection: Option<Arc<dyn DocumentCollection>>,
    driver: Arc<dyn DocumentDriver>,
    resolver: ConnectionResolver,
    converter: Arc<dyn DocumentConverter<T>>,
    id_generator: Arc<dyn IdGenerator<K>>,
    config: ConfigParams,
    options: PersistenceOptions,
    state: Mutex<EngineState>,
}

impl<T, K: EntityKey> fmt::Debug for PersistenceEngine<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceEngine")
            .field("collection", &self.collection_name)
            .field("state", &self.state())
            .field("resolver", &self.resolver)
            .field("options", &self.options)
            .finish()
    }
}

impl<T, K> PersistenceEngine<T, K>
where
    T: Serialize + DeserializeOwned + 'static,
    K: EntityKey,
{
    /// Builder using the default [`JsonConverter`] and the key's default generator
    pub fn builder(
        collection: impl Into<String>,
        driver: Arc<dyn DocumentDriver>,
    ) -> PersistenceEngineBuilder<T, K> {
        PersistenceEngineBuilder::with_converter(
            collection,
            driver,
            Arc::new(JsonConverter::<T>::new()),
        )
    }
}

impl<T, K: EntityKey> PersistenceEngine<T, K> {
    /// Merge `config` over the defaults and apply it.
    ///
    /// A changed `collection` key re-binds the collection handle; an empty
    /// one unbinds it.
    pub fn configure(&mut self, config: &ConfigParams) {
        self.config = config.set_defaults(&PersistenceOptions::default_config());
        self.options = PersistenceOptions::from_config(&self.config);
        self.resolver.configure(config);

        if let Some(name) = self.options.collection.clone() {
            if name.is_empty() {
                self.collection_name = None;
                self.collection = None;
            } else if self.collection_name.as_deref() != Some(name.as_str()) {
                self.collection = Some(self.driver.collection(&name));
                self.collection_name = Some(name);
            }
        }
    }

    /// Configuration in effect, defaults included
    pub fn config(&self) -> &ConfigParams {
        &self.config
    }

    pub fn options(&self) -> &PersistenceOptions {
        &self.options
    }

    pub fn resolver(&self) -> &ConnectionResolver {
        &self.resolver
    }

    pub fn collection_name(&self) -> Option<&str> {
        self.collection_name.as_deref()
    }

    /// The bound collection handle, for queries the engine doesn't cover
    pub fn collection(&self) -> Option<Arc<dyn DocumentCollection>> {
        self.collection.clone()
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// Whether the driver reports a ready connection
    pub fn is_open(&self) -> bool {
        self.driver.is_connected()
    }

    fn set_state(&self, state: EngineState) {
        *self.state.lock() = state;
    }

    fn settle_state(&self, disconnected: EngineState) {
        if self.driver.is_connected() {
            self.set_state(EngineState::Open);
        } else {
            self.set_state(disconnected);
        }
    }

    fn handle(&self) -> Result<Arc<dyn DocumentCollection>, PersistenceError> {
        self.collection
            .clone()
            .ok_or(PersistenceError::CollectionNotDefined)
    }

    /// Resolve the connection URI and connect the driver
    ///
    /// # Errors
    ///
    /// Returns the resolution error, or `CONNECT_FAILED` wrapping the driver failure
    pub async fn open(&self, correlation_id: Option<&str>) -> Result<(), PersistenceError> {
        self.set_state(EngineState::Opening);

        let uri = match self.resolver.resolve(correlation_id).await {
            Ok(uri) => uri,
            Err(err) => {
                error!(correlation_id, error = %err, "Failed to resolve database connection");
                self.settle_state(EngineState::Unopened);
                return Err(err);
            }
        };

        let replica_set = self.options.replica_set || uri.contains("replicaSet");
        let settings = self.options.connect_settings(replica_set);
        debug!(correlation_id, replica_set, "Connecting to database");

        if let Err(source) = self.driver.connect(&uri, &settings).await {
            error!(correlation_id, error = %source, "Connection to database failed");
            self.settle_state(EngineState::Unopened);
            return Err(PersistenceError::ConnectFailed { source });
        }

        self.set_state(EngineState::Open);
        debug!(
            correlation_id,
            "Connected to database, collection {}",
            self.collection_name.as_deref().unwrap_or("<none>")
        );
        Ok(())
    }

    /// Disconnect the driver
    ///
    /// # Errors
    ///
    /// Returns `DISCONNECT_FAILED` wrapping the driver failure
    pub async fn close(&self, correlation_id: Option<&str>) -> Result<(), PersistenceError> {
        self.set_state(EngineState::Closing);

        if let Err(source) = self.driver.disconnect().await {
            error!(correlation_id, error = %source, "Disconnect from database failed");
            self.settle_state(EngineState::Closed);
            return Err(PersistenceError::DisconnectFailed { source });
        }

        self.set_state(EngineState::Closed);
        debug!(correlation_id, "Disconnected from database");
        Ok(())
    }

    /// Remove every document of the bound collection
    ///
    /// # Errors
    ///
    /// Returns `COLLECTION_NOT_DEFINED` without a bound collection, or
    /// `CLEAR_FAILED` wrapping the driver failure
    pub async fn clear(&self, correlation_id: Option<&str>) -> Result<(), PersistenceError> {
        let collection = self.handle()?;
        let removed = collection
            .remove_many(&Document::new())
            .await
            .map_err(|source| PersistenceError::ClearFailed {
                collection: collection.name().to_string(),
                source,
            })?;
        trace!(correlation_id, "Cleared {} items from {}", removed, collection.name());
        Ok(())
    }
}

fn key_value<K: EntityKey>(id: &K) -> Result<Value, PersistenceError> {
    Ok(serde_json::to_value(id)?)
}

fn random_offset(count: u64) -> u64 {
    if count == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..count)
    }
}

impl<T, K> PersistenceEngine<T, K>
where
    T: Identifiable<K> + Send + Sync + 'static,
    K: EntityKey,
{
    fn to_public_all(&self, documents: Vec<Document>) -> Result<Vec<T>, PersistenceError> {
        documents
            .into_iter()
            .map(|document| self.converter.to_public(document))
            .collect()
    }

    fn to_public_one(&self, document: Option<Document>) -> Result<Option<T>, PersistenceError> {
        document
            .map(|document| self.converter.to_public(document))
            .transpose()
    }

    fn assign_id(&self, item: &mut T) {
        let missing = item.id().is_none_or(|id| id.is_empty());
        if missing {
            item.set_id(self.id_generator.next_id());
        }
    }

    /// One page of entities matching `filter`.
    ///
    /// Skip is only sent when it resolves to a non-negative value; take
    /// defaults to and is capped at `options.max_page_size`. With
    /// `paging.total` the matching count is queried after the page.
    pub async fn get_page_by_filter(
        &self,
        correlation_id: Option<&str>,
        filter: Document,
        paging: Option<PagingParams>,
        sort: Option<Document>,
        select: Option<Document>,
    ) -> Result<DataPage<T>, PersistenceError> {
        let collection = self.handle()?;
        let paging = paging.unwrap_or_default();
        let options = FindOptions {
            skip: u64::try_from(paging.get_skip(-1)).ok(),
            limit: Some(paging.get_take(self.options.max_page_size)),
            sort,
            projection: select,
        };

        let documents = collection.find(&filter, &options).await?;
        let data = self.to_public_all(documents)?;
        trace!(correlation_id, "Retrieved {} from {}", data.len(), collection.name());

        let total = if paging.total {
            let count = collection.count(&filter).await?;
            Some(i64::try_from(count).unwrap_or(i64::MAX))
        } else {
            None
        };
        Ok(DataPage::new(data, total))
    }

    /// Every entity matching `filter`, without paging
    pub async fn get_list_by_filter(
        &self,
        correlation_id: Option<&str>,
        filter: Document,
        sort: Option<Document>,
        select: Option<Document>,
    ) -> Result<Vec<T>, PersistenceError> {
        let collection = self.handle()?;
        let options = FindOptions {
            sort,
            projection: select,
            ..FindOptions::default()
        };

        let documents = collection.find(&filter, &options).await?;
        let items = self.to_public_all(documents)?;
        trace!(correlation_id, "Retrieved {} from {}", items.len(), collection.name());
        Ok(items)
    }

    pub async fn get_count_by_filter(
        &self,
        correlation_id: Option<&str>,
        filter: Document,
    ) -> Result<i64, PersistenceError> {
        let collection = self.handle()?;
        let count = collection.count(&filter).await?;
        trace!(correlation_id, "Counted {} items in {}", count, collection.name());
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    pub async fn get_list_by_ids(
        &self,
        correlation_id: Option<&str>,
        ids: &[K],
    ) -> Result<Vec<T>, PersistenceError> {
        let ids = ids.iter().map(key_value).collect::<Result<Vec<_>, _>>()?;
        self.get_list_by_filter(correlation_id, ids_filter(ids), None, None)
            .await
    }

    pub async fn get_one_by_id(
        &self,
        correlation_id: Option<&str>,
        id: &K,
    ) -> Result<Option<T>, PersistenceError> {
        let collection = self.handle()?;
        let document = collection.find_by_id(&key_value(id)?).await?;

        if document.is_some() {
            trace!(correlation_id, "Retrieved from {} by id = {:?}", collection.name(), id);
        } else {
            trace!(correlation_id, "Nothing found from {} with id = {:?}", collection.name(), id);
        }
        self.to_public_one(document)
    }

    /// A uniformly random entity among those matching `filter`
    pub async fn get_one_random(
        &self,
        correlation_id: Option<&str>,
        filter: Document,
    ) -> Result<Option<T>, PersistenceError> {
        let collection = self.handle()?;
        let count = collection.count(&filter).await?;
        let options = FindOptions {
            skip: Some(random_offset(count)),
            limit: Some(1),
            ..FindOptions::default()
        };

        let document = collection.find(&filter, &options).await?.into_iter().next();
        if document.is_some() {
            trace!(correlation_id, "Retrieved random item from {}", collection.name());
        } else {
            trace!(correlation_id, "Nothing found in {}", collection.name());
        }
        self.to_public_one(document)
    }

    /// Insert a new entity, generating its key when missing
    ///
    /// # Errors
    ///
    /// Fails with the driver's duplicate key error if the key already exists
    pub async fn create(
        &self,
        correlation_id: Option<&str>,
        mut item: T,
    ) -> Result<T, PersistenceError> {
        let collection = self.handle()?;
        self.assign_id(&mut item);
        let document = self.converter.from_public(&item)?;

        let created = self.converter.to_public(collection.insert(document).await?)?;
        trace!(correlation_id, "Created in {} with id = {:?}", collection.name(), created.id());
        Ok(created)
    }

    /// Replace the entity with the same key, inserting it when missing
    pub async fn set(
        &self,
        correlation_id: Option<&str>,
        mut item: T,
    ) -> Result<Option<T>, PersistenceError> {
        let collection = self.handle()?;
        self.assign_id(&mut item);
        let id = item
            .id()
            .map(key_value)
            .transpose()?
            .unwrap_or(Value::Null);
        let document = self.converter.from_public(&item)?;

        let stored = collection
            .find_one_and_replace(&id_filter(id), document, true)
            .await?;
        trace!(correlation_id, "Set in {} with id = {:?}", collection.name(), item.id());
        self.to_public_one(stored)
    }

    /// Replace an existing entity; `None` when it has no key or isn't stored
    pub async fn update(
        &self,
        correlation_id: Option<&str>,
        item: T,
    ) -> Result<Option<T>, PersistenceError> {
        let id = match item.id() {
            Some(id) if !id.is_empty() => key_value(id)?,
            _ => return Ok(None),
        };
        let collection = self.handle()?;
        let document = self.converter.from_public(&item)?;

        let updated = collection
            .find_one_and_replace(&id_filter(id), document, false)
            .await?;
        trace!(correlation_id, "Updated in {} with id = {:?}", collection.name(), item.id());
        self.to_public_one(updated)
    }

    /// Set only the given fields of an existing entity
    pub async fn update_partially(
        &self,
        correlation_id: Option<&str>,
        id: &K,
        data: Document,
    ) -> Result<Option<T>, PersistenceError> {
        if id.is_empty() || data.is_empty() {
            return Ok(None);
        }
        let collection = self.handle()?;
        let fields = self.converter.from_public_partial(data)?;
        if fields.is_empty() {
            return Ok(None);
        }

        let updated = collection
            .find_by_id_and_update(&key_value(id)?, fields)
            .await?;
        trace!(correlation_id, "Updated partially in {} with id = {:?}", collection.name(), id);
        self.to_public_one(updated)
    }

    /// Remove one entity, returning it as it was before removal
    pub async fn delete_by_id(
        &self,
        correlation_id: Option<&str>,
        id: &K,
    ) -> Result<Option<T>, PersistenceError> {
        let collection = self.handle()?;
        let removed = collection.find_by_id_and_remove(&key_value(id)?).await?;
        trace!(correlation_id, "Deleted from {} with id = {:?}", collection.name(), id);
        self.to_public_one(removed)
    }

    pub async fn delete_by_filter(
        &self,
        correlation_id: Option<&str>,
        filter: Document,
    ) -> Result<(), PersistenceError> {
        let collection = self.handle()?;
        let removed = collection.remove_many(&filter).await?;
        trace!(correlation_id, "Deleted {} items from {}", removed, collection.name());
        Ok(())
    }

    pub async fn delete_by_ids(
        &self,
        correlation_id: Option<&str>,
        ids: &[K],
    ) -> Result<(), PersistenceError> {
        let ids = ids.iter().map(key_value).collect::<Result<Vec<_>, _>>()?;
        self.delete_by_filter(correlation_id, ids_filter(ids)).await
    }
}
