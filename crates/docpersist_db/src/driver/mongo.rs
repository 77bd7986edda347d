//! MongoDB driver backed by the official `mongodb` crate

use super::{
    ConnectSettings, Document, DocumentCollection, DocumentDriver, DriverError, FindOptions,
    ID_FIELD,
};
use async_trait::async_trait;
use bson::{doc, Bson};
use futures::TryStreamExt;
use mongodb::options::{
    ClientOptions, FindOneAndReplaceOptions, FindOneAndUpdateOptions, ReturnDocument,
};
use mongodb::{Client, Database};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const DEFAULT_DATABASE: &str = "test";

#[derive(Debug, Clone)]
struct Connection {
    database: Database,
    /// Log every collection operation
    debug: bool,
}

/// Document store driver talking to a MongoDB server or replica set
#[derive(Debug, Clone, Default)]
pub struct MongoDriver {
    connection: Arc<RwLock<Option<Connection>>>,
    connected: Arc<std::sync::atomic::AtomicBool>,
}

impl MongoDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

fn backend_error(err: mongodb::error::Error) -> DriverError {
    classify_backend_message(err.to_string())
}

/// Server error code 11000 is a duplicate key
fn classify_backend_message(message: String) -> DriverError {
    if message.contains("E11000") {
        DriverError::DuplicateKey(message)
    } else {
        DriverError::Backend(message)
    }
}

/// Copy connect settings onto the client options.
///
/// `auto_reconnect` maps to retryable reads and writes. `keep_alive` and
/// `max_page_size` have no client option: the driver keeps TCP keep-alive on
/// and the engine applies page limits itself.
fn apply_settings(options: &mut ClientOptions, settings: &ConnectSettings) {
    options.max_pool_size = Some(settings.max_pool_size);
    options.connect_timeout = Some(settings.connect_timeout);
    options.retry_reads = Some(settings.auto_reconnect);
    options.retry_writes = Some(settings.auto_reconnect);
    if settings.replica_set {
        options.direct_connection = Some(false);
    }
    debug!(
        keep_alive = settings.keep_alive,
        max_page_size = settings.max_page_size,
        "Settings without a MongoDB client option are not applied"
    );
}

fn to_bson_document(document: &Document) -> Result<bson::Document, DriverError> {
    bson::to_document(document).map_err(|e| DriverError::InvalidQuery(e.to_string()))
}

fn from_bson_document(document: bson::Document) -> Document {
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

fn to_bson_value(value: &Value) -> Result<Bson, DriverError> {
    Bson::try_from(value.clone()).map_err(|e| DriverError::InvalidQuery(e.to_string()))
}

fn bson_id_filter(id: &Value) -> Result<bson::Document, DriverError> {
    let mut filter = bson::Document::new();
    filter.insert(ID_FIELD, to_bson_value(id)?);
    Ok(filter)
}

#[async_trait]
impl DocumentDriver for MongoDriver {
    async fn connect(&self, uri: &str, settings: &ConnectSettings) -> Result<(), DriverError> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| DriverError::Connection(e.to_string()))?;
        apply_settings(&mut options, settings);

        let client =
            Client::with_options(options).map_err(|e| DriverError::Connection(e.to_string()))?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));

        database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| DriverError::Connection(e.to_string()))?;

        debug!(
            database = database.name(),
            replica_set = settings.replica_set,
            "MongoDB client connected"
        );
        *self.connection.write().await = Some(Connection {
            database,
            debug: settings.debug,
        });
        self.connected
            .store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DriverError> {
        self.connected
            .store(false, std::sync::atomic::Ordering::SeqCst);
        self.connection.write().await.take();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        Arc::new(MongoCollection {
            name: name.to_string(),
            connection: Arc::clone(&self.connection),
        })
    }
}

/// Handle to one collection of a [`MongoDriver`]
#[derive(Debug, Clone)]
pub struct MongoCollection {
    name: String,
    connection: Arc<RwLock<Option<Connection>>>,
}

impl MongoCollection {
    async fn handle(&self) -> Result<mongodb::Collection<bson::Document>, DriverError> {
        self.connection
            .read()
            .await
            .as_ref()
            .map(|c| c.database.collection::<bson::Document>(&self.name))
            .ok_or(DriverError::NotConnected)
    }

    /// Handle for `operation`, logging it when the connection has `debug` on
    async fn handle_for(
        &self,
        operation: &str,
    ) -> Result<mongodb::Collection<bson::Document>, DriverError> {
        let debug = self.connection.read().await.as_ref().is_some_and(|c| c.debug);
        if debug {
            debug!(collection = %self.name, operation, "MongoDB operation");
        }
        self.handle().await
    }
}

#[async_trait]
impl DocumentCollection for MongoCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(
        &self,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, DriverError> {
        let sort = options.sort.as_ref().map(to_bson_document).transpose()?;
        let projection = options.projection.as_ref().map(to_bson_document).transpose()?;
        let find_options = mongodb::options::FindOptions::builder()
            .skip(options.skip)
            .limit(options.limit)
            .sort(sort)
            .projection(projection)
            .build();

        let cursor = self
            .handle_for("find")
            .await?
            .find(to_bson_document(filter)?, find_options)
            .await
            .map_err(backend_error)?;
        let documents: Vec<bson::Document> = cursor.try_collect().await.map_err(backend_error)?;
        Ok(documents.into_iter().map(from_bson_document).collect())
    }

    async fn count(&self, filter: &Document) -> Result<u64, DriverError> {
        self.handle_for("count")
            .await?
            .count_documents(to_bson_document(filter)?, None)
            .await
            .map_err(backend_error)
    }

    async fn find_by_id(&self, id: &Value) -> Result<Option<Document>, DriverError> {
        let found = self
            .handle_for("find_by_id")
            .await?
            .find_one(bson_id_filter(id)?, None)
            .await
            .map_err(backend_error)?;
        Ok(found.map(from_bson_document))
    }

    async fn insert(&self, document: Document) -> Result<Document, DriverError> {
        let mut stored = to_bson_document(&document)?;
        let result = self
            .handle_for("insert")
            .await?
            .insert_one(stored.clone(), None)
            .await
            .map_err(backend_error)?;
        if !stored.contains_key(ID_FIELD) {
            stored.insert(ID_FIELD, result.inserted_id);
        }
        Ok(from_bson_document(stored))
    }

    async fn find_one_and_replace(
        &self,
        filter: &Document,
        replacement: Document,
        upsert: bool,
    ) -> Result<Option<Document>, DriverError> {
        let options = FindOneAndReplaceOptions::builder()
            .upsert(upsert)
            .return_document(ReturnDocument::After)
            .build();
        let found = self
            .handle_for("find_one_and_replace")
            .await?
            .find_one_and_replace(to_bson_document(filter)?, to_bson_document(&replacement)?, options)
            .await
            .map_err(backend_error)?;
        Ok(found.map(from_bson_document))
    }

    async fn find_by_id_and_update(
        &self,
        id: &Value,
        fields: Document,
    ) -> Result<Option<Document>, DriverError> {
        let mut update = bson::Document::new();
        update.insert("$set", to_bson_document(&fields)?);
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let found = self
            .handle_for("find_by_id_and_update")
            .await?
            .find_one_and_update(
                bson_id_filter(id)?,
                update,
                options,
            )
            .await
            .map_err(backend_error)?;
        Ok(found.map(from_bson_document))
    }

    async fn find_by_id_and_remove(&self, id: &Value) -> Result<Option<Document>, DriverError> {
        let found = self
            .handle_for("find_by_id_and_remove")
            .await?
            .find_one_and_delete(bson_id_filter(id)?, None)
            .await
            .map_err(backend_error)?;
        Ok(found.map(from_bson_document))
    }

    async fn remove_many(&self, filter: &Document) -> Result<u64, DriverError> {
        let result = self
            .handle_for("remove_many")
            .await?
            .delete_many(to_bson_document(filter)?, None)
            .await
            .map_err(backend_error)?;
        Ok(result.deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn settings() -> ConnectSettings {
        ConnectSettings {
            max_pool_size: 4,
            keep_alive: 1,
            connect_timeout: Duration::from_millis(1500),
            auto_reconnect: false,
            max_page_size: 100,
            debug: true,
            replica_set: true,
        }
    }

    #[tokio::test]
    async fn test_settings_are_applied_to_client_options() {
        let mut options = ClientOptions::parse("mongodb://localhost:27017").await.unwrap();
        apply_settings(&mut options, &settings());

        assert_eq!(options.max_pool_size, Some(4));
        assert_eq!(options.connect_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(options.retry_reads, Some(false));
        assert_eq!(options.retry_writes, Some(false));
        assert_eq!(options.direct_connection, Some(false));
    }

    #[test]
    fn test_duplicate_key_messages() {
        let duplicate = classify_backend_message(
            "E11000 duplicate key error collection: test.dummies index: _id_".to_string(),
        );
        assert_eq!(duplicate.code(), "DUPLICATE_KEY");

        let other = classify_backend_message("connection reset".to_string());
        assert_eq!(other, DriverError::Backend("connection reset".to_string()));
    }

    #[test]
    fn test_id_filter_keeps_the_key() {
        let filter = bson_id_filter(&json!("abc")).unwrap();
        assert_eq!(filter.get_str(ID_FIELD).ok(), Some("abc"));
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_documents_convert_to_plain_json() {
        let stored = doc! { "_id": "a1", "count": 3_i64, "tags": ["x", "y"], "inner": { "ok": true } };
        let document = from_bson_document(stored);
        assert_eq!(
            Value::Object(document.clone()),
            json!({ "_id": "a1", "count": 3, "tags": ["x", "y"], "inner": { "ok": true } })
        );

        let back = to_bson_document(&document).unwrap();
        assert_eq!(back.get_str("_id").ok(), Some("a1"));
        assert_eq!(back.get_array("tags").map(Vec::len).ok(), Some(2));
    }

    #[tokio::test]
    async fn test_operations_before_connect_fail() {
        let driver = MongoDriver::new();
        assert!(!driver.is_connected());

        let err = driver.collection("dummies").count(&Document::new()).await.unwrap_err();
        assert_eq!(err, DriverError::NotConnected);
    }
}
