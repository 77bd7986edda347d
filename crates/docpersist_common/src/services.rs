// --- File: crates/docpersist_common/src/services.rs ---
//! Service abstractions for external services.
//!
//! This module provides trait definitions for the services the persistence
//! layer consults while connecting: a discovery service that turns a
//! discovery key into connection descriptors, a credential store that turns
//! a store key into a credential, and an id generator for new entities.
//! In-memory implementations are provided for tests and static setups.

use crate::error::{config_error, ServiceError};
use crate::models::{ConnectionDescriptor, CredentialDescriptor};
use async_trait::async_trait;
use docpersist_config::ConfigParams;
use rand::Rng;
use tokio::sync::RwLock;
use tracing::trace;

/// A trait for discovery services.
///
/// One discovery key may map to several connections (e.g. replica set members).
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    /// Register a connection under a discovery key
    async fn register(
        &self,
        correlation_id: Option<&str>,
        key: &str,
        connection: ConnectionDescriptor,
    ) -> Result<ConnectionDescriptor, ServiceError>;

    /// First connection registered under the key
    async fn resolve_one(
        &self,
        correlation_id: Option<&str>,
        key: &str,
    ) -> Result<Option<ConnectionDescriptor>, ServiceError>;

    /// All connections registered under the key, in registration order
    async fn resolve_all(
        &self,
        correlation_id: Option<&str>,
        key: &str,
    ) -> Result<Vec<ConnectionDescriptor>, ServiceError>;
}

/// A trait for credential stores.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Store a credential under a key, replacing any previous one.
    /// Storing `None` removes the key.
    async fn store(
        &self,
        correlation_id: Option<&str>,
        key: &str,
        credential: Option<CredentialDescriptor>,
    ) -> Result<(), ServiceError>;

    /// Credential stored under the key
    async fn lookup(
        &self,
        correlation_id: Option<&str>,
        key: &str,
    ) -> Result<Option<CredentialDescriptor>, ServiceError>;
}

/// A trait for generating unique entity keys.
pub trait IdGenerator<K>: Send + Sync {
    /// Produce a fresh key
    fn next_id(&self) -> K;
}

/// Generates 32 character hex keys from random (v4) UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator<String> for UuidIdGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Generates positive random 64-bit keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator<i64> for RandomIdGenerator {
    fn next_id(&self) -> i64 {
        rand::thread_rng().gen_range(1..i64::MAX)
    }
}

/// Reads `key -> params` entries from a configuration.
///
/// An entry is either a section (`main-db.host=...`) or a single
/// `key=value;key=value` string (`main-db=host=...;port=...`).
fn read_entries(config: &ConfigParams) -> Result<Vec<(String, ConfigParams)>, ServiceError> {
    let mut entries = Vec::new();
    for name in config.get_section_names() {
        let section = config.get_section(&name);
        let params = if section.is_empty() {
            config.get(&name).unwrap_or_default().parse::<ConfigParams>()?
        } else {
            section
        };
        if params.is_empty() {
            return Err(config_error(format!("Entry '{}' has no parameters", name)));
        }
        entries.push((name, params));
    }
    Ok(entries)
}

/// Discovery service that keeps its registrations in memory.
#[derive(Debug, Default)]
pub struct MemoryDiscovery {
    items: RwLock<Vec<(String, ConnectionDescriptor)>>,
}

impl MemoryDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a discovery service pre-loaded from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if an entry cannot be parsed
    pub fn from_config(config: &ConfigParams) -> Result<Self, ServiceError> {
        let items = read_entries(config)?
            .into_iter()
            .map(|(key, params)| (key, ConnectionDescriptor::from_params(params)))
            .collect();
        Ok(Self {
            items: RwLock::new(items),
        })
    }
}

#[async_trait]
impl DiscoveryService for MemoryDiscovery {
    async fn register(
        &self,
        correlation_id: Option<&str>,
        key: &str,
        connection: ConnectionDescriptor,
    ) -> Result<ConnectionDescriptor, ServiceError> {
        trace!(correlation_id, "Registered connection under {}", key);
        self.items
            .write()
            .await
            .push((key.to_string(), connection.clone()));
        Ok(connection)
    }

    async fn resolve_one(
        &self,
        _correlation_id: Option<&str>,
        key: &str,
    ) -> Result<Option<ConnectionDescriptor>, ServiceError> {
        let items = self.items.read().await;
        Ok(items.iter().find(|(k, _)| k == key).map(|(_, c)| c.clone()))
    }

    async fn resolve_all(
        &self,
        _correlation_id: Option<&str>,
        key: &str,
    ) -> Result<Vec<ConnectionDescriptor>, ServiceError> {
        let items = self.items.read().await;
        Ok(items
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, c)| c.clone())
            .collect())
    }
}

/// Credential store that keeps its credentials in memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    items: RwLock<Vec<(String, CredentialDescriptor)>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a credential store pre-loaded from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if an entry cannot be parsed
    pub fn from_config(config: &ConfigParams) -> Result<Self, ServiceError> {
        let items = read_entries(config)?
            .into_iter()
            .map(|(key, params)| (key, CredentialDescriptor::from_params(params)))
            .collect();
        Ok(Self {
            items: RwLock::new(items),
        })
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn store(
        &self,
        correlation_id: Option<&str>,
        key: &str,
        credential: Option<CredentialDescriptor>,
    ) -> Result<(), ServiceError> {
        let mut items = self.items.write().await;
        items.retain(|(k, _)| k != key);
        if let Some(credential) = credential {
            items.push((key.to_string(), credential));
        }
        trace!(correlation_id, "Stored credential under {}", key);
        Ok(())
    }

    async fn lookup(
        &self,
        _correlation_id: Option<&str>,
        key: &str,
    ) -> Result<Option<CredentialDescriptor>, ServiceError> {
        let items = self.items.read().await;
        Ok(items.iter().find(|(k, _)| k == key).map(|(_, c)| c.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_discovery_from_config() {
        let config = ConfigParams::from_tuples([
            ("main-db", "host=db1;port=27017;database=app"),
            ("backup.host", "db2"),
            ("backup.port", "27018"),
        ]);

        let discovery = MemoryDiscovery::from_config(&config).unwrap();
        let main = discovery.resolve_one(None, "main-db").await.unwrap().unwrap();
        assert_eq!(main.host().as_deref(), Some("db1"));
        assert_eq!(main.database().as_deref(), Some("app"));

        let backup = discovery.resolve_all(None, "backup").await.unwrap();
        assert_eq!(backup.len(), 1);
        assert_eq!(backup[0].port(), Some(27018));

        assert!(discovery.resolve_one(None, "unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_discovery_resolve_all_in_order() {
        let discovery = MemoryDiscovery::new();
        discovery
            .register(Some("123"), "rs", ConnectionDescriptor::from_tuples([("host", "a")]))
            .await
            .unwrap();
        discovery
            .register(Some("123"), "rs", ConnectionDescriptor::from_tuples([("host", "b")]))
            .await
            .unwrap();

        let hosts: Vec<_> = discovery
            .resolve_all(None, "rs")
            .await
            .unwrap()
            .iter()
            .filter_map(|c| c.host())
            .collect();
        assert_eq!(hosts, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_memory_credential_store_replace_and_remove() {
        let store = MemoryCredentialStore::new();
        store
            .store(None, "db", Some(CredentialDescriptor::from_tuples([("username", "u1")])))
            .await
            .unwrap();
        store
            .store(None, "db", Some(CredentialDescriptor::from_tuples([("username", "u2")])))
            .await
            .unwrap();

        let found = store.lookup(None, "db").await.unwrap().unwrap();
        assert_eq!(found.username().as_deref(), Some("u2"));

        store.store(None, "db", None).await.unwrap();
        assert!(store.lookup(None, "db").await.unwrap().is_none());
    }

    #[test]
    fn test_malformed_entries_are_config_errors() {
        let empty = ConfigParams::from_tuples([("main-db", "")]);
        let err = MemoryDiscovery::from_config(&empty).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");

        let keyless = ConfigParams::from_tuples([("db-user", "=secret")]);
        let err = MemoryCredentialStore::from_config(&keyless).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_id_generators() {
        let a = UuidIdGenerator.next_id();
        let b = UuidIdGenerator.next_id();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);

        assert!(RandomIdGenerator.next_id() > 0);
    }
}
