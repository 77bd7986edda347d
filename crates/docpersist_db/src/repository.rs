//! Repository trait for entity storage
//!
//! This module defines the keyed CRUD surface that application services
//! depend on, so they stay agnostic of the engine and driver behind it.

use crate::engine::PersistenceEngine;
use crate::entity::{EntityKey, Identifiable};
use crate::error::PersistenceError;
use std::error::Error;
use std::fmt::Debug;
use std::future::Future;

/// A trait for entity repositories
///
/// This trait defines the basic operations that all repositories should
/// support. It is generic over the entity type, its key type and the error type.
pub trait Repository<T, K, E>
where
    T: Debug,
    K: Debug,
    E: Error + Debug,
{
    /// Create a new entity in the repository
    ///
    /// # Returns
    ///
    /// The created entity, with its key assigned
    fn create(
        &self,
        correlation_id: Option<&str>,
        entity: T,
    ) -> impl Future<Output = Result<T, E>> + Send;

    /// Read an entity from the repository by key
    ///
    /// # Returns
    ///
    /// The entity if found, or None if not found
    fn read(
        &self,
        correlation_id: Option<&str>,
        id: &K,
    ) -> impl Future<Output = Result<Option<T>, E>> + Send;

    /// Update an entity in the repository
    ///
    /// # Returns
    ///
    /// The updated entity, or None if there was nothing to update
    fn update(
        &self,
        correlation_id: Option<&str>,
        entity: T,
    ) -> impl Future<Output = Result<Option<T>, E>> + Send;

    /// Delete an entity from the repository by key
    ///
    /// # Returns
    ///
    /// `true` if the entity was deleted, `false` if it was not found
    fn delete(
        &self,
        correlation_id: Option<&str>,
        id: &K,
    ) -> impl Future<Output = Result<bool, E>> + Send;
}

impl<T, K> Repository<T, K, PersistenceError> for PersistenceEngine<T, K>
where
    T: Identifiable<K> + Debug + Send + Sync + 'static,
    K: EntityKey,
{
    fn create(
        &self,
        correlation_id: Option<&str>,
        entity: T,
    ) -> impl Future<Output = Result<T, PersistenceError>> + Send {
        PersistenceEngine::create(self, correlation_id, entity)
    }

    fn read(
        &self,
        correlation_id: Option<&str>,
        id: &K,
    ) -> impl Future<Output = Result<Option<T>, PersistenceError>> + Send {
        self.get_one_by_id(correlation_id, id)
    }

    fn update(
        &self,
        correlation_id: Option<&str>,
        entity: T,
    ) -> impl Future<Output = Result<Option<T>, PersistenceError>> + Send {
        PersistenceEngine::update(self, correlation_id, entity)
    }

    fn delete(
        &self,
        correlation_id: Option<&str>,
        id: &K,
    ) -> impl Future<Output = Result<bool, PersistenceError>> + Send {
        async move { Ok(self.delete_by_id(correlation_id, id).await?.is_some()) }
    }
}
