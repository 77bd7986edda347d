//! Entity and key contracts for the persistence engine

use docpersist_common::{IdGenerator, RandomIdGenerator, UuidIdGenerator};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;

/// A primary key type the engine can store.
///
/// Keys serialize to the driver's native key representation through serde.
pub trait EntityKey:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Generator used for entities created without a key
    fn default_generator() -> Arc<dyn IdGenerator<Self>>;

    /// An empty key is treated like a missing one
    fn is_empty(&self) -> bool {
        false
    }
}

impl EntityKey for String {
    fn default_generator() -> Arc<dyn IdGenerator<Self>> {
        Arc::new(UuidIdGenerator)
    }

    fn is_empty(&self) -> bool {
        str::is_empty(self)
    }
}

impl EntityKey for i64 {
    fn default_generator() -> Arc<dyn IdGenerator<Self>> {
        Arc::new(RandomIdGenerator)
    }
}

/// An entity with an explicit primary key accessor
pub trait Identifiable<K: EntityKey> {
    fn id(&self) -> Option<&K>;

    fn set_id(&mut self, id: K);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string_key() {
        assert!(EntityKey::is_empty(&String::new()));
        assert!(!EntityKey::is_empty(&"abc".to_string()));
        assert!(!EntityKey::is_empty(&0_i64));
    }

    #[test]
    fn test_default_generators() {
        assert_eq!(String::default_generator().next_id().len(), 32);
        assert!(i64::default_generator().next_id() > 0);
    }
}
