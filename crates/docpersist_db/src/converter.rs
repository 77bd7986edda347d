//! Conversion between stored documents and public entities

use crate::driver::{Document, ID_FIELD};
use crate::error::PersistenceError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;

/// Field holding the primary key in the public shape
pub const PUBLIC_ID_FIELD: &str = "id";

/// Converts documents between their stored and public shapes.
///
/// The engine calls `from_public` before every write and `to_public` on every
/// document it returns.
pub trait DocumentConverter<T>: Send + Sync {
    /// Stored document to public entity
    fn to_public(&self, document: Document) -> Result<T, PersistenceError>;

    /// Public entity to stored document
    fn from_public(&self, item: &T) -> Result<Document, PersistenceError>;

    /// Partial-update payload to stored field names
    fn from_public_partial(&self, data: Document) -> Result<Document, PersistenceError> {
        Ok(data)
    }
}

/// Default converter: renames `_id` to `id` and maps the rest with serde
pub struct JsonConverter<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonConverter<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonConverter<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonConverter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonConverter")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> DocumentConverter<T> for JsonConverter<T>
where
    T: Serialize + DeserializeOwned,
{
    fn to_public(&self, mut document: Document) -> Result<T, PersistenceError> {
        if let Some(id) = document.remove(ID_FIELD) {
            document.insert(PUBLIC_ID_FIELD.to_string(), id);
        }
        Ok(serde_json::from_value(Value::Object(document))?)
    }

    fn from_public(&self, item: &T) -> Result<Document, PersistenceError> {
        let Value::Object(mut fields) = serde_json::to_value(item)? else {
            return Err(PersistenceError::Conversion(
                "entity does not serialize to an object".to_string(),
            ));
        };

        let mut document = Document::new();
        match fields.remove(PUBLIC_ID_FIELD) {
            Some(Value::Null) | None => {}
            Some(id) => {
                document.insert(ID_FIELD.to_string(), id);
            }
        }
        document.extend(fields);
        Ok(document)
    }

    fn from_public_partial(&self, mut data: Document) -> Result<Document, PersistenceError> {
        data.remove(PUBLIC_ID_FIELD);
        Ok(data)
    }
}
