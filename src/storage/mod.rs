//! Asynchronous key-value store the diaries persist into.
//!
//! Each diary kind is one JSON blob under a fixed key. Implementations:
//! [`crate::db::Database`] (SQLite on a worker thread), [`MemoryStore`], and
//! [`TimeoutStore`], which bounds the latency of any other store.

mod memory;
mod timeout;

pub use memory::MemoryStore;
pub use timeout::TimeoutStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;

/// Calls are applied in the order they are issued. A call whose future is
/// dropped before the backend starts on it must not be applied later.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Shallow-merges the JSON object `partial` into the object stored under
    /// `key`. Behaves like [`KeyValueStore::set_item`] when nothing is stored.
    async fn merge_item(&self, key: &str, partial: String) -> Result<(), StorageError>;

    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key).await
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        (**self).set_item(key, value).await
    }

    async fn merge_item(&self, key: &str, partial: String) -> Result<(), StorageError> {
        (**self).merge_item(key, partial).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key).await
    }
}

/// Top-level keys of `partial` overwrite those of `existing`; nested objects
/// are replaced, not merged. Anything that is not an object on either side
/// is replaced by `partial`.
pub fn shallow_merge(existing: Option<&str>, partial: &str) -> Result<String, serde_json::Error> {
    let patch: Value = serde_json::from_str(partial)?;
    let current = match existing {
        Some(raw) => Some(serde_json::from_str::<Value>(raw)?),
        None => None,
    };

    let merged = match (current, patch) {
        (Some(Value::Object(mut base)), Value::Object(patch)) => {
            for (field, value) in patch {
                base.insert(field, value);
            }
            Value::Object(base)
        }
        (_, patch) => patch,
    };

    serde_json::to_string(&merged)
}
