use std::{future::Future, time::Duration};

use async_trait::async_trait;
use log::warn;

use crate::error::StorageError;

use super::KeyValueStore;

/// Puts a deadline on every call of the wrapped store so a hung backend
/// surfaces as [`StorageError::Timeout`] instead of a save that never ends.
pub struct TimeoutStore<S> {
    inner: S,
    deadline: Duration,
}

impl<S: KeyValueStore> TimeoutStore<S> {
    pub fn new(inner: S, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T>(
        &self,
        key: &str,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        match tokio::time::timeout(self.deadline, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Storage call for '{key}' timed out after {} ms",
                    self.deadline.as_millis()
                );
                Err(StorageError::Timeout {
                    key: key.to_string(),
                    after_ms: self.deadline.as_millis() as u64,
                })
            }
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for TimeoutStore<S> {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.bounded(key, self.inner.get_item(key)).await
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.bounded(key, self.inner.set_item(key, value)).await
    }

    async fn merge_item(&self, key: &str, partial: String) -> Result<(), StorageError> {
        self.bounded(key, self.inner.merge_item(key, partial)).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.bounded(key, self.inner.remove_item(key)).await
    }
}
