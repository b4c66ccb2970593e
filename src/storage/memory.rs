use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StorageError;

use super::{shallow_merge, KeyValueStore};

/// Process-local store. Counts every call so callers can assert that a
/// rejected operation never reached storage.
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store calls made so far, reads included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes every subsequent write fail with a backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw value under `key`, bypassing the call counter.
    pub async fn peek(&self, key: &str) -> Option<String> {
        self.items.lock().await.get(key).cloned()
    }

    fn check_writable(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(anyhow!("write to '{key}' refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.lock().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_writable(key)?;
        self.items.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn merge_item(&self, key: &str, partial: String) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_writable(key)?;
        let mut items = self.items.lock().await;
        let merged = shallow_merge(items.get(key).map(String::as_str), &partial).map_err(
            |source| StorageError::Corrupt {
                key: key.to_string(),
                source,
            },
        )?;
        items.insert(key.to_string(), merged);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_writable(key)?;
        self.items.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_write_leaves_previous_value() {
        let store = MemoryStore::new();
        store.set_item("BPDiary", "[]".into()).await.unwrap();

        store.set_fail_writes(true);
        assert!(store.set_item("BPDiary", "[1]".into()).await.is_err());
        assert_eq!(store.peek("BPDiary").await.as_deref(), Some("[]"));
        assert_eq!(store.calls(), 2);
    }
}
