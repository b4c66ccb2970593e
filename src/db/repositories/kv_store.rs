use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::Database;
use crate::error::StorageError;
use crate::storage::{shallow_merge, KeyValueStore};

fn read_value(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM kv_store WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

fn write_value(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO kv_store (key, value, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at",
        params![key, value, Utc::now().to_rfc3339()],
    )
}

impl Database {
    /// Raw JSON stored under `key`
    pub async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let key = key.to_string();
        let value = self
            .execute(move |conn| {
                read_value(conn, &key).with_context(|| format!("failed to read '{key}'"))
            })
            .await?;
        Ok(value)
    }

    /// Replace the value under `key` in a single statement
    pub async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        let key = key.to_string();
        self.execute(move |conn| {
            write_value(conn, &key, &value).with_context(|| format!("failed to write '{key}'"))?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Read, shallow-merge and write back inside one transaction
    pub async fn merge_item(&self, key: &str, partial: String) -> Result<(), StorageError> {
        let key = key.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction().context("failed to open merge transaction")?;
            let existing =
                read_value(&tx, &key).with_context(|| format!("failed to read '{key}'"))?;

            let merged = match shallow_merge(existing.as_deref(), &partial) {
                Ok(merged) => merged,
                Err(source) => return Ok(Err(StorageError::Corrupt { key, source })),
            };

            write_value(&tx, &key, &merged)
                .with_context(|| format!("failed to write '{key}'"))?;
            tx.commit().context("failed to commit merge")?;
            Ok(Ok(()))
        })
        .await?
    }

    pub async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                .with_context(|| format!("failed to remove '{key}'"))?;
            Ok(())
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for Database {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Database::get_item(self, key).await
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        Database::set_item(self, key, value).await
    }

    async fn merge_item(&self, key: &str, partial: String) -> Result<(), StorageError> {
        Database::merge_item(self, key, partial).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        Database::remove_item(self, key).await
    }
}
