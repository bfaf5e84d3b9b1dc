//! Key/value configuration stores
//!
//! The controller only needs a synchronous `get(key)`. [`SqliteConfigStore`]
//! reads a `config(key, value)` table once and serves lookups from memory;
//! [`MemoryConfigStore`] is used for embedding and tests.

use crate::error::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Synchronous read access to configuration values
pub trait ConfigStore: Send + Sync {
    /// Value stored under `key`, or None when absent
    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory configuration store
#[derive(Clone, Debug, Default)]
pub struct MemoryConfigStore {
    values: HashMap<String, String>,
}

impl MemoryConfigStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from key/value pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Set or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Configuration store backed by the `config` table of a SQLite database
///
/// The table is expected to have `key` and `value` text columns. The file is
/// opened read-only and never written.
#[derive(Clone, Debug)]
pub struct SqliteConfigStore {
    inner: MemoryConfigStore,
}

impl SqliteConfigStore {
    /// Load every row of the `config` table from the database at `path`
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Store(format!(
                "configuration database not found at {}",
                path.display()
            )));
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| Error::Store(format!("Failed to parse database path: {}", e)))?
            .read_only(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| Error::Store(format!("Failed to connect to database: {}", e)))?;

        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT key, value FROM config")
                .fetch_all(&pool)
                .await
                .map_err(|e| Error::Store(format!("Failed to read config table: {}", e)))?;

        pool.close().await;

        tracing::debug!(keys = rows.len(), path = %path.display(), "configuration loaded");

        Ok(Self {
            inner: MemoryConfigStore::from_pairs(
                rows.into_iter()
                    .filter_map(|(key, value)| value.map(|v| (key, v))),
            ),
        })
    }
}

impl ConfigStore for SqliteConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }
}
