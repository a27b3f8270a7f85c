//! Persisted key/value cache with a time-to-live.
//!
//! The store is one JSON document mapping keys to `{ value, timestamp }`. Writes
//! replace the whole file through a temp-file rename so concurrent processes
//! never observe a truncated store; the last writer wins. A store that cannot
//! be read or parsed is treated as empty.

use crate::error::WebDriverError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(value: String) -> Self {
        Self {
            value,
            timestamp: Utc::now(),
        }
    }

    /// An entry is fresh while `now - timestamp < ttl`.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(self.timestamp) < ttl,
            // Larger than chrono can represent, never expires.
            Err(_) => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cached value for `key` if present and not expired.
    pub async fn get(&self, key: &str, ttl: Duration) -> Option<String> {
        let entries = self.load().await;
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(ttl, Utc::now()))
            .map(|entry| entry.value.clone())
    }

    /// Records `value` under `key` with the current time.
    pub async fn put(&self, key: &str, value: &str) -> Result<(), WebDriverError> {
        let mut entries = self.load().await;
        entries.insert(key.to_string(), CacheEntry::new(value.to_string()));
        self.save(entries).await
    }

    /// Returns the fresh cached value for `key`, or runs `compute` and caches
    /// its result. A failing `compute` leaves the store untouched and its error
    /// is returned unchanged.
    pub async fn with_cache<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<String, WebDriverError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, WebDriverError>>,
    {
        if let Some(value) = self.get(key, ttl).await {
            debug!(key, value = %value, "cache hit");
            return Ok(value);
        }

        debug!(key, "cache miss");
        let value = compute().await?;
        self.put(key, &value).await?;
        Ok(value)
    }

    /// Drops `key` from the store. Missing keys are ignored.
    pub async fn remove(&self, key: &str) -> Result<(), WebDriverError> {
        let mut entries = self.load().await;
        if entries.remove(key).is_some() {
            self.save(entries).await?;
        }
        Ok(())
    }

    async fn load(&self) -> BTreeMap<String, CacheEntry> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable cache store, ignoring");
                return BTreeMap::new();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "corrupt cache store, ignoring");
            BTreeMap::new()
        })
    }

    async fn save(&self, entries: BTreeMap<String, CacheEntry>) -> Result<(), WebDriverError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &entries)).await?
    }
}

fn write_atomically(
    path: &Path,
    entries: &BTreeMap<String, CacheEntry>,
) -> Result<(), WebDriverError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| WebDriverError::io(&dir, e))?;

    let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| WebDriverError::io(&dir, e))?;
    serde_json::to_writer_pretty(temp.as_file_mut(), entries).map_err(|e| {
        WebDriverError::CacheSerialization {
            path: path.to_path_buf(),
            source: e,
        }
    })?;
    temp.as_file_mut()
        .flush()
        .map_err(|e| WebDriverError::io(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| WebDriverError::io(path, e.error))?;
    Ok(())
}
