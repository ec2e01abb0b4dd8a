//! Time-boxed Cache Store for provider responses.
//!
//! An entry past `fetched_at + ttl_seconds` is treated as absent and is never
//! served. The store is the only mutable state shared between concurrent
//! fetches, so it also owns the per-key locks that keep identical cache
//! misses from issuing duplicate live calls.

pub mod clock;
pub mod memory;
pub mod sqlite;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use crate::types::{DataRecord, Origin};
use chrono::{DateTime, Duration, Utc};
use samarth_core::AppResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// A cached provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Vec<Arc<DataRecord>>,
    pub fetched_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    pub origin: Origin,
}

impl CacheEntry {
    /// Moment the entry stops being servable. `None` if the TTL overflows.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| self.fetched_at.checked_add_signed(ttl))
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires| now >= expires)
    }
}

/// Storage behind the Cache Store. Backends only persist; TTL policy lives
/// in `CacheStore`.
pub trait CacheBackend: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn load(&self, key: &str) -> AppResult<Option<CacheEntry>>;

    fn store(&self, entry: &CacheEntry) -> AppResult<()>;

    /// Delete the entry under `key` only if it is still stale at `now`.
    /// Returns whether a row was removed. The check and the delete happen
    /// under one lock so a fresh entry committed in between is kept.
    fn remove_if_stale(&self, key: &str, now: DateTime<Utc>) -> AppResult<bool>;

    /// Delete every entry stale at `now`; returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<usize>;

    fn len(&self) -> AppResult<usize>;
}

/// Process-wide cache service. Create one per process (or one per test).
#[derive(Debug)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
    key_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Store backed by process memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Store backed by a SQLite file.
    pub fn sqlite(path: &Path) -> AppResult<Self> {
        Ok(Self::new(Arc::new(SqliteBackend::open(path)?)))
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Read a non-stale entry. Stale entries are evicted and reported absent.
    pub fn get(&self, key: &str) -> AppResult<Option<CacheEntry>> {
        let Some(entry) = self.backend.load(key)? else {
            return Ok(None);
        };

        let now = self.now();
        if entry.is_stale_at(now) {
            tracing::debug!(
                "Cache entry {} expired (fetched {}, ttl {}s)",
                short_key(key),
                entry.fetched_at,
                entry.ttl_seconds
            );
            // Another fill may have replaced the row since the load
            if !self.backend.remove_if_stale(key, now)? {
                tracing::debug!("Cache entry {} was refreshed concurrently", short_key(key));
            }
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Commit a completed fetch.
    pub fn put(
        &self,
        key: &str,
        payload: Vec<Arc<DataRecord>>,
        ttl_seconds: u64,
        origin: Origin,
    ) -> AppResult<CacheEntry> {
        let entry = CacheEntry {
            key: key.to_string(),
            payload,
            fetched_at: self.now(),
            ttl_seconds,
            origin,
        };
        self.backend.store(&entry)?;

        tracing::debug!(
            "Cached {} records under {} ({}, ttl {}s)",
            entry.payload.len(),
            short_key(key),
            origin,
            ttl_seconds
        );
        Ok(entry)
    }

    /// Acquire the exclusive fill lock for `key`.
    ///
    /// Holders re-check the cache after acquiring; whoever arrives second
    /// finds the entry the first one committed. Dropping the guard (including
    /// through cancellation) releases the lock without writing anything.
    pub async fn lock_key(&self, key: &str) -> KeyGuard<'_> {
        let lock = {
            let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.to_string()).or_default())
        };

        let guard = lock.lock_owned().await;
        KeyGuard {
            store: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Take the fill lock for `key` only if nobody holds it right now.
    pub fn try_lock_key(&self, key: &str) -> Option<KeyGuard<'_>> {
        let lock = {
            let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.to_string()).or_default())
        };

        let guard = lock.try_lock_owned().ok()?;
        Some(KeyGuard {
            store: self,
            key: key.to_string(),
            guard: Some(guard),
        })
    }

    /// Remove every expired entry.
    pub fn purge_expired(&self) -> AppResult<usize> {
        self.backend.purge_expired(self.now())
    }

    pub fn len(&self) -> AppResult<usize> {
        self.backend.len()
    }

    pub fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Exclusive fill rights for one cache key.
pub struct KeyGuard<'a> {
    store: &'a CacheStore,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();

        let mut locks = self
            .store
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the map still references the lock: nobody is waiting
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

fn short_key(key: &str) -> &str {
    key.get(..12).unwrap_or(key)
}
