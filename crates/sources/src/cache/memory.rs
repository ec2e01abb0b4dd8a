//! In-process cache backend.

use super::{CacheBackend, CacheEntry};
use chrono::{DateTime, Utc};
use samarth_core::AppResult;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Entries held in a `RwLock`ed map; concurrent readers never block each other.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&self, key: &str) -> AppResult<Option<CacheEntry>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn store(&self, entry: &CacheEntry) -> AppResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn remove_if_stale(&self, key: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.get(key).is_some_and(|entry| entry.is_stale_at(now)) {
            entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_stale_at(now));
        Ok(before - entries.len())
    }

    fn len(&self) -> AppResult<usize> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.len())
    }
}
