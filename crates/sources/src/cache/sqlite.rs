//! SQLite-backed cache backend.
//!
//! Keeps provider responses across CLI invocations. The payload is stored as
//! JSON; staleness is still decided by the Cache Store from `fetched_at` and
//! `ttl_seconds`.

use super::{CacheBackend, CacheEntry};
use crate::types::Origin;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use samarth_core::{AppError, AppResult};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Cache rows in a single SQLite table.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) the cache database.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Cache(format!("Failed to create cache directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Cache(format!("Failed to open SQLite cache: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                ttl_seconds INTEGER NOT NULL,
                origin TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| AppError::Cache(format!("Failed to create cache table: {}", e)))?;

        tracing::debug!("Initialized SQLite cache at {:?}", db_path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_fetched_at(key: &str, raw: &str) -> AppResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|e| AppError::Cache(format!("Corrupt cache timestamp for {}: {}", key, e)))?
        .with_timezone(&Utc))
}

fn delete_row(conn: &Connection, key: &str) -> AppResult<()> {
    conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])
        .map_err(|e| AppError::Cache(format!("Failed to delete cache row: {}", e)))?;
    Ok(())
}

fn origin_to_str(origin: Origin) -> &'static str {
    match origin {
        Origin::Live => "live",
        Origin::Fallback => "fallback",
    }
}

fn origin_from_str(s: &str) -> AppResult<Origin> {
    match s {
        "live" => Ok(Origin::Live),
        "fallback" => Ok(Origin::Fallback),
        other => Err(AppError::Cache(format!("Unknown origin in cache row: {}", other))),
    }
}

impl CacheBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn load(&self, key: &str) -> AppResult<Option<CacheEntry>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT payload, fetched_at, ttl_seconds, origin FROM cache_entries WHERE key = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| AppError::Cache(format!("Failed to read cache row: {}", e)))?;

        let Some((payload, fetched_at, ttl_seconds, origin)) = row else {
            return Ok(None);
        };

        let payload = serde_json::from_str(&payload)
            .map_err(|e| AppError::Cache(format!("Corrupt cache payload for {}: {}", key, e)))?;
        let fetched_at = parse_fetched_at(key, &fetched_at)?;

        Ok(Some(CacheEntry {
            key: key.to_string(),
            payload,
            fetched_at,
            ttl_seconds: ttl_seconds.max(0) as u64,
            origin: origin_from_str(&origin)?,
        }))
    }

    fn store(&self, entry: &CacheEntry) -> AppResult<()> {
        let payload = serde_json::to_string(&entry.payload)
            .map_err(|e| AppError::Cache(format!("Failed to serialize cache payload: {}", e)))?;

        self.conn()
            .execute(
                "INSERT OR REPLACE INTO cache_entries (key, payload, fetched_at, ttl_seconds, origin)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.key,
                    payload,
                    entry.fetched_at.to_rfc3339(),
                    entry.ttl_seconds.min(i64::MAX as u64) as i64,
                    origin_to_str(entry.origin),
                ],
            )
            .map_err(|e| AppError::Cache(format!("Failed to write cache row: {}", e)))?;

        Ok(())
    }

    fn remove_if_stale(&self, key: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let conn = self.conn();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT fetched_at, ttl_seconds FROM cache_entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| AppError::Cache(format!("Failed to read cache row: {}", e)))?;

        let Some((fetched_at, ttl_seconds)) = row else {
            return Ok(false);
        };
        let snapshot = CacheEntry {
            key: key.to_string(),
            payload: Vec::new(),
            fetched_at: parse_fetched_at(key, &fetched_at)?,
            ttl_seconds: ttl_seconds.max(0) as u64,
            origin: Origin::Live,
        };
        if !snapshot.is_stale_at(now) {
            return Ok(false);
        }

        // Still holding the connection, so no fill can land in between
        delete_row(&conn, key)?;
        Ok(true)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let keys: Vec<String> = {
            let conn = self.conn();
            let mut stmt = conn
                .prepare("SELECT key FROM cache_entries")
                .map_err(|e| AppError::Cache(format!("Failed to prepare purge: {}", e)))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| AppError::Cache(format!("Failed to list cache rows: {}", e)))?;
            rows.collect::<Result<_, _>>()
                .map_err(|e| AppError::Cache(format!("Failed to list cache rows: {}", e)))?
        };

        let mut purged = 0;
        for key in keys {
            // Unreadable rows are purged too
            let stale = match self.load(&key) {
                Ok(Some(entry)) => entry.is_stale_at(now),
                Ok(None) => false,
                Err(_) => true,
            };
            if stale {
                delete_row(&self.conn(), &key)?;
                purged += 1;
            }
        }

        Ok(purged)
    }

    fn len(&self) -> AppResult<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))
            .map_err(|e| AppError::Cache(format!("Failed to count cache rows: {}", e)))?;
        Ok(count.max(0) as usize)
    }
}
