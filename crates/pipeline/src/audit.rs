//! Audit trail and system health.
//!
//! Every answered question and every source access is recorded. Entries are
//! kept in memory and, when a path is configured, appended to a JSON-lines
//! file so the `audit` and `health` commands can read them back in a later
//! process.
//!
//! Only the most recent `capacity` events are retained. Older events are
//! dropped from memory as new ones arrive, and the file is compacted to the
//! retained tail whenever it is opened with more lines than that.

use crate::types::{ConfidenceLabel, QueryDescriptor, QueryType};
use chrono::{DateTime, Duration, Utc};
use samarth_core::{AppError, AppResult};
use samarth_sources::{Origin, ProviderId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// One answered (or rejected) question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEvent {
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    pub question: String,
    pub query_type: QueryType,
    pub locations: Vec<String>,
    pub crops: Vec<String>,
    pub years: Vec<i32>,
    pub sources: Vec<ProviderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceLabel>,
    pub response_time_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryEvent {
    pub fn new(request_id: Uuid, descriptor: &QueryDescriptor) -> Self {
        Self {
            timestamp: Utc::now(),
            request_id,
            question: descriptor.raw_text.clone(),
            query_type: descriptor.query_type,
            locations: descriptor.locations.iter().cloned().collect(),
            crops: descriptor.crops.iter().cloned().collect(),
            years: descriptor.years.iter().copied().collect(),
            sources: Vec::new(),
            confidence: None,
            response_time_ms: 0,
            success: false,
            error: None,
        }
    }
}

/// One provider call made for a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEvent {
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    pub provider: ProviderId,
    pub cache_key: String,
    pub origin: Origin,
    pub cache_hit: bool,
    pub record_count: usize,
    /// Live data was served
    pub success: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    Query(QueryEvent),
    SourceAccess(SourceEvent),
}

impl AuditEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Query(e) => e.timestamp,
            Self::SourceAccess(e) => e.timestamp,
        }
    }
}

/// Health over a recent window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub window_minutes: i64,
    pub queries: usize,
    pub success_rate: f64,
    pub avg_response_time_ms: f64,
    pub data_sources_accessed: usize,
    pub cache_hit_rate: f64,
    pub fallback_rate: f64,
    pub total_records_processed: usize,
}

/// Everything in the log plus current health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditExport {
    pub export_timestamp: DateTime<Utc>,
    pub version: String,
    pub queries: Vec<QueryEvent>,
    pub data_sources: Vec<SourceEvent>,
    pub health: SystemHealth,
}

/// Events retained by default.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Append-only audit log holding the most recent events.
#[derive(Debug)]
pub struct AuditLog {
    path: Option<PathBuf>,
    capacity: usize,
    entries: Mutex<VecDeque<AuditEvent>>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl AuditLog {
    /// Log kept in memory only.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// In-memory log retaining at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            path: None,
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Log persisted to `path`, loading any entries already there.
    ///
    /// Unparseable lines are skipped with a warning.
    pub fn open(path: &Path) -> AppResult<Self> {
        Self::open_with_capacity(path, DEFAULT_CAPACITY)
    }

    /// Like `open`, retaining at most `capacity` events.
    pub fn open_with_capacity(path: &Path, capacity: usize) -> AppResult<Self> {
        let capacity = capacity.max(1);
        let mut entries = VecDeque::new();
        let mut lines = 0usize;

        if path.exists() {
            let file = std::fs::File::open(path)?;
            for (number, line) in BufReader::new(file).lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                lines += 1;
                match serde_json::from_str::<AuditEvent>(&line) {
                    Ok(event) => {
                        if entries.len() == capacity {
                            entries.pop_front();
                        }
                        entries.push_back(event);
                    }
                    Err(e) => tracing::warn!("Skipping audit line {} in {:?}: {}", number + 1, path, e),
                }
            }
        }

        if lines > entries.len() {
            compact(path, &entries)?;
            tracing::debug!("Compacted {:?} from {} to {} lines", path, lines, entries.len());
        }

        Ok(Self {
            path: Some(path.to_path_buf()),
            capacity,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record an event in memory and append it to the file.
    pub fn record(&self, event: AuditEvent) -> AppResult<()> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{}", line)?;
        }

        let mut entries = self.lock()?;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(event);
        Ok(())
    }

    /// The `limit` most recent events, newest first.
    pub fn recent(&self, limit: usize) -> AppResult<Vec<AuditEvent>> {
        let entries = self.lock()?;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Health over the hour before `now`.
    pub fn health(&self, now: DateTime<Utc>) -> AppResult<SystemHealth> {
        let window = Duration::hours(1);
        let since = now - window;
        let entries = self.lock()?;

        let queries: Vec<&QueryEvent> = entries
            .iter()
            .filter_map(|e| match e {
                AuditEvent::Query(q) if q.timestamp > since => Some(q),
                _ => None,
            })
            .collect();
        let sources: Vec<&SourceEvent> = entries
            .iter()
            .filter_map(|e| match e {
                AuditEvent::SourceAccess(s) if s.timestamp > since => Some(s),
                _ => None,
            })
            .collect();

        let rate = |hits: usize, total: usize| if total == 0 { 0.0 } else { hits as f64 / total as f64 };

        Ok(SystemHealth {
            window_minutes: window.num_minutes(),
            queries: queries.len(),
            success_rate: rate(queries.iter().filter(|q| q.success).count(), queries.len()),
            avg_response_time_ms: if queries.is_empty() {
                0.0
            } else {
                queries.iter().map(|q| q.response_time_ms as f64).sum::<f64>() / queries.len() as f64
            },
            data_sources_accessed: sources.iter().map(|s| s.provider).collect::<BTreeSet<_>>().len(),
            cache_hit_rate: rate(sources.iter().filter(|s| s.cache_hit).count(), sources.len()),
            fallback_rate: rate(
                sources.iter().filter(|s| s.origin == Origin::Fallback).count(),
                sources.len(),
            ),
            total_records_processed: sources.iter().map(|s| s.record_count).sum(),
        })
    }

    /// Full export with health as of `now`.
    pub fn export(&self, now: DateTime<Utc>) -> AppResult<AuditExport> {
        let health = self.health(now)?;
        let entries = self.lock()?;

        let mut queries = Vec::new();
        let mut data_sources = Vec::new();
        for entry in entries.iter() {
            match entry {
                AuditEvent::Query(q) => queries.push(q.clone()),
                AuditEvent::SourceAccess(s) => data_sources.push(s.clone()),
            }
        }

        Ok(AuditExport {
            export_timestamp: now,
            version: env!("CARGO_PKG_VERSION").to_string(),
            queries,
            data_sources,
            health,
        })
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, VecDeque<AuditEvent>>> {
        self.entries
            .lock()
            .map_err(|_| AppError::InternalInconsistency("audit log lock poisoned".to_string()))
    }
}

/// Rewrite `path` with exactly `entries`, replacing the file in one rename.
fn compact(path: &Path, entries: &VecDeque<AuditEvent>) -> AppResult<()> {
    let staging = path.with_extension("jsonl.tmp");
    {
        let mut file = std::fs::File::create(&staging)?;
        for event in entries {
            writeln!(file, "{}", serde_json::to_string(event)?)?;
        }
        file.sync_all()?;
    }
    std::fs::rename(&staging, path)?;
    Ok(())
}
