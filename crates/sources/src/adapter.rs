//! Cache-backed provider adapter.
//!
//! Wraps one `DataSource` with the fetch policy every provider shares:
//!
//! 1. Serve a non-stale cache entry if one exists.
//! 2. Otherwise take the key lock, re-check, and make the live call under a
//!    bounded timeout. Success is cached with the provider's TTL.
//! 3. On a retryable failure wait `base * 2` and try once more.
//! 4. If both attempts fail, serve the source's fallback dataset and cache it
//!    with the short fallback TTL.
//!
//! Failures never escape `fetch`; they are reported in the outcome.

use crate::cache::{CacheEntry, CacheStore};
use crate::client::DataSource;
use crate::types::{DataRecord, Origin, ProviderId, ProviderRequest};
use samarth_core::{AppConfig, AppError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Live attempts per fetch: the first call plus one retry
const MAX_ATTEMPTS: u32 = 2;

/// Timeouts, backoff and TTLs applied by every adapter.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub timeout: Duration,
    pub retry_base_delay: Duration,
    pub general_ttl_secs: u64,
    pub price_ttl_secs: u64,
    pub fallback_ttl_secs: u64,
}

impl FetchPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.sources.timeout_ms),
            retry_base_delay: Duration::from_millis(config.sources.retry_base_delay_ms),
            general_ttl_secs: config.cache.general_ttl_secs,
            price_ttl_secs: config.cache.price_ttl_secs,
            fallback_ttl_secs: config.cache.fallback_ttl_secs,
        }
    }

    /// TTL for a successful live response from `provider`.
    pub fn live_ttl(&self, provider: ProviderId) -> u64 {
        if provider.is_price_sensitive() {
            self.price_ttl_secs
        } else {
            self.general_ttl_secs
        }
    }

    /// Delay before retry number `attempt`.
    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base_delay * 2_u32.pow(attempt)
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// One absorbed provider failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFailure {
    /// Error class, e.g. `provider_timeout`
    pub kind: String,
    pub message: String,
    /// 1-based live attempt, or 0 for the request deadline
    pub attempt: u32,
}

impl ProviderFailure {
    fn from_error(error: &AppError, attempt: u32) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
            attempt,
        }
    }
}

/// Result of one adapter fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub provider: ProviderId,
    pub cache_key: String,
    pub records: Vec<Arc<DataRecord>>,
    pub origin: Origin,
    pub cache_hit: bool,
    pub failures: Vec<ProviderFailure>,
    pub elapsed_ms: u64,
}

impl FetchOutcome {
    fn from_entry(provider: ProviderId, entry: CacheEntry, started: Instant) -> Self {
        Self {
            provider,
            cache_key: entry.key,
            records: entry.payload,
            origin: entry.origin,
            cache_hit: true,
            failures: Vec::new(),
            elapsed_ms: elapsed_ms(started),
        }
    }
}

/// Cache-backed adapter around one data source.
#[derive(Clone)]
pub struct ProviderAdapter {
    source: Arc<dyn DataSource>,
    cache: Arc<CacheStore>,
    policy: FetchPolicy,
}

impl std::fmt::Debug for ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("source", &self.source.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl ProviderAdapter {
    pub fn new(source: Arc<dyn DataSource>, cache: Arc<CacheStore>, policy: FetchPolicy) -> Self {
        Self {
            source,
            cache,
            policy,
        }
    }

    pub fn provider_id(&self) -> ProviderId {
        self.source.provider_id()
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Fetch the records for `request`. Never fails.
    #[instrument(skip(self, request), fields(provider = %self.provider_id()))]
    pub async fn fetch(&self, request: &ProviderRequest) -> FetchOutcome {
        let started = Instant::now();
        let provider = self.provider_id();

        if let Some(entry) = self.cached(request) {
            debug!("Cache hit ({} records, {})", entry.payload.len(), entry.origin);
            return FetchOutcome::from_entry(provider, entry, started);
        }

        let _guard = self.cache.lock_key(&request.cache_key).await;

        // Another fetch for the same key may have filled it while we waited
        if let Some(entry) = self.cached(request) {
            debug!("Cache filled while waiting for key lock");
            return FetchOutcome::from_entry(provider, entry, started);
        }

        debug!("Cache miss, calling {}", self.source.name());
        let mut failures = Vec::new();

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                let delay = self.policy.backoff(attempt - 1);
                warn!(
                    "{} failed (attempt {}/{}), retrying in {}ms",
                    self.source.name(),
                    attempt - 1,
                    MAX_ATTEMPTS,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            match self.live_attempt(request).await {
                Ok(records) => {
                    let records = tag(records, Origin::Live);
                    self.commit(request, &records, self.policy.live_ttl(provider), Origin::Live);
                    debug!("Live call returned {} records", records.len());
                    return FetchOutcome {
                        provider,
                        cache_key: request.cache_key.clone(),
                        records,
                        origin: Origin::Live,
                        cache_hit: false,
                        failures,
                        elapsed_ms: elapsed_ms(started),
                    };
                }
                Err(e) => {
                    failures.push(ProviderFailure::from_error(&e, attempt));
                    if !e.is_retryable() {
                        debug!("Not retrying {}: {}", self.source.name(), e);
                        break;
                    }
                }
            }
        }

        if let Some(last) = failures.last() {
            warn!("{} unavailable, serving fallback data: {}", self.source.name(), last.message);
        }

        self.serve_fallback(request, failures, started)
    }

    /// Degrade a request whose fetch did not finish before the request deadline.
    ///
    /// Never waits: the deadline has already passed. A fresh entry committed
    /// by a concurrent fetch wins. Otherwise fallback data is served, and it
    /// is cached only when no other fetch is filling the key, so a slow live
    /// call still in flight is not overwritten.
    #[instrument(skip(self, request), fields(provider = %self.provider_id()))]
    pub fn degrade(&self, request: &ProviderRequest, deadline_ms: u64) -> FetchOutcome {
        let started = Instant::now();
        let error = AppError::ProviderTimeout {
            provider: self.provider_id().to_string(),
            timeout_ms: deadline_ms,
        };
        warn!("{}", error);
        let failures = vec![ProviderFailure::from_error(&error, 0)];

        if let Some(entry) = self.cached(request) {
            let mut outcome = FetchOutcome::from_entry(self.provider_id(), entry, started);
            outcome.failures = failures;
            return outcome;
        }

        match self.cache.try_lock_key(&request.cache_key) {
            Some(_guard) => {
                if let Some(entry) = self.cached(request) {
                    let mut outcome = FetchOutcome::from_entry(self.provider_id(), entry, started);
                    outcome.failures = failures;
                    return outcome;
                }
                self.serve_fallback(request, failures, started)
            }
            None => {
                debug!("Key is being filled elsewhere, serving uncached fallback");
                self.fallback_outcome(request, failures, started)
            }
        }
    }

    fn cached(&self, request: &ProviderRequest) -> Option<CacheEntry> {
        match self.cache.get(&request.cache_key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cache read failed, treating as miss: {}", e);
                None
            }
        }
    }

    async fn live_attempt(&self, request: &ProviderRequest) -> Result<Vec<DataRecord>, AppError> {
        match tokio::time::timeout(self.policy.timeout, self.source.fetch_live(request)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::ProviderTimeout {
                provider: self.provider_id().to_string(),
                timeout_ms: self.policy.timeout.as_millis() as u64,
            }),
        }
    }

    /// Serve fallback data and cache it with the fallback TTL. Callers hold
    /// the key lock.
    fn serve_fallback(
        &self,
        request: &ProviderRequest,
        failures: Vec<ProviderFailure>,
        started: Instant,
    ) -> FetchOutcome {
        let outcome = self.fallback_outcome(request, failures, started);
        self.commit(request, &outcome.records, self.policy.fallback_ttl_secs, Origin::Fallback);
        outcome
    }

    fn fallback_outcome(
        &self,
        request: &ProviderRequest,
        failures: Vec<ProviderFailure>,
        started: Instant,
    ) -> FetchOutcome {
        FetchOutcome {
            provider: self.provider_id(),
            cache_key: request.cache_key.clone(),
            records: tag(self.source.fallback(request), Origin::Fallback),
            origin: Origin::Fallback,
            cache_hit: false,
            failures,
            elapsed_ms: elapsed_ms(started),
        }
    }

    fn commit(&self, request: &ProviderRequest, records: &[Arc<DataRecord>], ttl: u64, origin: Origin) {
        if let Err(e) = self.cache.put(&request.cache_key, records.to_vec(), ttl, origin) {
            warn!("Failed to cache {} response: {}", self.provider_id(), e);
        }
    }
}

/// Stamp the batch origin onto every record.
fn tag(records: Vec<DataRecord>, origin: Origin) -> Vec<Arc<DataRecord>> {
    records
        .into_iter()
        .map(|mut record| {
            record.origin = origin;
            Arc::new(record)
        })
        .collect()
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
