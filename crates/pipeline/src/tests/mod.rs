//! Scenario tests that run whole questions through the engine against mock sources.

mod caching;

use crate::audit::AuditLog;
use crate::engine::QueryEngine;
use samarth_core::config::QualityConfig;
use samarth_narrative::TemplateSet;
use samarth_sources::providers::MockSource;
use samarth_sources::{AdapterSet, CacheStore, DataSource, FetchPolicy, ProviderId};
use std::sync::Arc;
use std::time::Duration;

/// Policy with short timeouts and retry delays.
pub(crate) fn fast_policy() -> FetchPolicy {
    FetchPolicy {
        timeout: Duration::from_millis(200),
        retry_base_delay: Duration::from_millis(5),
        ..FetchPolicy::default()
    }
}

/// Healthy mocks for all three providers.
pub(crate) fn healthy_sources() -> (Arc<MockSource>, Arc<MockSource>, Arc<MockSource>) {
    (
        Arc::new(MockSource::new(ProviderId::Agriculture)),
        Arc::new(MockSource::new(ProviderId::Climate)),
        Arc::new(MockSource::new(ProviderId::MarketPrices)),
    )
}

/// Engine over `sources` with an in-memory cache and audit log.
pub(crate) fn engine(sources: Vec<Arc<dyn DataSource>>, request_timeout: Duration) -> QueryEngine {
    let adapters = AdapterSet::new(sources, Arc::new(CacheStore::in_memory()), fast_policy());
    QueryEngine::new(
        adapters,
        TemplateSet::builtin().unwrap(),
        QualityConfig::default(),
        Arc::new(AuditLog::in_memory()),
        request_timeout,
    )
}
