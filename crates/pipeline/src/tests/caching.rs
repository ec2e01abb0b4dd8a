//! Tests for cache reuse across questions.

use super::{engine, fast_policy, healthy_sources};
use crate::audit::AuditLog;
use crate::engine::QueryEngine;
use chrono::Utc;
use samarth_core::config::QualityConfig;
use samarth_narrative::TemplateSet;
use samarth_sources::providers::MockSource;
use samarth_sources::{AdapterSet, CacheStore, DataSource, ManualClock, Origin, ProviderId};
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_clock(source: Arc<MockSource>, clock: Arc<ManualClock>) -> QueryEngine {
        let cache = CacheStore::in_memory().with_clock(clock);
        let sources: Vec<Arc<dyn DataSource>> = vec![source];
        QueryEngine::new(
            AdapterSet::new(sources, Arc::new(cache), fast_policy()),
            TemplateSet::builtin().unwrap(),
            QualityConfig::default(),
            Arc::new(AuditLog::in_memory()),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_repeated_question_is_served_from_cache() {
        let (agri, climate, market) = healthy_sources();
        let sources: Vec<Arc<dyn DataSource>> = vec![agri.clone(), climate, market];
        let engine = engine(sources, Duration::from_secs(5));

        let first = engine.answer("rice production in Punjab").await.unwrap();
        let second = engine.answer("Rice production in Punjab").await.unwrap();

        assert_eq!(agri.live_calls(), 1);
        assert!(!first.provenance[0].cache_hit);
        assert!(second.provenance[0].cache_hit);
        assert_eq!(first.supporting_records.len(), second.supporting_records.len());

        let health = engine.audit().health(Utc::now()).unwrap();
        assert_eq!(health.queries, 2);
        assert_eq!(health.cache_hit_rate, 0.5);
        assert_eq!(health.success_rate, 1.0);
    }

    #[tokio::test]
    async fn test_concurrent_questions_share_one_live_call() {
        let agri = Arc::new(MockSource::new(ProviderId::Agriculture).with_delay(Duration::from_millis(50)));
        let sources: Vec<Arc<dyn DataSource>> = vec![agri.clone()];
        let engine = engine(sources, Duration::from_secs(5));

        let (a, b) = tokio::join!(
            engine.answer("wheat production in Haryana"),
            engine.answer("wheat production in Haryana"),
        );

        assert_eq!(agri.live_calls(), 1);
        assert_eq!(a.unwrap().supporting_records.len(), b.unwrap().supporting_records.len());
    }

    #[tokio::test]
    async fn test_cached_fallback_expires_and_live_data_returns() {
        let agri = Arc::new(MockSource::new(ProviderId::Agriculture).fail_times(2));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = engine_with_clock(agri.clone(), clock.clone());

        let degraded = engine.answer("rice production in Punjab").await.unwrap();
        assert_eq!(degraded.provenance[0].origin, Origin::Fallback);
        assert_eq!(agri.live_calls(), 2);

        // Still within the fallback TTL
        let cached = engine.answer("rice production in Punjab").await.unwrap();
        assert!(cached.provenance[0].cache_hit);
        assert_eq!(cached.provenance[0].origin, Origin::Fallback);
        assert_eq!(agri.live_calls(), 2);

        clock.advance(fast_policy().fallback_ttl_secs as i64 + 1);

        let recovered = engine.answer("rice production in Punjab").await.unwrap();
        assert_eq!(recovered.provenance[0].origin, Origin::Live);
        assert!(!recovered.uses_fallback());
        assert_eq!(agri.live_calls(), 3);
    }
}
