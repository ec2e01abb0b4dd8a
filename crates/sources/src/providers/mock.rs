//! Mock data source for testing and offline development.
//!
//! Serves the sample dataset as if it came from the portal, counts live calls
//! and can be scripted to fail or stall.

use crate::client::DataSource;
use crate::types::{DataRecord, FilterParams, Origin, ProviderId, ProviderRequest, YearScope};
use samarth_core::{AppError, AppResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    Unavailable,
    Malformed,
    MissingCredentials,
}

/// Mock provider with a live-call counter.
#[derive(Debug)]
pub struct MockSource {
    provider: ProviderId,
    records: Option<Vec<DataRecord>>,
    calls: AtomicUsize,
    /// Remaining calls that fail; `usize::MAX` fails forever
    failures_left: AtomicUsize,
    failure_mode: FailureMode,
    delay: Option<Duration>,
}

impl MockSource {
    /// Healthy source serving the sample dataset for `provider`.
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            records: None,
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            failure_mode: FailureMode::Unavailable,
            delay: None,
        }
    }

    /// Serve exactly these records (filters still apply).
    pub fn with_records(mut self, records: Vec<DataRecord>) -> Self {
        self.records = Some(records);
        self
    }

    /// Fail the next `n` live calls, then recover.
    pub fn fail_times(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Fail every live call.
    pub fn always_failing(self) -> Self {
        self.fail_times(usize::MAX)
    }

    /// Fail every live call with an unparseable payload.
    pub fn malformed(mut self) -> Self {
        self.failure_mode = FailureMode::Malformed;
        self.always_failing()
    }

    /// Behave like a portal source with no API key.
    pub fn without_credentials(mut self) -> Self {
        self.failure_mode = FailureMode::MissingCredentials;
        self.always_failing()
    }

    /// Stall every live call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of live calls made so far.
    pub fn live_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok()
    }

    fn error(&self) -> AppError {
        let provider = self.provider.to_string();
        match self.failure_mode {
            FailureMode::Unavailable => AppError::ProviderUnavailable {
                provider,
                message: "API error (503 Service Unavailable)".to_string(),
            },
            FailureMode::Malformed => AppError::ProviderMalformedResponse {
                provider,
                message: "response has no records".to_string(),
            },
            FailureMode::MissingCredentials => AppError::ProviderMissingCredentials { provider },
        }
    }

    /// Sample data re-labelled as portal data, one dataset URL per state.
    fn sample_records(&self, filters: &FilterParams) -> Vec<DataRecord> {
        let mut sample_filters = filters.clone();
        if sample_filters.years == YearScope::Latest {
            sample_filters.years = YearScope::All;
        }
        let request = ProviderRequest::new(self.provider, sample_filters);

        crate::fallback::generate(&request)
            .into_iter()
            .map(|mut record| {
                record.origin = Origin::Live;
                record.dataset_url = format!(
                    "https://api.data.gov.in/resource/mock-{}?filters[state]={}",
                    self.provider,
                    record.entity_key.location.replace(' ', "+")
                );
                record
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl DataSource for MockSource {
    fn provider_id(&self) -> ProviderId {
        self.provider
    }

    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_live(&self, request: &ProviderRequest) -> AppResult<Vec<DataRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.take_failure() {
            return Err(self.error());
        }

        let records = match &self.records {
            Some(records) => records.clone(),
            None => self.sample_records(&request.filters),
        };

        Ok(request.filters.select(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_calls_and_scripts_failures() {
        let source = MockSource::new(ProviderId::Agriculture).fail_times(1);
        let request = ProviderRequest::new(ProviderId::Agriculture, FilterParams::all_india());

        assert!(source.fetch_live(&request).await.is_err());
        let records = source.fetch_live(&request).await.unwrap();

        assert_eq!(source.live_calls(), 2);
        assert!(!records.is_empty());
        assert!(records.iter().all(|r| r.origin == Origin::Live));
    }

    #[tokio::test]
    async fn test_latest_scope_selects_latest_year() {
        let source = MockSource::new(ProviderId::Climate);
        let request = ProviderRequest::new(ProviderId::Climate, FilterParams::all_india());

        let records = source.fetch_live(&request).await.unwrap();
        let years: std::collections::BTreeSet<_> =
            records.iter().filter_map(|r| r.entity_key.year).collect();
        assert_eq!(years.len(), 1);
    }

    #[tokio::test]
    async fn test_always_failing_never_recovers() {
        let source = MockSource::new(ProviderId::Climate).malformed();
        let request = ProviderRequest::new(ProviderId::Climate, FilterParams::all_india());

        for _ in 0..3 {
            let err = source.fetch_live(&request).await.unwrap_err();
            assert!(matches!(err, AppError::ProviderMalformedResponse { .. }));
        }
    }
}
