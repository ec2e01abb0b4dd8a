//! Data source abstraction.
//!
//! A `DataSource` knows how to reach one external data domain and how to
//! synthesize a stand-in dataset for it. Caching, retries and origin tagging
//! are applied uniformly by `ProviderAdapter`, so implementations only deal
//! with their own wire format.

use crate::types::{DataRecord, ProviderId, ProviderRequest};
use samarth_core::AppResult;

/// Trait for external data providers.
///
/// This trait abstracts the underlying portal resource (crop production,
/// rainfall, mandi prices) behind a normalized record interface.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// Which provider slot this source fills.
    fn provider_id(&self) -> ProviderId;

    /// Get the source name used in logs (e.g., "data.gov.in/agriculture").
    fn name(&self) -> &str;

    /// Perform one live call and normalize the response.
    ///
    /// # Errors
    /// `ProviderTimeout`, `ProviderMalformedResponse`, `ProviderUnavailable`
    /// or `ProviderMissingCredentials`. The adapter absorbs all of them.
    async fn fetch_live(&self, request: &ProviderRequest) -> AppResult<Vec<DataRecord>>;

    /// Deterministic stand-in dataset for when the live call is unavailable.
    fn fallback(&self, request: &ProviderRequest) -> Vec<DataRecord> {
        crate::fallback::generate(request)
    }
}
