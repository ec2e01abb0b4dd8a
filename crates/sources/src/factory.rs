//! Source and cache factory.
//!
//! Builds the Cache Store and one adapter per provider from application
//! configuration. No credentials is a valid configuration: the portal sources
//! are still created and every fetch degrades to fallback data.

use crate::adapter::{FetchPolicy, ProviderAdapter};
use crate::cache::CacheStore;
use crate::client::DataSource;
use crate::providers::{AgricultureSource, ClimateSource, DataGovClient, MarketPriceSource};
use crate::types::ProviderId;
use samarth_core::config::CacheBackendKind;
use samarth_core::{AppConfig, AppError, AppResult};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Create the Cache Store selected by configuration.
pub fn create_cache(config: &AppConfig) -> AppResult<Arc<CacheStore>> {
    let store = match config.cache.backend {
        CacheBackendKind::Memory => CacheStore::in_memory(),
        CacheBackendKind::Sqlite => CacheStore::sqlite(&config.cache_path())?,
    };
    tracing::debug!("Using {} cache backend", store.backend_name());
    Ok(Arc::new(store))
}

/// Create the three data.gov.in sources, sharing one HTTP client.
pub fn create_sources(config: &AppConfig) -> AppResult<Vec<Arc<dyn DataSource>>> {
    let client = Arc::new(DataGovClient::new(&config.sources)?);
    if !client.has_credentials() {
        tracing::warn!(
            "{} is not set; all sources will serve fallback data",
            config.sources.api_key_env
        );
    }

    let datasets = &config.sources.datasets;
    let sources: Vec<Arc<dyn DataSource>> = vec![
        Arc::new(AgricultureSource::new(client.clone(), &datasets.crop_production)),
        Arc::new(ClimateSource::new(client.clone(), &datasets.rainfall)),
        Arc::new(MarketPriceSource::new(client, &datasets.market_prices)),
    ];
    Ok(sources)
}

/// One adapter per provider, sharing a Cache Store.
#[derive(Debug, Clone)]
pub struct AdapterSet {
    adapters: BTreeMap<ProviderId, ProviderAdapter>,
    cache: Arc<CacheStore>,
}

impl AdapterSet {
    /// Wrap sources in adapters. A later source for the same provider replaces an earlier one.
    pub fn new(sources: Vec<Arc<dyn DataSource>>, cache: Arc<CacheStore>, policy: FetchPolicy) -> Self {
        let adapters = sources
            .into_iter()
            .map(|source| {
                let id = source.provider_id();
                (id, ProviderAdapter::new(source, cache.clone(), policy.clone()))
            })
            .collect();

        Self { adapters, cache }
    }

    pub fn get(&self, provider: ProviderId) -> AppResult<&ProviderAdapter> {
        self.adapters.get(&provider).ok_or_else(|| {
            AppError::InternalInconsistency(format!("No adapter registered for {}", provider))
        })
    }

    pub fn providers(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.adapters.keys().copied()
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }
}

/// Build the full adapter set from configuration.
pub fn create_adapters(config: &AppConfig, cache: Arc<CacheStore>) -> AppResult<AdapterSet> {
    let sources = create_sources(config)?;
    Ok(AdapterSet::new(sources, cache, FetchPolicy::from_config(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockSource;
    use tempfile::TempDir;

    #[test]
    fn test_create_adapters_without_credentials() {
        let config = AppConfig::default();
        let cache = Arc::new(CacheStore::in_memory());

        let set = create_adapters(&config, cache).unwrap();

        assert_eq!(set.providers().collect::<Vec<_>>(), ProviderId::ALL.to_vec());
        assert_eq!(
            set.get(ProviderId::Climate).unwrap().source_name(),
            "data.gov.in/climate"
        );
    }

    #[test]
    fn test_missing_adapter_is_inconsistency() {
        let set = AdapterSet::new(
            vec![Arc::new(MockSource::new(ProviderId::Agriculture))],
            Arc::new(CacheStore::in_memory()),
            FetchPolicy::default(),
        );
        assert!(matches!(
            set.get(ProviderId::Climate),
            Err(AppError::InternalInconsistency(_))
        ));
    }

    #[test]
    fn test_sqlite_cache_from_config() {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.workspace = temp.path().to_path_buf();
        config.cache.backend = CacheBackendKind::Sqlite;

        let cache = create_cache(&config).unwrap();

        assert_eq!(cache.backend_name(), "sqlite");
        assert!(temp.path().join(".samarth/cache.db").exists());
    }
}
