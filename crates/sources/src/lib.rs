//! Data provider crate for Samarth.
//!
//! This crate owns everything between a planned `ProviderRequest` and the
//! normalized `DataRecord`s it yields:
//!
//! - The common record schema (`types`)
//! - The time-boxed Cache Store with per-key fill locks (`cache`)
//! - The `DataSource` trait and the data.gov.in implementations (`providers`)
//! - Deterministic fallback datasets (`fallback`)
//! - The district to state table used for portal filters (`places`)
//! - The adapter that applies cache, timeout, retry and fallback policy (`adapter`)
//!
//! # Example
//! ```no_run
//! use samarth_sources::{create_adapters, create_cache, FilterParams, ProviderId, ProviderRequest};
//! use samarth_core::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load()?;
//! let adapters = create_adapters(&config, create_cache(&config)?)?;
//! let request = ProviderRequest::new(ProviderId::Agriculture, FilterParams::all_india());
//! let outcome = adapters.get(ProviderId::Agriculture)?.fetch(&request).await;
//! println!("{} records ({})", outcome.records.len(), outcome.origin);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod cache;
pub mod client;
pub mod factory;
pub mod fallback;
pub mod places;
pub mod providers;
pub mod types;

pub use adapter::{FetchOutcome, FetchPolicy, ProviderAdapter, ProviderFailure};
pub use cache::{CacheEntry, CacheStore, Clock, ManualClock, SystemClock};
pub use client::DataSource;
pub use factory::{create_adapters, create_cache, create_sources, AdapterSet};
pub use types::{
    DataRecord, EntityKey, FilterParams, Metric, Origin, ProviderId, ProviderRequest, YearScope,
};
