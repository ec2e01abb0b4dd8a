//! Common record schema shared by every data provider.
//!
//! Each adapter normalizes its own response shape into `DataRecord`s keyed by
//! `EntityKey`, so the validator and assembler never see provider-specific
//! payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

/// External data domain reached through one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// Crop production statistics
    Agriculture,
    /// Rainfall and temperature
    Climate,
    /// Mandi modal prices
    MarketPrices,
}

impl ProviderId {
    /// Every provider, in plan order.
    pub const ALL: [ProviderId; 3] = [
        ProviderId::Agriculture,
        ProviderId::Climate,
        ProviderId::MarketPrices,
    ];

    /// Canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agriculture => "agriculture",
            Self::Climate => "climate",
            Self::MarketPrices => "market_prices",
        }
    }

    /// Parse provider id from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "agriculture" | "agri" | "production" => Some(Self::Agriculture),
            "climate" | "rainfall" => Some(Self::Climate),
            "market_prices" | "market" | "prices" => Some(Self::MarketPrices),
            _ => None,
        }
    }

    /// Price data goes stale faster and gets the shorter TTL.
    pub fn is_price_sensitive(&self) -> bool {
        matches!(self, Self::MarketPrices)
    }

    /// The metric a request to this provider is expected to return.
    pub fn primary_metric(&self) -> Metric {
        match self {
            Self::Agriculture => Metric::ProductionTonnes,
            Self::Climate => Metric::RainfallMm,
            Self::MarketPrices => Metric::ModalPricePerQuintal,
        }
    }

    /// Whether records from this provider carry a crop dimension.
    pub fn has_crop_dimension(&self) -> bool {
        !matches!(self, Self::Climate)
    }

    /// Publishing body cited for this provider's datasets.
    pub fn ministry_name(&self) -> &'static str {
        match self {
            Self::Agriculture | Self::MarketPrices => "Ministry of Agriculture & Farmers Welfare",
            Self::Climate => "India Meteorological Department",
        }
    }

    /// Human-readable domain name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Agriculture => "agricultural production",
            Self::Climate => "climate and rainfall",
            Self::MarketPrices => "market prices",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quantity a record measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ProductionTonnes,
    AreaHectares,
    RainfallMm,
    TemperatureC,
    ModalPricePerQuintal,
}

impl Metric {
    /// Unit string attached to every record of this metric.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::ProductionTonnes => "tonnes",
            Self::AreaHectares => "hectares",
            Self::RainfallMm => "mm",
            Self::TemperatureC => "°C",
            Self::ModalPricePerQuintal => "₹/quintal",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ProductionTonnes => "production",
            Self::AreaHectares => "cultivated area",
            Self::RainfallMm => "annual rainfall",
            Self::TemperatureC => "mean temperature",
            Self::ModalPricePerQuintal => "modal price",
        }
    }
}

/// Identity of a measurement: where, what crop, which year, which metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub metric: Metric,
}

/// Whether a record was genuinely fetched or synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Live,
    Fallback,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// One normalized measurement. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    pub source_provider: ProviderId,
    pub entity_key: EntityKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    pub value: f64,
    pub unit: String,
    pub observed_at: DateTime<Utc>,
    pub dataset_url: String,
    pub ministry_name: String,
    pub origin: Origin,
}

impl DataRecord {
    /// A place matches either the record's state or its district.
    pub fn matches_location(&self, place: &str) -> bool {
        self.entity_key.location.eq_ignore_ascii_case(place)
            || self
                .district
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(place))
    }

    /// Records without a crop dimension match every crop.
    pub fn matches_crop(&self, crop: &str) -> bool {
        match &self.entity_key.crop {
            Some(c) => crop_names_match(c, crop),
            None => true,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == Origin::Fallback
    }
}

/// Loose crop comparison: portal names such as "Rice (Paddy)" match "Rice".
pub fn crop_names_match(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    a == b || a.contains(&b) || b.contains(&a)
}

/// Which years a request asks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "years")]
pub enum YearScope {
    /// Only the most recent year present in the data
    Latest,
    /// Every year present in the data
    All,
    /// Exactly these years
    Listed(BTreeSet<i32>),
}

impl YearScope {
    fn canonical(&self) -> String {
        match self {
            Self::Latest => "latest".to_string(),
            Self::All => "all".to_string(),
            Self::Listed(years) => years
                .iter()
                .map(|y| y.to_string())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Keep the records this scope selects. Records without a year are kept.
    pub fn apply(&self, records: Vec<DataRecord>) -> Vec<DataRecord> {
        match self {
            Self::All => records,
            Self::Listed(years) => records
                .into_iter()
                .filter(|r| r.entity_key.year.map_or(true, |y| years.contains(&y)))
                .collect(),
            Self::Latest => {
                let latest = records.iter().filter_map(|r| r.entity_key.year).max();
                records
                    .into_iter()
                    .filter(|r| match (r.entity_key.year, latest) {
                        (Some(y), Some(max)) => y == max,
                        _ => true,
                    })
                    .collect()
            }
        }
    }
}

/// Filters derived from a query descriptor. Sets are ordered so that the
/// same descriptor always yields the same cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterParams {
    pub locations: BTreeSet<String>,
    pub crops: BTreeSet<String>,
    pub years: YearScope,
}

impl FilterParams {
    /// Most recent, all-India, every crop.
    pub fn all_india() -> Self {
        Self {
            locations: BTreeSet::new(),
            crops: BTreeSet::new(),
            years: YearScope::Latest,
        }
    }

    /// The location when exactly one is requested (pushed to the portal as a filter).
    pub fn single_location(&self) -> Option<&str> {
        if self.locations.len() == 1 {
            self.locations.iter().next().map(String::as_str)
        } else {
            None
        }
    }

    /// Map a raw crop name onto the requested spelling, or title-case it.
    pub fn canonical_crop(&self, raw: &str) -> String {
        self.crops
            .iter()
            .find(|c| crop_names_match(raw, c))
            .cloned()
            .unwrap_or_else(|| title_case(raw))
    }

    /// Apply location, crop and year filters locally.
    pub fn select(&self, records: Vec<DataRecord>) -> Vec<DataRecord> {
        let filtered = records
            .into_iter()
            .filter(|r| {
                self.locations.is_empty() || self.locations.iter().any(|l| r.matches_location(l))
            })
            .filter(|r| self.crops.is_empty() || self.crops.iter().any(|c| r.matches_crop(c)))
            .collect();

        self.years.apply(filtered)
    }

    fn canonical(&self) -> String {
        format!(
            "locations={};crops={};years={}",
            self.locations.iter().cloned().collect::<Vec<_>>().join(","),
            self.crops.iter().cloned().collect::<Vec<_>>().join(","),
            self.years.canonical()
        )
    }
}

/// One provider call planned for a question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub provider_id: ProviderId,
    pub filters: FilterParams,
    pub cache_key: String,
}

impl ProviderRequest {
    /// Build a request; the cache key is a SHA-256 of provider and filters.
    pub fn new(provider_id: ProviderId, filters: FilterParams) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(provider_id.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(filters.canonical().as_bytes());
        let cache_key = format!("{:x}", hasher.finalize());

        Self {
            provider_id,
            filters,
            cache_key,
        }
    }
}

/// "UTTAR PRADESH" -> "Uttar Pradesh"
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(location: &str, crop: Option<&str>, year: Option<i32>) -> DataRecord {
        DataRecord {
            source_provider: ProviderId::Agriculture,
            entity_key: EntityKey {
                location: location.to_string(),
                crop: crop.map(String::from),
                year,
                metric: Metric::ProductionTonnes,
            },
            district: Some("Pune".to_string()),
            value: 1.0,
            unit: "tonnes".to_string(),
            observed_at: Utc::now(),
            dataset_url: "https://data.gov.in/resource/x".to_string(),
            ministry_name: "Ministry".to_string(),
            origin: Origin::Live,
        }
    }

    #[test]
    fn test_provider_id_parsing() {
        assert_eq!(ProviderId::parse("climate"), Some(ProviderId::Climate));
        assert_eq!(ProviderId::parse("market"), Some(ProviderId::MarketPrices));
        assert_eq!(ProviderId::parse("unknown"), None);
        assert!(ProviderId::MarketPrices.is_price_sensitive());
        assert!(!ProviderId::Agriculture.is_price_sensitive());
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let mut filters = FilterParams::all_india();
        filters.locations.insert("Punjab".to_string());
        filters.locations.insert("Maharashtra".to_string());

        let a = ProviderRequest::new(ProviderId::Agriculture, filters.clone());
        let b = ProviderRequest::new(ProviderId::Agriculture, filters.clone());
        let c = ProviderRequest::new(ProviderId::Climate, filters);

        assert_eq!(a.cache_key, b.cache_key);
        assert_ne!(a.cache_key, c.cache_key);
        assert_eq!(a.cache_key.len(), 64);
    }

    #[test]
    fn test_location_matches_state_or_district() {
        let r = record("Maharashtra", Some("Rice"), Some(2023));
        assert!(r.matches_location("maharashtra"));
        assert!(r.matches_location("Pune"));
        assert!(!r.matches_location("Punjab"));
    }

    #[test]
    fn test_select_latest_year() {
        let filters = FilterParams::all_india();
        let selected = filters.select(vec![
            record("Punjab", Some("Wheat"), Some(2021)),
            record("Punjab", Some("Wheat"), Some(2023)),
            record("Punjab", Some("Rice"), Some(2023)),
        ]);
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().all(|r| r.entity_key.year == Some(2023)));
    }

    #[test]
    fn test_select_by_crop_and_listed_years() {
        let mut filters = FilterParams::all_india();
        filters.crops.insert("Rice".to_string());
        filters.years = YearScope::Listed([2021].into_iter().collect());

        let selected = filters.select(vec![
            record("Punjab", Some("Rice (Paddy)"), Some(2021)),
            record("Punjab", Some("Wheat"), Some(2021)),
            record("Punjab", Some("Rice"), Some(2023)),
        ]);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn test_canonical_crop() {
        let mut filters = FilterParams::all_india();
        filters.crops.insert("Rice".to_string());
        assert_eq!(filters.canonical_crop("RICE (PADDY)"), "Rice");
        assert_eq!(filters.canonical_crop("WHEAT"), "Wheat");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("UTTAR PRADESH"), "Uttar Pradesh");
        assert_eq!(title_case("tamil  nadu"), "Tamil Nadu");
    }
}
