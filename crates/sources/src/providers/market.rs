//! Daily mandi prices from data.gov.in (Agmarknet feed).

use super::datagov::{field_f64, field_str, field_year, DataGovClient, RawRecord};
use crate::client::DataSource;
use crate::types::{title_case, DataRecord, EntityKey, FilterParams, Metric, Origin, ProviderId, ProviderRequest};
use chrono::Utc;
use samarth_core::{AppError, AppResult};
use std::sync::Arc;

/// Mandi modal price source. Price-sensitive: cached with the shorter TTL.
#[derive(Debug, Clone)]
pub struct MarketPriceSource {
    client: Arc<DataGovClient>,
    resource_id: String,
}

impl MarketPriceSource {
    pub fn new(client: Arc<DataGovClient>, resource_id: impl Into<String>) -> Self {
        Self {
            client,
            resource_id: resource_id.into(),
        }
    }
}

#[async_trait::async_trait]
impl DataSource for MarketPriceSource {
    fn provider_id(&self) -> ProviderId {
        ProviderId::MarketPrices
    }

    fn name(&self) -> &str {
        "data.gov.in/market_prices"
    }

    async fn fetch_live(&self, request: &ProviderRequest) -> AppResult<Vec<DataRecord>> {
        let response = self
            .client
            .fetch_resource(ProviderId::MarketPrices.as_str(), &self.resource_id, &request.filters)
            .await?;

        let records = normalize(&response.records, &request.filters, &response.cited_url);
        if records.is_empty() && !response.records.is_empty() {
            return Err(AppError::ProviderMalformedResponse {
                provider: ProviderId::MarketPrices.to_string(),
                message: "no row carried a state, commodity and modal price".to_string(),
            });
        }

        Ok(request.filters.select(records))
    }
}

pub fn normalize(rows: &[RawRecord], filters: &FilterParams, dataset_url: &str) -> Vec<DataRecord> {
    let observed_at = Utc::now();

    rows.iter()
        .filter_map(|row| {
            let state = field_str(row, &["state"])?;
            let commodity = field_str(row, &["commodity", "crop"])?;
            let price = field_f64(row, &["modal_price", "price_per_quintal"])?;

            Some(DataRecord {
                source_provider: ProviderId::MarketPrices,
                entity_key: EntityKey {
                    location: title_case(&state),
                    crop: Some(filters.canonical_crop(&commodity)),
                    year: field_year(row, &["arrival_date", "date", "year"]),
                    metric: Metric::ModalPricePerQuintal,
                },
                district: field_str(row, &["district"]).map(|d| title_case(&d)),
                value: price,
                unit: Metric::ModalPricePerQuintal.unit().to_string(),
                observed_at,
                dataset_url: dataset_url.to_string(),
                ministry_name: ProviderId::MarketPrices.ministry_name().to_string(),
                origin: Origin::Live,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_mandi_rows() {
        let rows = crate::providers::datagov::parse_records(
            "market_prices",
            json!({"records": [
                {"state": "Maharashtra", "district": "Pune", "market": "Pune",
                 "commodity": "RICE", "arrival_date": "01/12/2023", "modal_price": "2850"},
                {"state": "Maharashtra", "commodity": "Onion"}
            ]}),
        )
        .unwrap();

        let records = normalize(&rows, &FilterParams::all_india(), "https://api.data.gov.in/resource/m");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity_key.crop.as_deref(), Some("Rice"));
        assert_eq!(records[0].entity_key.year, Some(2023));
        assert_eq!(records[0].unit, "₹/quintal");
    }
}
