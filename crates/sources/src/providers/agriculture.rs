//! Crop production statistics from data.gov.in.
//!
//! Portal rows carry state, district, crop (or commodity), year and any of
//! production, area and modal price. Each present measurement becomes one
//! `DataRecord`, so a single row can yield up to three records.

use super::datagov::{field_f64, field_str, field_year, DataGovClient, RawRecord};
use crate::client::DataSource;
use crate::types::{title_case, DataRecord, EntityKey, FilterParams, Metric, Origin, ProviderId, ProviderRequest};
use chrono::Utc;
use samarth_core::{AppError, AppResult};
use std::sync::Arc;

const STATE_FIELDS: &[&str] = &["state", "state_name"];
const DISTRICT_FIELDS: &[&str] = &["district", "district_name"];
const CROP_FIELDS: &[&str] = &["crop", "commodity"];
const YEAR_FIELDS: &[&str] = &["crop_year", "year", "arrival_date"];
const PRODUCTION_FIELDS: &[&str] = &["production", "production_tonnes", "production_in_tonnes"];
const AREA_FIELDS: &[&str] = &["area", "area_hectares", "area_in_hectares"];
const PRICE_FIELDS: &[&str] = &["modal_price", "market_price"];

/// Agricultural production source.
#[derive(Debug, Clone)]
pub struct AgricultureSource {
    client: Arc<DataGovClient>,
    resource_id: String,
}

impl AgricultureSource {
    pub fn new(client: Arc<DataGovClient>, resource_id: impl Into<String>) -> Self {
        Self {
            client,
            resource_id: resource_id.into(),
        }
    }
}

#[async_trait::async_trait]
impl DataSource for AgricultureSource {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Agriculture
    }

    fn name(&self) -> &str {
        "data.gov.in/agriculture"
    }

    async fn fetch_live(&self, request: &ProviderRequest) -> AppResult<Vec<DataRecord>> {
        let response = self
            .client
            .fetch_resource(ProviderId::Agriculture.as_str(), &self.resource_id, &request.filters)
            .await?;

        let records = normalize(&response.records, &request.filters, &response.cited_url);
        if records.is_empty() && !response.records.is_empty() {
            return Err(AppError::ProviderMalformedResponse {
                provider: ProviderId::Agriculture.to_string(),
                message: format!(
                    "none of {} rows carried a state and a measurement",
                    response.records.len()
                ),
            });
        }

        Ok(request.filters.select(records))
    }
}

/// Normalize raw rows into records. Rows without a state or any measurement are skipped.
pub fn normalize(rows: &[RawRecord], filters: &FilterParams, dataset_url: &str) -> Vec<DataRecord> {
    let observed_at = Utc::now();
    let mut records = Vec::new();

    for row in rows {
        let Some(state) = field_str(row, STATE_FIELDS) else {
            continue;
        };
        let crop = field_str(row, CROP_FIELDS).map(|c| filters.canonical_crop(&c));
        let year = field_year(row, YEAR_FIELDS);
        let district = field_str(row, DISTRICT_FIELDS).map(|d| title_case(&d));

        let measurements = [
            (Metric::ProductionTonnes, field_f64(row, PRODUCTION_FIELDS)),
            (Metric::AreaHectares, field_f64(row, AREA_FIELDS)),
            (Metric::ModalPricePerQuintal, field_f64(row, PRICE_FIELDS)),
        ];

        for (metric, value) in measurements {
            let Some(value) = value else { continue };
            records.push(DataRecord {
                source_provider: ProviderId::Agriculture,
                entity_key: EntityKey {
                    location: title_case(&state),
                    crop: crop.clone(),
                    year,
                    metric,
                },
                district: district.clone(),
                value,
                unit: metric.unit().to_string(),
                observed_at,
                dataset_url: dataset_url.to_string(),
                ministry_name: ProviderId::Agriculture.ministry_name().to_string(),
                origin: Origin::Live,
            });
        }
    }

    records
}
