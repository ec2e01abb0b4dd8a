//! District-wise annual rainfall from data.gov.in (India Meteorological Department).

use super::datagov::{field_f64, field_str, field_year, DataGovClient, RawRecord};
use crate::client::DataSource;
use crate::types::{title_case, DataRecord, EntityKey, Metric, Origin, ProviderId, ProviderRequest};
use chrono::Utc;
use samarth_core::{AppError, AppResult};
use std::sync::Arc;

const STATE_FIELDS: &[&str] = &["state", "state_name", "subdivision"];
const DISTRICT_FIELDS: &[&str] = &["district", "district_name"];
const YEAR_FIELDS: &[&str] = &["year"];
const RAINFALL_FIELDS: &[&str] = &["annual", "annual_rainfall", "rainfall_mm"];
const TEMPERATURE_FIELDS: &[&str] = &["temperature", "temperature_avg", "annual_mean_temp"];

/// Rainfall and temperature source.
#[derive(Debug, Clone)]
pub struct ClimateSource {
    client: Arc<DataGovClient>,
    resource_id: String,
}

impl ClimateSource {
    pub fn new(client: Arc<DataGovClient>, resource_id: impl Into<String>) -> Self {
        Self {
            client,
            resource_id: resource_id.into(),
        }
    }
}

#[async_trait::async_trait]
impl DataSource for ClimateSource {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Climate
    }

    fn name(&self) -> &str {
        "data.gov.in/climate"
    }

    async fn fetch_live(&self, request: &ProviderRequest) -> AppResult<Vec<DataRecord>> {
        let response = self
            .client
            .fetch_resource(ProviderId::Climate.as_str(), &self.resource_id, &request.filters)
            .await?;

        let records = normalize(&response.records, &response.cited_url);
        if records.is_empty() && !response.records.is_empty() {
            return Err(AppError::ProviderMalformedResponse {
                provider: ProviderId::Climate.to_string(),
                message: "no row carried a state and an annual rainfall figure".to_string(),
            });
        }

        Ok(request.filters.select(records))
    }
}

pub fn normalize(rows: &[RawRecord], dataset_url: &str) -> Vec<DataRecord> {
    let observed_at = Utc::now();

    rows.iter()
        .filter_map(|row| {
            let state = title_case(&field_str(row, STATE_FIELDS)?);
            let district = field_str(row, DISTRICT_FIELDS).map(|d| title_case(&d));
            let year = field_year(row, YEAR_FIELDS);
            let rainfall = field_f64(row, RAINFALL_FIELDS)?;
            let temperature = field_f64(row, TEMPERATURE_FIELDS);

            let make = |metric: Metric, value: f64| DataRecord {
                source_provider: ProviderId::Climate,
                entity_key: EntityKey {
                    location: state.clone(),
                    crop: None,
                    year,
                    metric,
                },
                district: district.clone(),
                value,
                unit: metric.unit().to_string(),
                observed_at,
                dataset_url: dataset_url.to_string(),
                ministry_name: ProviderId::Climate.ministry_name().to_string(),
                origin: Origin::Live,
            };

            let mut out = vec![make(Metric::RainfallMm, rainfall)];
            if let Some(t) = temperature {
                out.push(make(Metric::TemperatureC, t));
            }
            Some(out)
        })
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_rainfall_rows() {
        let rows = crate::providers::datagov::parse_records(
            "climate",
            json!({"records": [
                {"state": "PUNJAB", "district": "Ludhiana", "year": "2023", "annual": "709"},
                {"state": "Punjab", "district": "Amritsar", "year": 2023, "annual": 632, "temperature": 24.1},
                {"state": "Punjab", "district": "Patiala"}
            ]}),
        )
        .unwrap();

        let records = normalize(&rows, "https://api.data.gov.in/resource/r");

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.entity_key.crop.is_none()));
        assert_eq!(records[0].entity_key.location, "Punjab");
        assert_eq!(records[0].value, 709.0);
        assert_eq!(records[2].entity_key.metric, Metric::TemperatureC);
        assert_eq!(records[2].ministry_name, "India Meteorological Department");
    }
}
