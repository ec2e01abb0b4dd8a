//! Shared HTTP client for the data.gov.in open data API.
//!
//! API: `GET {base}/resource/{resource_id}?api-key=..&format=json&limit=N`
//! returning `{"records": [...]}`. Field names differ between resources and
//! over time, so values are read through alias lists.

use crate::places::portal_state;
use crate::types::FilterParams;
use reqwest::{Client, Url};
use samarth_core::config::SourcesConfig;
use samarth_core::{AppError, AppResult};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// One raw portal record.
pub type RawRecord = Map<String, Value>;

/// Records from one portal call, with the URL to cite for them.
#[derive(Debug, Clone)]
pub struct PortalResponse {
    /// Request URL without the API key
    pub cited_url: String,
    pub records: Vec<RawRecord>,
}

/// data.gov.in client shared by every portal-backed source.
#[derive(Debug, Clone)]
pub struct DataGovClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    record_limit: u32,
    timeout_ms: u64,
}

impl DataGovClient {
    pub fn new(config: &SourcesConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            record_limit: config.record_limit,
            timeout_ms: config.timeout_ms,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    /// Citable URL for a resource query. Never contains the API key.
    pub fn resource_url(&self, resource_id: &str, filters: &FilterParams) -> AppResult<Url> {
        let mut params = vec![
            ("format".to_string(), "json".to_string()),
            ("limit".to_string(), self.record_limit.to_string()),
        ];
        // The portal filters server-side on a single state only; districts
        // are narrowed locally after the response arrives
        if let Some(state) = portal_state(filters) {
            params.push(("filters[state]".to_string(), state));
        }

        Url::parse_with_params(&format!("{}/resource/{}", self.base_url, resource_id), &params)
            .map_err(|e| AppError::Config(format!("Invalid resource URL: {}", e)))
    }

    /// Query one resource.
    pub async fn fetch_resource(
        &self,
        provider: &str,
        resource_id: &str,
        filters: &FilterParams,
    ) -> AppResult<PortalResponse> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AppError::ProviderMissingCredentials {
                provider: provider.to_string(),
            });
        };

        let url = self.resource_url(resource_id, filters)?;
        debug!("Sending request to {}", url);

        let response = self
            .client
            .get(url.clone())
            .query(&[("api-key", api_key)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::ProviderTimeout {
                        provider: provider.to_string(),
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    AppError::ProviderUnavailable {
                        provider: provider.to_string(),
                        message: format!("Failed to send request: {}", e.without_url()),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ProviderUnavailable {
                provider: provider.to_string(),
                message: format!("API error ({})", status),
            });
        }

        let body: Value = response.json().await.map_err(|e| AppError::ProviderMalformedResponse {
            provider: provider.to_string(),
            message: format!("Failed to parse response: {}", e.without_url()),
        })?;

        let records = parse_records(provider, body)?;
        debug!("Portal returned {} raw records", records.len());

        Ok(PortalResponse {
            cited_url: url.to_string(),
            records,
        })
    }
}

/// Extract the record list from a portal response body.
pub fn parse_records(provider: &str, body: Value) -> AppResult<Vec<RawRecord>> {
    let malformed = |message: &str| AppError::ProviderMalformedResponse {
        provider: provider.to_string(),
        message: message.to_string(),
    };

    let Value::Object(mut body) = body else {
        return Err(malformed("response is not a JSON object"));
    };

    let list = body
        .remove("records")
        .or_else(|| body.remove("data"))
        .ok_or_else(|| malformed("response has no records"))?;

    let Value::Array(items) = list else {
        return Err(malformed("records is not an array"));
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect())
}

/// First non-empty string among `names`.
pub fn field_str(record: &RawRecord, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match record.get(*name)? {
        Value::String(s) if !s.trim().is_empty() && s.trim() != "NA" => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First numeric value among `names`; numeric strings like "1,250.5" count.
pub fn field_f64(record: &RawRecord, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|name| match record.get(*name)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    })
    .filter(|v| v.is_finite())
}

/// Year from fields like `2019`, `"2019"`, `"2019-20"` or `"01/12/2023"`.
pub fn field_year(record: &RawRecord, names: &[&str]) -> Option<i32> {
    names
        .iter()
        .find_map(|name| parse_year(&field_str(record, &[*name])?))
}

fn parse_year(raw: &str) -> Option<i32> {
    raw.split(|c: char| !c.is_ascii_digit())
        .filter(|part| part.len() == 4)
        .find_map(|part| part.parse::<i32>().ok())
        .filter(|year| (1900..=2100).contains(year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_resource_url_omits_key_and_adds_state_filter() {
        let mut config = SourcesConfig::default();
        config.api_key = Some("secret".to_string());
        let client = DataGovClient::new(&config).unwrap();

        let mut filters = FilterParams::all_india();
        filters.locations.insert("Punjab".to_string());

        let url = client.resource_url("abc", &filters).unwrap().to_string();
        assert!(url.starts_with("https://api.data.gov.in/resource/abc?"));
        assert!(url.contains("Punjab"));
        assert!(!url.contains("secret"));

        filters.locations.insert("Maharashtra".to_string());
        let url = client.resource_url("abc", &filters).unwrap().to_string();
        assert!(!url.contains("Punjab"));
    }

    #[test]
    fn test_district_is_sent_as_its_state() {
        let client = DataGovClient::new(&SourcesConfig::default()).unwrap();

        let mut filters = FilterParams::all_india();
        filters.locations.insert("Nashik".to_string());

        let url = client.resource_url("abc", &filters).unwrap();
        let state: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k == "filters[state]")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(state, vec![("filters[state]".to_string(), "Maharashtra".to_string())]);
        assert!(!url.as_str().contains("Nashik"));
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let client = DataGovClient::new(&SourcesConfig::default()).unwrap();
        let err = client
            .fetch_resource("agriculture", "abc", &FilterParams::all_india())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProviderMissingCredentials { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_records_requires_list() {
        assert_eq!(
            parse_records("x", json!({"records": [{"state": "Punjab"}, 3]})).unwrap().len(),
            1
        );
        assert!(parse_records("x", json!({"records": []})).unwrap().is_empty());
        assert!(matches!(
            parse_records("x", json!({"message": "rate limited"})),
            Err(AppError::ProviderMalformedResponse { .. })
        ));
        assert!(parse_records("x", json!([1, 2])).is_err());
    }

    #[test]
    fn test_field_helpers() {
        let record = raw(json!({
            "state": " Punjab ",
            "modal_price": "2,750",
            "annual": 709.5,
            "crop_year": "2019-20",
            "arrival_date": "01/12/2023",
            "district": "NA"
        }));

        assert_eq!(field_str(&record, &["state_name", "state"]).as_deref(), Some("Punjab"));
        assert_eq!(field_str(&record, &["district"]), None);
        assert_eq!(field_f64(&record, &["modal_price"]), Some(2750.0));
        assert_eq!(field_f64(&record, &["annual"]), Some(709.5));
        assert_eq!(field_year(&record, &["year", "crop_year"]), Some(2019));
        assert_eq!(field_year(&record, &["arrival_date"]), Some(2023));
    }
}
