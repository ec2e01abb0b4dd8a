//! Validator and quality scorer.
//!
//! Scores the records returned for a plan on three axes:
//!
//! - **Completeness**: fraction of requested entity keys present. A request
//!   dimension left open (no location, no crop, no listed year) matches any
//!   record.
//! - **Plausibility**: fraction of records with no flag. A record is flagged
//!   when its value is outside the metric's bounds, lies more than three
//!   standard deviations from its peers (same provider, metric and crop, at
//!   least three values), or disagrees with another record from the same
//!   provider for the same entity key and district. Flagged records are
//!   kept, never dropped.
//! - **Cross-source agreement**: only when two providers report the same
//!   entity key; `1 - mean relative discrepancy`, floored at 0.
//!
//! The confidence label is the highest threshold every available score
//! meets. Any fallback record caps it at `medium`.

use crate::types::{AnnotatedRecord, ConfidenceLabel, QualityAssessment};
use samarth_core::config::QualityConfig;
use samarth_sources::{DataRecord, EntityKey, Metric, ProviderId, ProviderRequest, YearScope};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Records grouped by the provider that returned them.
pub type GroupedRecords = BTreeMap<ProviderId, Vec<Arc<DataRecord>>>;

/// Agreement below this is reported as an issue.
const DISAGREEMENT_ISSUE_BELOW: f64 = 0.75;

/// Peers needed before the outlier check applies.
const MIN_OUTLIER_SAMPLE: usize = 3;

/// Distance from the peer mean, in standard deviations, that counts as an outlier.
const OUTLIER_SIGMA: f64 = 3.0;

/// Plausible values for a metric.
pub fn bounds(metric: Metric) -> RangeInclusive<f64> {
    match metric {
        Metric::ProductionTonnes => 0.0..=25_000_000.0,
        Metric::AreaHectares => 0.0..=20_000_000.0,
        Metric::RainfallMm => 0.0..=5_000.0,
        Metric::TemperatureC => 5.0..=50.0,
        Metric::ModalPricePerQuintal => 0.0..=100_000.0,
    }
}

/// Whether the dataset URL is on a government domain.
pub fn is_trusted_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let host = rest
        .split(|c: char| c == '/' || c == '?' || c == '#' || c == ':')
        .next()
        .unwrap_or("")
        .to_lowercase();

    ["gov.in", "nic.in"]
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
}

/// Scores records against the plan that requested them.
#[derive(Debug, Clone)]
pub struct Validator {
    thresholds: QualityConfig,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}

impl Validator {
    pub fn new(thresholds: QualityConfig) -> Self {
        Self { thresholds }
    }

    /// Wrap records in plan order, flagging implausible values.
    pub fn annotate(&self, records: &[Arc<DataRecord>]) -> Vec<AnnotatedRecord> {
        let all: Vec<&Arc<DataRecord>> = records.iter().collect();
        records
            .iter()
            .zip(record_flags(&all))
            .map(|(record, flag)| AnnotatedRecord {
                record: record.clone(),
                flag,
            })
            .collect()
    }

    /// Assess the records returned for `requests`.
    pub fn assess(&self, requests: &[ProviderRequest], grouped: &GroupedRecords) -> QualityAssessment {
        let all: Vec<&Arc<DataRecord>> = grouped.values().flatten().collect();
        if all.is_empty() {
            let mut quality = QualityAssessment::unavailable();
            quality.issues.push("No records were returned by any source".to_string());
            return quality;
        }

        let mut issues = Vec::new();

        let (completeness, missing) = completeness(requests, grouped);
        issues.extend(missing);

        let flags: Vec<String> = record_flags(&all).into_iter().flatten().collect();
        let plausibility = 1.0 - flags.len() as f64 / all.len() as f64;
        issues.extend(flags);

        let agreement = agreement(grouped);
        if let Some(score) = agreement {
            if score < DISAGREEMENT_ISSUE_BELOW {
                issues.push(format!(
                    "Sources disagree on overlapping figures (agreement {:.0}%)",
                    score * 100.0
                ));
            }
        }

        let untrusted: BTreeSet<&str> = all
            .iter()
            .map(|r| r.dataset_url.as_str())
            .filter(|url| !is_trusted_url(url))
            .collect();
        for url in untrusted {
            issues.push(format!("{} is not a government data source", url));
        }

        let fallback_sources: Vec<ProviderId> = grouped
            .iter()
            .filter(|(_, records)| records.iter().any(|r| r.is_fallback()))
            .map(|(provider, _)| *provider)
            .collect();
        for provider in &fallback_sources {
            issues.push(format!(
                "Live {} data was unavailable; figures are fallback estimates",
                provider.label()
            ));
        }

        let mut confidence_label = self.label(completeness, plausibility, agreement);
        if !fallback_sources.is_empty() {
            confidence_label = confidence_label.min(ConfidenceLabel::Medium);
        }

        tracing::debug!(
            "Quality: completeness={:.2} plausibility={:.2} agreement={:?} label={}",
            completeness,
            plausibility,
            agreement,
            confidence_label
        );

        QualityAssessment {
            completeness,
            plausibility,
            cross_source_agreement: agreement,
            confidence_label,
            issues,
            fallback_sources,
        }
    }

    /// Label from scores alone; `agreement = None` is not counted.
    pub fn label(&self, completeness: f64, plausibility: f64, agreement: Option<f64>) -> ConfidenceLabel {
        let floor = agreement
            .into_iter()
            .chain([completeness, plausibility])
            .fold(f64::INFINITY, f64::min);

        if floor >= self.thresholds.very_high {
            ConfidenceLabel::VeryHigh
        } else if floor >= self.thresholds.high {
            ConfidenceLabel::High
        } else if floor >= self.thresholds.medium {
            ConfidenceLabel::Medium
        } else {
            ConfidenceLabel::Low
        }
    }
}

fn bound_violation(record: &DataRecord) -> Option<String> {
    let metric = record.entity_key.metric;
    let range = bounds(metric);
    if record.value.is_finite() && range.contains(&record.value) {
        return None;
    }

    Some(format!(
        "{} {} of {} {} is outside the plausible range {} to {}",
        describe_key(&record.entity_key),
        metric.label(),
        record.value,
        record.unit,
        range.start(),
        range.end()
    ))
}

/// One flag per record, in input order. Bounds win over the statistical checks.
fn record_flags(records: &[&Arc<DataRecord>]) -> Vec<Option<String>> {
    let mut flags: Vec<Option<String>> = records.iter().map(|r| bound_violation(r)).collect();

    for (index, message) in outliers(records).into_iter().chain(conflicts(records)) {
        flags[index].get_or_insert(message);
    }

    flags
}

/// Values more than three standard deviations from their peers.
fn outliers(records: &[&Arc<DataRecord>]) -> Vec<(usize, String)> {
    // (provider, metric, crop) -> (index, value)
    let mut peers: BTreeMap<(ProviderId, Metric, Option<&str>), Vec<(usize, f64)>> = BTreeMap::new();
    for (index, record) in records.iter().enumerate() {
        if record.value.is_finite() && record.value > 0.0 {
            peers
                .entry((
                    record.source_provider,
                    record.entity_key.metric,
                    record.entity_key.crop.as_deref(),
                ))
                .or_default()
                .push((index, record.value));
        }
    }

    let mut found = Vec::new();
    for ((_, metric, _), values) in peers {
        if values.len() < MIN_OUTLIER_SAMPLE {
            continue;
        }

        let n = values.len() as f64;
        let mean = values.iter().map(|(_, v)| v).sum::<f64>() / n;
        let variance = values.iter().map(|(_, v)| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        // Identical values leave only rounding noise in the deviation
        if variance.sqrt() <= mean.abs() * 1e-9 {
            continue;
        }
        let limit = OUTLIER_SIGMA * variance.sqrt();

        for (index, value) in values {
            if (value - mean).abs() > limit {
                let record = records[index];
                found.push((
                    index,
                    format!(
                        "{} {} of {} {} is a statistical outlier (mean {:.0})",
                        describe_key(&record.entity_key),
                        metric.label(),
                        value,
                        record.unit,
                        mean
                    ),
                ));
            }
        }
    }

    found
}

/// Records that repeat an entity key and district from the same provider
/// with a different value. The first value seen is taken as the reference.
fn conflicts(records: &[&Arc<DataRecord>]) -> Vec<(usize, String)> {
    let mut first_seen: BTreeMap<(ProviderId, &EntityKey, Option<&str>), f64> = BTreeMap::new();
    let mut found = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let key = (record.source_provider, &record.entity_key, record.district.as_deref());
        match first_seen.get(&key) {
            Some(reference) if *reference != record.value => found.push((
                index,
                format!(
                    "{} reports conflicting {} for {}: {} and {}",
                    record.source_provider.label(),
                    record.entity_key.metric.label(),
                    describe_key(&record.entity_key),
                    reference,
                    record.value
                ),
            )),
            Some(_) => {}
            None => {
                first_seen.insert(key, record.value);
            }
        }
    }

    found
}

fn describe_key(key: &EntityKey) -> String {
    let mut parts = vec![key.location.clone()];
    if let Some(crop) = &key.crop {
        parts.push(crop.clone());
    }
    if let Some(year) = key.year {
        parts.push(year.to_string());
    }
    parts.join(" ")
}

/// A requested key: `None` dimensions match anything.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RequestedKey {
    provider: ProviderId,
    location: Option<String>,
    crop: Option<String>,
    year: Option<i32>,
    metric: Metric,
}

impl RequestedKey {
    fn is_satisfied_by(&self, record: &DataRecord) -> bool {
        record.entity_key.metric == self.metric
            && self.location.as_deref().map_or(true, |l| record.matches_location(l))
            && self.crop.as_deref().map_or(true, |c| {
                record
                    .entity_key
                    .crop
                    .as_deref()
                    .is_some_and(|rc| samarth_sources::types::crop_names_match(rc, c))
            })
            && self.year.map_or(true, |y| record.entity_key.year == Some(y))
    }

    fn describe(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(crop) = &self.crop {
            parts.push(crop.clone());
        }
        parts.push(self.metric.label().to_string());
        parts.push(format!("in {}", self.location.as_deref().unwrap_or("India")));
        if let Some(year) = self.year {
            parts.push(format!("for {}", year));
        }
        parts.join(" ")
    }
}

fn requested_keys(requests: &[ProviderRequest]) -> BTreeSet<RequestedKey> {
    let mut keys = BTreeSet::new();

    for request in requests {
        let provider = request.provider_id;
        let filters = &request.filters;

        let locations: Vec<Option<String>> = if filters.locations.is_empty() {
            vec![None]
        } else {
            filters.locations.iter().cloned().map(Some).collect()
        };
        let crops: Vec<Option<String>> = if filters.crops.is_empty() || !provider.has_crop_dimension() {
            vec![None]
        } else {
            filters.crops.iter().cloned().map(Some).collect()
        };
        let years: Vec<Option<i32>> = match &filters.years {
            YearScope::Listed(years) if !years.is_empty() => years.iter().copied().map(Some).collect(),
            _ => vec![None],
        };

        for location in &locations {
            for crop in &crops {
                for year in &years {
                    keys.insert(RequestedKey {
                        provider,
                        location: location.clone(),
                        crop: crop.clone(),
                        year: *year,
                        metric: provider.primary_metric(),
                    });
                }
            }
        }
    }

    keys
}

/// Completeness score and an issue for every missing key.
fn completeness(requests: &[ProviderRequest], grouped: &GroupedRecords) -> (f64, Vec<String>) {
    let keys = requested_keys(requests);
    if keys.is_empty() {
        return (0.0, Vec::new());
    }

    let mut missing = Vec::new();
    let mut present = 0usize;

    for key in &keys {
        let satisfied = grouped
            .get(&key.provider)
            .is_some_and(|records| records.iter().any(|r| key.is_satisfied_by(r)));
        if satisfied {
            present += 1;
        } else {
            missing.push(format!("No data for {}", key.describe()));
        }
    }

    (present as f64 / keys.len() as f64, missing)
}

/// Mean-of-pairs agreement across providers on identical entity keys.
fn agreement(grouped: &GroupedRecords) -> Option<f64> {
    if grouped.len() < 2 {
        return None;
    }

    // key -> provider -> (sum, count)
    let mut by_key: BTreeMap<&EntityKey, BTreeMap<ProviderId, (f64, usize)>> = BTreeMap::new();
    for (provider, records) in grouped {
        for record in records {
            let slot = by_key
                .entry(&record.entity_key)
                .or_default()
                .entry(*provider)
                .or_insert((0.0, 0));
            slot.0 += record.value;
            slot.1 += 1;
        }
    }

    let mut discrepancies = Vec::new();
    for providers in by_key.values().filter(|p| p.len() >= 2) {
        let means: Vec<f64> = providers.values().map(|(sum, n)| sum / *n as f64).collect();
        for (i, a) in means.iter().enumerate() {
            for b in &means[i + 1..] {
                discrepancies.push(relative_discrepancy(*a, *b));
            }
        }
    }

    if discrepancies.is_empty() {
        return None;
    }

    let mean = discrepancies.iter().sum::<f64>() / discrepancies.len() as f64;
    Some((1.0 - mean).max(0.0))
}

fn relative_discrepancy(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        0.0
    } else {
        (a - b).abs() / scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use samarth_sources::{FilterParams, Origin};

    fn record(
        provider: ProviderId,
        location: &str,
        crop: Option<&str>,
        metric: Metric,
        value: f64,
        origin: Origin,
    ) -> Arc<DataRecord> {
        Arc::new(DataRecord {
            source_provider: provider,
            entity_key: EntityKey {
                location: location.to_string(),
                crop: crop.map(String::from),
                year: Some(2023),
                metric,
            },
            district: None,
            value,
            unit: metric.unit().to_string(),
            observed_at: Utc::now(),
            dataset_url: format!("https://api.data.gov.in/resource/{}", provider),
            ministry_name: provider.ministry_name().to_string(),
            origin,
        })
    }

    fn rice_request(locations: &[&str]) -> ProviderRequest {
        let mut filters = FilterParams::all_india();
        filters.locations = locations.iter().map(|l| l.to_string()).collect();
        filters.crops.insert("Rice".to_string());
        ProviderRequest::new(ProviderId::Agriculture, filters)
    }

    fn grouped(records: Vec<Arc<DataRecord>>) -> GroupedRecords {
        let mut map = GroupedRecords::new();
        for r in records {
            map.entry(r.source_provider).or_default().push(r);
        }
        map
    }

    #[test]
    fn test_complete_live_single_source_is_very_high() {
        let requests = vec![rice_request(&["Punjab"])];
        let records = grouped(vec![record(
            ProviderId::Agriculture,
            "Punjab",
            Some("Rice"),
            Metric::ProductionTonnes,
            280_000.0,
            Origin::Live,
        )]);

        let quality = Validator::default().assess(&requests, &records);

        assert_eq!(quality.completeness, 1.0);
        assert_eq!(quality.plausibility, 1.0);
        assert_eq!(quality.cross_source_agreement, None);
        assert_eq!(quality.confidence_label, ConfidenceLabel::VeryHigh);
        assert!(quality.issues.is_empty());
    }

    #[test]
    fn test_missing_location_lowers_completeness() {
        let requests = vec![rice_request(&["Punjab", "Kerala"])];
        let records = grouped(vec![record(
            ProviderId::Agriculture,
            "Punjab",
            Some("Rice"),
            Metric::ProductionTonnes,
            280_000.0,
            Origin::Live,
        )]);

        let quality = Validator::default().assess(&requests, &records);

        assert_eq!(quality.completeness, 0.5);
        assert_eq!(quality.confidence_label, ConfidenceLabel::Medium);
        assert!(quality.issues.iter().any(|i| i.contains("in Kerala")));
    }

    #[test]
    fn test_out_of_bounds_flagged_not_dropped() {
        let validator = Validator::default();
        let records = vec![
            record(ProviderId::Climate, "Kerala", None, Metric::RainfallMm, 3_000.0, Origin::Live),
            record(ProviderId::Climate, "Kerala", None, Metric::TemperatureC, 70.0, Origin::Live),
        ];

        let annotated = validator.annotate(&records);
        assert_eq!(annotated.len(), 2);
        assert!(!annotated[0].is_flagged());
        assert!(annotated[1].is_flagged());

        let request = ProviderRequest::new(ProviderId::Climate, FilterParams::all_india());
        let quality = validator.assess(&[request], &grouped(records));
        assert_eq!(quality.plausibility, 0.5);
        assert_eq!(quality.confidence_label, ConfidenceLabel::Medium);
    }

    fn yearly(value: f64, year: i32) -> Arc<DataRecord> {
        let mut raw = (*record(
            ProviderId::Agriculture,
            "Punjab",
            Some("Rice"),
            Metric::ProductionTonnes,
            value,
            Origin::Live,
        ))
        .clone();
        raw.entity_key.year = Some(year);
        Arc::new(raw)
    }

    #[test]
    fn test_statistical_outlier_is_flagged() {
        let validator = Validator::default();
        // Inside the production bounds, but far from every other year
        let mut records: Vec<Arc<DataRecord>> = (2010..2022).map(|y| yearly(280_000.0, y)).collect();
        records.push(yearly(20_000_000.0, 2022));

        let annotated = validator.annotate(&records);
        assert_eq!(annotated.iter().filter(|r| r.is_flagged()).count(), 1);
        assert!(annotated[12].flag.as_deref().unwrap().contains("statistical outlier"));

        let mut request = rice_request(&["Punjab"]);
        request.filters.years = YearScope::All;
        let quality = validator.assess(&[request], &grouped(records));
        assert!((quality.plausibility - 12.0 / 13.0).abs() < 1e-9);
        assert!(quality.issues.iter().any(|i| i.contains("statistical outlier")));
    }

    #[test]
    fn test_small_or_uniform_samples_have_no_outliers() {
        let few = vec![yearly(1.0, 2021), yearly(1_000_000.0, 2022)];
        let few: Vec<&Arc<DataRecord>> = few.iter().collect();
        assert!(outliers(&few).is_empty());

        let same: Vec<Arc<DataRecord>> = (2010..2025).map(|y| yearly(0.1, y)).collect();
        let same: Vec<&Arc<DataRecord>> = same.iter().collect();
        assert!(outliers(&same).is_empty());
    }

    #[test]
    fn test_conflicting_duplicate_is_flagged() {
        let validator = Validator::default();
        let records = vec![
            record(ProviderId::Agriculture, "Punjab", Some("Rice"), Metric::ProductionTonnes, 280_000.0, Origin::Live),
            record(ProviderId::Agriculture, "Punjab", Some("Rice"), Metric::ProductionTonnes, 280_000.0, Origin::Live),
            record(ProviderId::Agriculture, "Punjab", Some("Rice"), Metric::ProductionTonnes, 310_000.0, Origin::Live),
        ];

        let annotated = validator.annotate(&records);
        assert!(!annotated[0].is_flagged());
        // An exact repeat is not a conflict
        assert!(!annotated[1].is_flagged());
        assert!(annotated[2].flag.as_deref().unwrap().contains("conflicting"));

        let quality = validator.assess(&[rice_request(&["Punjab"])], &grouped(records));
        assert!((quality.plausibility - 2.0 / 3.0).abs() < 1e-9);
        assert!(quality.confidence_label <= ConfidenceLabel::Medium);
    }

    #[test]
    fn test_same_key_in_other_district_is_not_a_conflict() {
        let mut pune = (*record(ProviderId::Climate, "Maharashtra", None, Metric::RainfallMm, 720.0, Origin::Live)).clone();
        pune.district = Some("Pune".to_string());
        let mut nashik = pune.clone();
        nashik.district = Some("Nashik".to_string());
        nashik.value = 690.0;

        let records = vec![Arc::new(pune), Arc::new(nashik)];
        let records: Vec<&Arc<DataRecord>> = records.iter().collect();
        assert!(conflicts(&records).is_empty());
    }

    #[test]
    fn test_agreement_between_providers() {
        let records = grouped(vec![
            record(ProviderId::Agriculture, "Punjab", Some("Rice"), Metric::ModalPricePerQuintal, 2000.0, Origin::Live),
            record(ProviderId::MarketPrices, "Punjab", Some("Rice"), Metric::ModalPricePerQuintal, 1800.0, Origin::Live),
            record(ProviderId::Agriculture, "Punjab", Some("Rice"), Metric::ProductionTonnes, 280_000.0, Origin::Live),
        ]);

        let agreement = agreement(&records).unwrap();
        assert!((agreement - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_agreement_floored_at_zero_and_absent_without_overlap() {
        assert_eq!(relative_discrepancy(0.0, 0.0), 0.0);
        assert_eq!(relative_discrepancy(-1.0, 1.0), 2.0);

        let disjoint = grouped(vec![
            record(ProviderId::Agriculture, "Punjab", Some("Rice"), Metric::ProductionTonnes, 1.0, Origin::Live),
            record(ProviderId::Climate, "Punjab", None, Metric::RainfallMm, 600.0, Origin::Live),
        ]);
        assert_eq!(agreement(&disjoint), None);

        let opposite = grouped(vec![
            record(ProviderId::Agriculture, "Punjab", Some("Rice"), Metric::ModalPricePerQuintal, -1.0, Origin::Live),
            record(ProviderId::MarketPrices, "Punjab", Some("Rice"), Metric::ModalPricePerQuintal, 1.0, Origin::Live),
        ]);
        assert_eq!(agreement(&opposite), Some(0.0));
    }

    #[test]
    fn test_fallback_caps_label_at_medium() {
        let requests = vec![rice_request(&["Punjab"])];
        let records = grouped(vec![record(
            ProviderId::Agriculture,
            "Punjab",
            Some("Rice"),
            Metric::ProductionTonnes,
            280_000.0,
            Origin::Fallback,
        )]);

        let quality = Validator::default().assess(&requests, &records);

        assert_eq!(quality.confidence_label, ConfidenceLabel::Medium);
        assert_eq!(quality.fallback_sources, vec![ProviderId::Agriculture]);
        assert!(quality.issues.iter().any(|i| i.contains("fallback estimates")));
    }

    #[test]
    fn test_no_records_is_low() {
        let quality = Validator::default().assess(&[rice_request(&["Punjab"])], &GroupedRecords::new());
        assert_eq!(quality.confidence_label, ConfidenceLabel::Low);
        assert_eq!(quality.completeness, 0.0);
    }

    #[test]
    fn test_label_thresholds() {
        let v = Validator::default();
        assert_eq!(v.label(0.95, 0.95, Some(0.95)), ConfidenceLabel::VeryHigh);
        assert_eq!(v.label(0.95, 0.95, None), ConfidenceLabel::VeryHigh);
        assert_eq!(v.label(0.95, 0.95, Some(0.8)), ConfidenceLabel::High);
        assert_eq!(v.label(0.6, 1.0, None), ConfidenceLabel::Medium);
        assert_eq!(v.label(1.0, 0.4, None), ConfidenceLabel::Low);
    }

    #[test]
    fn test_trusted_domains() {
        assert!(is_trusted_url("https://api.data.gov.in/resource/abc?format=json"));
        assert!(is_trusted_url("https://imd.nic.in/data"));
        assert!(!is_trusted_url("https://example.com/gov.in"));
        assert!(!is_trusted_url("https://notgov.in/x"));
    }

    #[test]
    fn test_untrusted_url_is_an_issue() {
        let mut raw = (*record(
            ProviderId::Agriculture,
            "Punjab",
            Some("Rice"),
            Metric::ProductionTonnes,
            1.0,
            Origin::Live,
        ))
        .clone();
        raw.dataset_url = "https://example.com/rice.csv".to_string();

        let quality = Validator::default().assess(&[rice_request(&["Punjab"])], &grouped(vec![Arc::new(raw)]));
        assert!(quality
            .issues
            .iter()
            .any(|i| i.contains("not a government data source")));
    }
}
