//! Analysis operations run over validated records.
//!
//! Extensive quantities (production, area) are summed when records are
//! grouped; intensive ones (rainfall, temperature, price) are averaged.

use crate::types::AnnotatedRecord;
use samarth_sources::{DataRecord, Metric};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Fewest paired locations for which a correlation is reported.
pub const MIN_CORRELATION_PAIRS: usize = 3;

/// How records of one metric combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Mean,
}

pub fn aggregation(metric: Metric) -> Aggregation {
    match metric {
        Metric::ProductionTonnes | Metric::AreaHectares => Aggregation::Sum,
        Metric::RainfallMm | Metric::TemperatureC | Metric::ModalPricePerQuintal => Aggregation::Mean,
    }
}

/// An aggregated value and the records behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    /// Location name or year, depending on the grouping
    pub label: String,
    pub metric: Metric,
    pub value: f64,
    /// Indices into the record slice the figure was computed from
    pub members: Vec<usize>,
}

/// Metrics present in `records`, in `Metric` order.
pub fn metrics_present(records: &[AnnotatedRecord]) -> Vec<Metric> {
    records
        .iter()
        .map(|r| r.record.entity_key.metric)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One figure per location for `metric`.
///
/// Records are attributed to the first requested location they match (state
/// or district), or to their own state when no location was requested.
/// Requested locations come first, in sorted order.
pub fn location_totals(records: &[AnnotatedRecord], locations: &BTreeSet<String>, metric: Metric) -> Vec<Figure> {
    let mut groups: Vec<(String, Vec<usize>)> = locations.iter().map(|l| (l.clone(), Vec::new())).collect();

    for (index, annotated) in records.iter().enumerate() {
        let record = &annotated.record;
        if record.entity_key.metric != metric {
            continue;
        }

        let label = locations
            .iter()
            .find(|l| record.matches_location(l))
            .cloned()
            .unwrap_or_else(|| record.entity_key.location.clone());

        match groups.iter_mut().find(|(l, _)| *l == label) {
            Some((_, members)) => members.push(index),
            None => groups.push((label, vec![index])),
        }
    }

    groups
        .into_iter()
        .filter(|(_, members)| !members.is_empty())
        .map(|(label, members)| figure(label, metric, records, members))
        .collect()
}

/// One figure per year for `metric`, oldest first. Records without a year are skipped.
pub fn yearly_series(records: &[AnnotatedRecord], metric: Metric) -> Vec<Figure> {
    let mut years: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (index, annotated) in records.iter().enumerate() {
        let key = &annotated.record.entity_key;
        if key.metric != metric {
            continue;
        }
        if let Some(year) = key.year {
            years.entry(year).or_default().push(index);
        }
    }

    years
        .into_iter()
        .map(|(year, members)| figure(year.to_string(), metric, records, members))
        .collect()
}

/// Percentage change from the first to the last figure.
pub fn percent_change(series: &[Figure]) -> Option<f64> {
    let first = series.first()?;
    let last = series.last()?;
    if series.len() < 2 || first.value == 0.0 {
        return None;
    }
    Some((last.value - first.value) / first.value * 100.0)
}

/// Rainfall paired with production per location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationResult {
    /// (location, rainfall figure, production figure)
    pub pairs: Vec<(String, Figure, Figure)>,
    /// Pearson r; `None` with fewer than `MIN_CORRELATION_PAIRS` pairs or no variance
    pub coefficient: Option<f64>,
}

/// Correlate rainfall with crop production across locations.
pub fn rainfall_correlation(records: &[AnnotatedRecord], locations: &BTreeSet<String>) -> CorrelationResult {
    let rainfall = location_totals(records, locations, Metric::RainfallMm);
    let production = location_totals(records, locations, Metric::ProductionTonnes);

    let pairs: Vec<(String, Figure, Figure)> = rainfall
        .into_iter()
        .filter_map(|rain| {
            let crop = production.iter().find(|p| p.label == rain.label)?.clone();
            Some((rain.label.clone(), rain, crop))
        })
        .collect();

    let coefficient = if pairs.len() >= MIN_CORRELATION_PAIRS {
        let xs: Vec<f64> = pairs.iter().map(|(_, rain, _)| rain.value).collect();
        let ys: Vec<f64> = pairs.iter().map(|(_, _, crop)| crop.value).collect();
        pearson(&xs, &ys)
    } else {
        None
    };

    CorrelationResult { pairs, coefficient }
}

/// Pearson correlation coefficient.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Plain-language strength of a correlation coefficient.
pub fn strength(r: f64) -> &'static str {
    match r.abs() {
        a if a >= 0.7 => "strong",
        a if a >= 0.4 => "moderate",
        a if a >= 0.2 => "weak",
        _ => "negligible",
    }
}

fn figure(label: String, metric: Metric, records: &[AnnotatedRecord], members: Vec<usize>) -> Figure {
    let values: Vec<f64> = members.iter().map(|i| records[*i].record.value).collect();
    let total: f64 = values.iter().sum();
    let value = match aggregation(metric) {
        Aggregation::Sum => total,
        Aggregation::Mean if values.is_empty() => 0.0,
        Aggregation::Mean => total / values.len() as f64,
    };

    Figure {
        label,
        metric,
        value,
        members,
    }
}

/// Whether any record behind `figure` is a fallback record.
pub fn is_estimate(figure: &Figure, records: &[AnnotatedRecord]) -> bool {
    figure
        .members
        .iter()
        .any(|i| records.get(*i).is_some_and(|r| DataRecord::is_fallback(&r.record)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use samarth_sources::{EntityKey, Origin, ProviderId};
    use std::sync::Arc;

    fn rec(location: &str, district: &str, year: i32, metric: Metric, value: f64) -> AnnotatedRecord {
        AnnotatedRecord::new(Arc::new(DataRecord {
            source_provider: ProviderId::Agriculture,
            entity_key: EntityKey {
                location: location.to_string(),
                crop: Some("Rice".to_string()),
                year: Some(year),
                metric,
            },
            district: Some(district.to_string()),
            value,
            unit: metric.unit().to_string(),
            observed_at: Utc::now(),
            dataset_url: "https://api.data.gov.in/resource/x".to_string(),
            ministry_name: "Ministry".to_string(),
            origin: Origin::Live,
        }))
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_location_totals_sum_districts() {
        let records = vec![
            rec("Maharashtra", "Pune", 2023, Metric::ProductionTonnes, 125_000.0),
            rec("Maharashtra", "Nashik", 2023, Metric::ProductionTonnes, 98_000.0),
            rec("Punjab", "Ludhiana", 2023, Metric::ProductionTonnes, 280_000.0),
            rec("Punjab", "Ludhiana", 2023, Metric::ModalPricePerQuintal, 2750.0),
        ];

        let totals = location_totals(&records, &set(&["Maharashtra", "Punjab"]), Metric::ProductionTonnes);

        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].label, "Maharashtra");
        assert_eq!(totals[0].value, 223_000.0);
        assert_eq!(totals[0].members, vec![0, 1]);
        assert_eq!(totals[1].value, 280_000.0);
    }

    #[test]
    fn test_location_totals_by_district_name() {
        let records = vec![
            rec("Maharashtra", "Pune", 2023, Metric::RainfallMm, 700.0),
            rec("Maharashtra", "Pune", 2022, Metric::RainfallMm, 600.0),
        ];
        let totals = location_totals(&records, &set(&["Pune"]), Metric::RainfallMm);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].value, 650.0);
    }

    #[test]
    fn test_unrequested_locations_group_by_state() {
        let records = vec![
            rec("Punjab", "Ludhiana", 2023, Metric::ProductionTonnes, 1.0),
            rec("Haryana", "Karnal", 2023, Metric::ProductionTonnes, 2.0),
        ];
        let totals = location_totals(&records, &BTreeSet::new(), Metric::ProductionTonnes);
        assert_eq!(
            totals.iter().map(|f| f.label.as_str()).collect::<Vec<_>>(),
            vec!["Punjab", "Haryana"]
        );
    }

    #[test]
    fn test_yearly_series_and_change() {
        let records = vec![
            rec("Punjab", "Ludhiana", 2021, Metric::ProductionTonnes, 100.0),
            rec("Punjab", "Amritsar", 2021, Metric::ProductionTonnes, 100.0),
            rec("Punjab", "Ludhiana", 2023, Metric::ProductionTonnes, 250.0),
        ];

        let series = yearly_series(&records, Metric::ProductionTonnes);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].label, "2021");
        assert_eq!(series[0].value, 200.0);
        assert_eq!(percent_change(&series), Some(25.0));
        assert_eq!(percent_change(&series[..1]), None);
    }

    #[test]
    fn test_pearson() {
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);

        let r = pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((r + 1.0).abs() < 1e-12);

        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(pearson(&[1.0], &[1.0]), None);
        assert_eq!(strength(-0.8), "strong");
        assert_eq!(strength(0.1), "negligible");
    }

    #[test]
    fn test_correlation_needs_three_locations() {
        let mut records = vec![
            rec("Punjab", "Ludhiana", 2023, Metric::RainfallMm, 650.0),
            rec("Punjab", "Ludhiana", 2023, Metric::ProductionTonnes, 280_000.0),
            rec("Kerala", "Palakkad", 2023, Metric::RainfallMm, 3000.0),
            rec("Kerala", "Palakkad", 2023, Metric::ProductionTonnes, 500_000.0),
        ];

        let two = rainfall_correlation(&records, &BTreeSet::new());
        assert_eq!(two.pairs.len(), 2);
        assert_eq!(two.coefficient, None);

        records.push(rec("Bihar", "Patna", 2023, Metric::RainfallMm, 1100.0));
        records.push(rec("Bihar", "Patna", 2023, Metric::ProductionTonnes, 350_000.0));

        let three = rainfall_correlation(&records, &BTreeSet::new());
        assert_eq!(three.pairs.len(), 3);
        assert!(three.coefficient.is_some_and(|r| r > 0.9));
    }
}
