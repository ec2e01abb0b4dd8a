//! Pipeline types.
//!
//! This module defines the structured query produced by the Extractor, the
//! quality assessment produced by the Validator and the answer payload
//! returned at the request boundary.

use chrono::{DateTime, Utc};
use samarth_narrative::NarrativeKind;
use samarth_sources::{DataRecord, Origin, ProviderFailure, ProviderId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Requested analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    #[default]
    Lookup,
    Comparison,
    Trend,
    Correlation,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lookup => "lookup",
            Self::Comparison => "comparison",
            Self::Trend => "trend",
            Self::Correlation => "correlation",
        }
    }

    /// Template used to narrate an answer of this type.
    pub fn narrative_kind(&self) -> NarrativeKind {
        match self {
            Self::Lookup => NarrativeKind::Lookup,
            Self::Comparison => NarrativeKind::Comparison,
            Self::Trend => NarrativeKind::Trend,
            Self::Correlation => NarrativeKind::Correlation,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured intent extracted from a question.
///
/// Empty sets mean "no restriction": the router turns them into
/// most-recent, all-India requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub raw_text: String,
    pub locations: BTreeSet<String>,
    pub crops: BTreeSet<String>,
    pub years: BTreeSet<i32>,
    pub query_type: QueryType,
    pub requires_climate: bool,
    pub requires_prices: bool,
}

impl QueryDescriptor {
    /// Descriptor with no entities and the default `lookup` type.
    pub fn empty(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            ..Self::default()
        }
    }

    pub fn has_entities(&self) -> bool {
        !(self.locations.is_empty() && self.crops.is_empty() && self.years.is_empty())
    }
}

/// Coarse reliability label shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLabel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

impl fmt::Display for ConfidenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validator output for one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// Fraction of requested entity keys present, 0..1
    pub completeness: f64,
    /// Fraction of values inside provider bounds, 0..1
    pub plausibility: f64,
    /// `None` unless two providers overlap on at least one key
    pub cross_source_agreement: Option<f64>,
    pub confidence_label: ConfidenceLabel,
    /// Human-readable findings disclosed with the answer
    pub issues: Vec<String>,
    /// Providers that served fallback data
    pub fallback_sources: Vec<ProviderId>,
}

impl QualityAssessment {
    /// Assessment for an answer with no supporting records.
    pub fn unavailable() -> Self {
        Self {
            completeness: 0.0,
            plausibility: 0.0,
            cross_source_agreement: None,
            confidence_label: ConfidenceLabel::Low,
            issues: Vec::new(),
            fallback_sources: Vec::new(),
        }
    }

    /// One-line summary of the scores, e.g. for the quality report.
    pub fn summary(&self) -> String {
        let agreement = self
            .cross_source_agreement
            .map(percent)
            .unwrap_or_else(|| "n/a".to_string());
        format!(
            "Confidence {} (completeness {}, plausibility {}, cross-source agreement {})",
            self.confidence_label.as_str().replace('_', " ").to_uppercase(),
            percent(self.completeness),
            percent(self.plausibility),
            agreement
        )
    }

    /// Short textual report: score summary followed by every issue.
    pub fn report(&self) -> String {
        let mut lines = vec![self.summary()];
        lines.extend(self.issues.iter().map(|issue| format!("- {}", issue)));
        lines.join("\n")
    }
}

fn percent(score: f64) -> String {
    format!("{:.0}%", score * 100.0)
}

/// A supporting record with its validation flag.
///
/// The record itself is shared with the Cache Store and never modified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedRecord {
    #[serde(flatten)]
    pub record: Arc<DataRecord>,
    /// Set when the value falls outside the provider's plausible range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
}

impl AnnotatedRecord {
    pub fn new(record: Arc<DataRecord>) -> Self {
        Self { record, flag: None }
    }

    pub fn is_flagged(&self) -> bool {
        self.flag.is_some()
    }
}

/// One cited dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub dataset_url: String,
    pub ministry_name: String,
    /// Latest `observed_at` among the records citing this dataset
    pub last_updated: DateTime<Utc>,
}

/// How one planned provider call was served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub provider: ProviderId,
    pub origin: Origin,
    pub cache_hit: bool,
    pub record_count: usize,
    pub failures: Vec<ProviderFailure>,
    pub elapsed_ms: u64,
}

/// Structured answer returned at the request boundary.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerPayload {
    pub narrative_text: String,
    pub supporting_records: Vec<AnnotatedRecord>,
    pub citations: Vec<Citation>,
    pub quality: QualityAssessment,
    pub descriptor: QueryDescriptor,
    pub provenance: Vec<Provenance>,
    /// Template that rendered the narrative
    pub template_id: String,
}

impl AnswerPayload {
    pub fn confidence(&self) -> ConfidenceLabel {
        self.quality.confidence_label
    }

    /// True when any supporting record was synthesized.
    pub fn uses_fallback(&self) -> bool {
        self.supporting_records.iter().any(|r| r.record.is_fallback())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_type_defaults_to_lookup() {
        assert_eq!(QueryType::default(), QueryType::Lookup);
        assert_eq!(QueryDescriptor::empty("x").query_type, QueryType::Lookup);
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(ConfidenceLabel::Low < ConfidenceLabel::Medium);
        assert!(ConfidenceLabel::High < ConfidenceLabel::VeryHigh);
        assert_eq!(
            serde_json::to_string(&ConfidenceLabel::VeryHigh).unwrap(),
            "\"very_high\""
        );
    }

    #[test]
    fn test_quality_summary() {
        let quality = QualityAssessment {
            completeness: 1.0,
            plausibility: 0.5,
            cross_source_agreement: None,
            confidence_label: ConfidenceLabel::Medium,
            issues: vec!["Punjab served fallback data".to_string()],
            fallback_sources: vec![ProviderId::Agriculture],
        };

        assert_eq!(
            quality.summary(),
            "Confidence MEDIUM (completeness 100%, plausibility 50%, cross-source agreement n/a)"
        );
        assert!(quality.report().ends_with("- Punjab served fallback data"));
    }
}
