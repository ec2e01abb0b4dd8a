//! Narrative template types.
//!
//! This module defines the template definitions loaded from YAML and the
//! context the Answer Assembler renders them with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which response shape a template renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeKind {
    Lookup,
    Comparison,
    Trend,
    Correlation,
    /// No supporting records survived validation
    Unavailable,
}

impl NarrativeKind {
    pub const ALL: [NarrativeKind; 5] = [
        NarrativeKind::Lookup,
        NarrativeKind::Comparison,
        NarrativeKind::Trend,
        NarrativeKind::Correlation,
        NarrativeKind::Unavailable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lookup => "lookup",
            Self::Comparison => "comparison",
            Self::Trend => "trend",
            Self::Correlation => "correlation",
            Self::Unavailable => "unavailable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for NarrativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A narrative template definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeTemplate {
    /// Unique template identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Response shape this template renders
    pub kind: NarrativeKind,

    /// Template string with Handlebars syntax
    pub template: String,
}

/// One line of figures in a narrative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRow {
    pub label: String,
    /// Already formatted for display
    pub value: String,
    pub unit: String,
    /// Citation marker such as `[1]`
    pub source: String,
}

/// Values interpolated into a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NarrativeContext {
    pub question: String,
    /// One-sentence answer
    pub headline: String,
    /// What was asked for, e.g. "Rice in Maharashtra and Punjab"
    pub scope: String,
    pub rows: Vec<NarrativeRow>,
    /// Derived statements (totals, changes, correlation)
    pub findings: Vec<String>,
    pub caveats: Vec<String>,
}

/// Rendered narrative with the template that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedNarrative {
    pub text: String,
    #[serde(rename = "templateId")]
    pub template_id: String,
    /// Whether a workspace override replaced the built-in template
    pub overridden: bool,
}
