//! Question answering pipeline for Samarth.
//!
//! This crate turns a free-text question into a cited answer:
//! - Entity and intent extraction (`extractor`, `gazetteer`)
//! - Provider planning (`router`)
//! - Quality scoring (`validator`) and derived figures (`analysis`)
//! - Narrative and citation assembly (`assembler`)
//! - Audit trail and health (`audit`)
//!
//! `QueryEngine` wires these stages to the data sources.
//!
//! # Example
//! ```no_run
//! use samarth_core::AppConfig;
//! use samarth_pipeline::QueryEngine;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = QueryEngine::from_config(&AppConfig::load()?)?;
//! let answer = engine.answer("Compare rice production in Maharashtra and Punjab").await?;
//! println!("{}", answer.narrative_text);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod assembler;
pub mod audit;
pub mod engine;
pub mod extractor;
pub mod gazetteer;
pub mod router;
pub mod types;
pub mod validator;

#[cfg(test)]
mod tests;

pub use assembler::Assembler;
pub use audit::{AuditEvent, AuditExport, AuditLog, SystemHealth};
pub use engine::{sanitize, QueryEngine};
pub use extractor::{extract, GazetteerExtractor, IntentExtractor};
pub use router::{plan, plan_query, AnalysisOp, QueryPlan};
pub use types::{
    AnnotatedRecord, AnswerPayload, Citation, ConfidenceLabel, Provenance, QualityAssessment,
    QueryDescriptor, QueryType,
};
pub use validator::Validator;
