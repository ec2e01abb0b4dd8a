//! Narrative templates for Samarth answers.
//!
//! This crate provides:
//! - Built-in YAML templates, one per response shape
//! - Workspace overrides from `.samarth/templates/<kind>.yml`
//! - Handlebars rendering into plain text

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::TemplateSet;
pub use loader::{builtin_template, list_overrides, load_override};
pub use types::{NarrativeContext, NarrativeKind, NarrativeRow, NarrativeTemplate, RenderedNarrative};
