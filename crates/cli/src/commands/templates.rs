//! Templates command handler.
//!
//! Lists the narrative templates and which of them the workspace overrides.

use clap::Args;
use samarth_core::{config::AppConfig, AppResult};
use samarth_narrative::{list_overrides, NarrativeKind};

/// List narrative templates and workspace overrides
#[derive(Args, Debug)]
pub struct TemplatesCommand {}

impl TemplatesCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let dir = config.templates_dir();
        let overrides = list_overrides(&dir);
        tracing::debug!("Template overrides in {:?}: {:?}", dir, overrides);

        for kind in NarrativeKind::ALL {
            let source = if overrides.contains(&kind) {
                "workspace override"
            } else {
                "built-in"
            };
            println!("{:<12} {}", kind.as_str(), source);
        }
        println!();
        println!("Overrides are read from {}", dir.display());

        Ok(())
    }
}
