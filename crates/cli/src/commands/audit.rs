//! Audit command handler.
//!
//! Lists recent audit entries or exports the whole trail.

use chrono::Utc;
use clap::Args;
use samarth_core::{config::AppConfig, AppResult};
use samarth_pipeline::{AuditEvent, AuditLog};
use std::path::PathBuf;

/// Show or export the audit trail
#[derive(Args, Debug)]
pub struct AuditCommand {
    /// Number of recent entries to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Write the full trail and current health to this JSON file
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AuditCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing audit command");
        tracing::debug!("Audit options: {:?}", self);

        let log = AuditLog::open(&config.audit_path())?;

        if let Some(path) = &self.export {
            let export = log.export(Utc::now())?;
            std::fs::write(path, serde_json::to_string_pretty(&export)?)?;
            println!(
                "Exported {} queries and {} source accesses to {}",
                export.queries.len(),
                export.data_sources.len(),
                path.display()
            );
            return Ok(());
        }

        let recent = log.recent(self.limit)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&recent)?);
            return Ok(());
        }

        if recent.is_empty() {
            println!("No audit entries in {}", config.audit_path().display());
            return Ok(());
        }

        for event in &recent {
            let time = event.timestamp().format("%Y-%m-%d %H:%M:%S");
            match event {
                AuditEvent::Query(q) => {
                    let outcome = match (&q.error, q.confidence) {
                        (Some(error), _) => format!("rejected: {}", error),
                        (None, Some(label)) => format!("confidence {}", label),
                        (None, None) => "answered".to_string(),
                    };
                    println!(
                        "{}  query   {} \"{}\" {}ms, {}",
                        time, q.query_type, q.question, q.response_time_ms, outcome
                    );
                }
                AuditEvent::SourceAccess(s) => {
                    println!(
                        "{}  source  {} {} records, {}{} {}ms",
                        time,
                        s.provider,
                        s.record_count,
                        s.origin,
                        if s.cache_hit { " (cache)" } else { "" },
                        s.elapsed_ms
                    );
                }
            }
        }

        Ok(())
    }
}
