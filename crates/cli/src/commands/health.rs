//! Health command handler.
//!
//! Summarizes the audit trail over the last hour.

use chrono::Utc;
use clap::Args;
use samarth_core::{config::AppConfig, AppResult};
use samarth_pipeline::AuditLog;

/// Show system health for the last hour
#[derive(Args, Debug)]
pub struct HealthCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HealthCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing health command");

        let log = AuditLog::open(&config.audit_path())?;
        let health = log.health(Utc::now())?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&health)?);
            return Ok(());
        }

        println!("System health (last {} minutes)", health.window_minutes);
        println!("  Queries:              {}", health.queries);
        println!("  Success rate:         {:.1}%", health.success_rate * 100.0);
        println!("  Avg response time:    {:.0}ms", health.avg_response_time_ms);
        println!("  Data sources used:    {}", health.data_sources_accessed);
        println!("  Cache hit rate:       {:.1}%", health.cache_hit_rate * 100.0);
        println!("  Fallback rate:        {:.1}%", health.fallback_rate * 100.0);
        println!("  Records processed:    {}", health.total_records_processed);

        Ok(())
    }
}
