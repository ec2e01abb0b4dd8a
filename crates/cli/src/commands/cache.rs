//! Cache command handler.

use clap::{Args, Subcommand};
use samarth_core::{config::AppConfig, AppResult};
use samarth_sources::create_cache;

/// Cache maintenance
#[derive(Args, Debug)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Remove expired entries
    Purge,
    /// Show the number of cached responses
    Stats,
}

impl CacheCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing cache command");

        let cache = create_cache(config)?;

        match self.action {
            CacheAction::Purge => {
                let removed = cache.purge_expired()?;
                println!(
                    "Removed {} expired entries ({} backend, {} remaining)",
                    removed,
                    cache.backend_name(),
                    cache.len()?
                );
            }
            CacheAction::Stats => {
                println!("Backend: {}", cache.backend_name());
                println!("Entries: {}", cache.len()?);
            }
        }

        Ok(())
    }
}
