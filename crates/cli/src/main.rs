//! Samarth CLI
//!
//! Main entry point for the samarth command-line tool.
//! Answers questions about Indian agriculture and climate from data.gov.in
//! datasets, with citations and a confidence report.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, AuditCommand, CacheCommand, HealthCommand, TemplatesCommand};
use samarth_core::logging::{self, LogFormat};
use samarth_core::{config::AppConfig, AppError, AppResult};
use std::path::PathBuf;
use std::process::ExitCode;

/// Samarth - cited answers about Indian agriculture and climate
#[derive(Parser, Debug)]
#[command(name = "samarth")]
#[command(about = "Cited answers about Indian agriculture and climate", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "SAMARTH_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "SAMARTH_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Log format (text, json)
    #[arg(long, global = true, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,

    /// Budget for one question in milliseconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Never call the portal; serve fallback data only
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question about crops, rainfall or prices
    Ask(AskCommand),

    /// Show system health for the last hour
    Health(HealthCommand),

    /// Show or export the audit trail
    Audit(AuditCommand),

    /// Cache maintenance
    Cache(CacheCommand),

    /// List narrative templates and workspace overrides
    Templates(TemplatesCommand),
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    LogFormat::parse(s).ok_or_else(|| format!("unknown log format '{}' (expected text or json)", s))
}

/// Exit status for a failed command: 2 for unusable input, 1 otherwise.
fn exit_status(error: &AppError) -> u8 {
    match error {
        AppError::InvalidInput(_) => 2,
        _ => 1,
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    // Load base configuration from environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.log_level,
        cli.log_format,
        cli.timeout,
        cli.verbose,
        cli.no_color,
        cli.offline,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_format)?;

    tracing::info!("Samarth CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!(
        "Cache backend: {:?}, request timeout: {}ms",
        config.cache.backend,
        config.request_timeout_ms
    );

    config.ensure_samarth_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Health(_) => "health",
        Commands::Audit(_) => "audit",
        Commands::Cache(_) => "cache",
        Commands::Templates(_) => "templates",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Health(cmd) => cmd.execute(&config),
        Commands::Audit(cmd) => cmd.execute(&config),
        Commands::Cache(cmd) => cmd.execute(&config),
        Commands::Templates(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_exits_with_two() {
        assert_eq!(exit_status(&AppError::InvalidInput("empty".to_string())), 2);
        assert_eq!(exit_status(&AppError::Config("bad".to_string())), 1);
    }

    #[test]
    fn test_global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "samarth",
            "ask",
            "rice",
            "in",
            "Punjab",
            "--log-format",
            "json",
            "--timeout",
            "500",
            "--offline",
        ])
        .unwrap();

        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert_eq!(cli.timeout, Some(500));
        assert!(cli.offline);
        match cli.command {
            Commands::Ask(cmd) => assert_eq!(cmd.question, vec!["rice", "in", "Punjab"]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        assert!(Cli::try_parse_from(["samarth", "health", "--log-format", "xml"]).is_err());
    }
}
