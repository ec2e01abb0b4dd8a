//! Ask command handler.
//!
//! Runs one question through the pipeline and prints the cited answer.

use clap::Args;
use samarth_core::{config::AppConfig, AppError, AppResult};
use samarth_pipeline::{AnswerPayload, QueryEngine};
use std::path::PathBuf;

/// Ask a question about crops, rainfall or prices
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask (quotes optional)
    pub question: Vec<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Output the full answer payload as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the quality report after the answer
    #[arg(long)]
    pub quality: bool,

    /// Print how each source was served (live, cache or fallback)
    #[arg(long)]
    pub provenance: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.get_question()?;
        tracing::debug!("Question: {}", question);

        let engine = QueryEngine::from_config(config)?;
        let payload = engine.answer(&question).await?;

        if self.json {
            let json = serde_json::to_string_pretty(&payload)?;
            println!("{}", json);
            return Ok(());
        }

        self.print_answer(&payload);
        Ok(())
    }

    fn print_answer(&self, payload: &AnswerPayload) {
        println!("{}", payload.narrative_text.trim_end());

        if !payload.citations.is_empty() {
            println!();
            println!("Sources:");
            for (i, citation) in payload.citations.iter().enumerate() {
                println!(
                    "  [{}] {} - {} (updated {})",
                    i + 1,
                    citation.ministry_name,
                    citation.dataset_url,
                    citation.last_updated.format("%Y-%m-%d")
                );
            }
        }

        if self.quality {
            println!();
            println!("{}", payload.quality.report());
        }

        if self.provenance {
            println!();
            println!("Provenance:");
            for p in &payload.provenance {
                let served = if p.cache_hit { "cache" } else { "fetched" };
                println!(
                    "  {}: {} records, {} ({}), {}ms",
                    p.provider, p.record_count, p.origin, served, p.elapsed_ms
                );
                for failure in &p.failures {
                    println!("    attempt {}: {}", failure.attempt, failure.message);
                }
            }
        }
    }

    /// Get the question text from arguments or a file.
    fn get_question(&self) -> AppResult<String> {
        if let Some(path) = &self.file {
            return Ok(std::fs::read_to_string(path)?);
        }

        if self.question.is_empty() {
            return Err(AppError::InvalidInput("no question provided".to_string()));
        }
        Ok(self.question.join(" "))
    }
}
