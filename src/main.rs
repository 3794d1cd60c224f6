mod config;
mod error;
mod extraction;
mod metadata;
mod processor;
mod receipt;
mod timestamp;
mod web_server;

use crate::config::AppConfig;
use crate::extraction::{DocumentAiExtractor, DocumentExtractor};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "receipt-processor", version, about = "Structured receipt extraction service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default).
    Serve,
    /// Print EXIF metadata and the resolved timestamp for a local image.
    Inspect { path: PathBuf },
    /// Normalize a stored field list (or a Document AI response with --documentai).
    Normalize {
        path: PathBuf,
        #[arg(long)]
        documentai: bool,
    },
}

fn init_logging(level: &str) {
    env_logger::Builder::new()
        .filter_level(level.parse().unwrap_or(log::LevelFilter::Info))
        .init();
}

#[actix_web::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("failed to load .env");
        }
    }
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let config = AppConfig::new().context("failed to load configuration")?;
            init_logging(&config.log_level);

            info!("Starting receipt-processor");

            let document_ai = DocumentAiExtractor::new(&config)?;
            info!("Using Document AI processor at {}", document_ai.process_url());
            let extractor: Arc<dyn DocumentExtractor> = Arc::new(document_ai);

            web_server::start_web_server(Arc::new(config), extractor)
                .await
                .context("web server failed")?;

            info!("receipt-processor finished");
        }
        Command::Inspect { path } => {
            init_logging(&std::env::var("RECEIPT_LOG_LEVEL").unwrap_or_else(|_| "warn".into()));

            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let inspection = processor::inspect_image(&bytes);
            println!("{}", serde_json::to_string_pretty(&inspection)?);
        }
        Command::Normalize { path, documentai } => {
            init_logging(&std::env::var("RECEIPT_LOG_LEVEL").unwrap_or_else(|_| "warn".into()));

            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let payload: serde_json::Value = serde_json::from_str(&raw)?;
            let record = if documentai {
                receipt::normalize(&extraction::fields_from_json(&payload)?)
            } else {
                receipt::normalize_value(&payload)?
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
