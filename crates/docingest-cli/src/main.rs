mod cli;

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, LogFormat};
use docingest::dataset::IndexingOutcome;
use docingest::{
    load_config, toggle, Config, DatasetClient, Document, ExtractError, ExtractorRegistry,
    ProcessRule,
};

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

fn load(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading config file");
            load_config(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => {
            tracing::debug!("No config file given, using defaults and environment");
            Ok(Config::from_env())
        }
    }
}

fn dataset_client(config: &Config) -> Result<DatasetClient> {
    let Some(dataset) = &config.dataset else {
        bail!(
            "No dataset configured: set DATASET_API_URL and DATASET_ID or add a dataset section"
        );
    };
    DatasetClient::from_config(dataset).context("Failed to create dataset client")
}

fn print_documents(documents: &[Document], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(documents)?);
        return Ok(());
    }
    for (i, doc) in documents.iter().enumerate() {
        let page = doc
            .metadata
            .get(docingest::extractor::PAGE_KEY)
            .map(|p| format!(" (page {})", p))
            .unwrap_or_default();
        println!("--- document {}{} ---", i + 1, page);
        println!("{}", doc.page_content);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = load(cli.config.as_deref())?;

    match cli.cmd {
        Command::Extract { file, json } => {
            let registry = ExtractorRegistry::from_config(&config)?;
            match registry.extract(&file) {
                Ok(documents) => print_documents(&documents, json),
                Err(ExtractError::Disabled(ext)) => bail!(
                    "Partitioning is disabled for .{} files ({}=false)",
                    ext,
                    toggle::toggle_var_name(&ext)
                ),
                Err(e) => Err(e).with_context(|| format!("Failed to extract {}", file.display())),
            }
        }
        Command::Toggles { extensions } => {
            for ext in extensions {
                let state = if toggle::is_enabled(&ext) {
                    "enabled"
                } else {
                    "disabled"
                };
                println!("{:<24} {}", toggle::toggle_var_name(&ext), state);
            }
            Ok(())
        }
        Command::Upload {
            file,
            name,
            wait,
            max_wait,
        } => {
            let client = dataset_client(&config)?;
            let receipt = client
                .create_by_file(&file, name.as_deref(), &ProcessRule::automatic())
                .with_context(|| format!("Failed to upload {}", file.display()))?;
            println!("document_id: {}", receipt.document_id);
            println!("batch: {}", receipt.batch);

            if wait {
                let settings = config.dataset.as_ref();
                let max_wait = max_wait
                    .or(settings.map(|d| d.max_wait_secs))
                    .unwrap_or(120);
                let interval = settings.map(|d| d.poll_interval_secs).unwrap_or(2);
                let outcome = client.wait_for_indexing(
                    &receipt.document_id,
                    Duration::from_secs(max_wait),
                    Duration::from_secs(interval),
                )?;
                match outcome {
                    IndexingOutcome::Completed(status) => {
                        println!("status: {}", status.indexing_status);
                        println!("segments: {}", status.segment_count.unwrap_or(0));
                        println!("tokens: {}", status.tokens.unwrap_or(0));
                        println!("characters: {}", status.character_count.unwrap_or(0));
                    }
                    IndexingOutcome::Failed(status) => bail!(
                        "Indexing failed: {}",
                        status.error.unwrap_or_else(|| "unknown error".to_string())
                    ),
                    IndexingOutcome::TimedOut { last_status } => bail!(
                        "Timed out after {}s (last status: {})",
                        max_wait,
                        last_status
                            .map(|s| s.indexing_status.to_string())
                            .unwrap_or_else(|| "unknown".to_string())
                    ),
                }
            }
            Ok(())
        }
        Command::Status { document_id } => {
            let client = dataset_client(&config)?;
            let status = client.document(&document_id)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Command::Delete { document_id } => {
            let client = dataset_client(&config)?;
            client.delete_document(&document_id)?;
            println!("deleted: {}", document_id);
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);
    run(cli)
}
