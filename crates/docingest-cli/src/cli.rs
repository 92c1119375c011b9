use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "docingest")]
#[command(about = "Extract text from PDF/DOCX files and push them to a dataset")]
#[command(version)]
pub struct Cli {
    /// JSON config file; defaults plus environment variables when omitted
    #[arg(long, global = true, env = "DOCINGEST_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long = "log-format", global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Extract documents from a PDF or DOCX file
    Extract {
        file: PathBuf,
        /// Print documents as JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Show whether partitioning is enabled for each extension
    Toggles {
        #[arg(required = true)]
        extensions: Vec<String>,
    },
    /// Upload a file to the configured dataset
    Upload {
        file: PathBuf,
        /// Name to upload the file under
        #[arg(long)]
        name: Option<String>,
        /// Poll until indexing finishes
        #[arg(long)]
        wait: bool,
        /// Polling deadline in seconds; the config value when omitted
        #[arg(long = "max-wait")]
        max_wait: Option<u64>,
    },
    /// Show the indexing status of a dataset document
    Status { document_id: String },
    /// Delete a dataset document
    Delete { document_id: String },
}
