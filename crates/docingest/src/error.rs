use std::path::PathBuf;
use thiserror::Error;

use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum DocIngestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Partitioning error: {0}")]
    Partition(#[from] PartitionError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Dataset API error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to resolve secret: {0}")]
    Secret(#[from] SecretError),
}

#[derive(Error, Debug)]
pub enum PartitionError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Partitioning request failed: {0}")]
    Http(String),

    #[error("Partitioning API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid partitioning response: {0}")]
    InvalidResponse(String),

    #[error("Failed to partition PDF: {0}")]
    Pdf(String),

    #[error("Failed to partition DOCX: {0}")]
    Docx(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' did not finish within {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("'{command}' exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Converter reported success but '{0}' was not produced")]
    MissingOutput(PathBuf),

    #[error("Failed to re-encode bitmap: {0}")]
    Reencode(String),

    #[error("Failed to start subprocess runtime: {0}")]
    Runtime(String),
}

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Failed to open container '{path}': {source}")]
    OpenContainer {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid container: {0}")]
    Container(String),

    #[error("Failed to write scratch file '{path}': {source}")]
    WriteScratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No converter could rasterize '{path}' (tried: {attempts})")]
    Unconvertible { path: PathBuf, attempts: String },

    #[error("OCR partitioning failed: {0}")]
    Ocr(#[from] PartitionError),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Partitioning is disabled for '.{0}' files")]
    Disabled(String),

    #[error(transparent)]
    Partition(#[from] PartitionError),
}

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read upload '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Dataset request failed: {0}")]
    Http(String),

    #[error("Dataset API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid dataset response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, DocIngestError>;
