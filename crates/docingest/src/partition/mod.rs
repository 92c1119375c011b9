//! The partitioning boundary: turn a file into an ordered list of text
//! elements, either through the remote partitioning API or in-process.

pub mod local;
pub mod remote;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::schema::PartitionConfig;
use crate::error::{ConfigError, PartitionError};

pub use local::LocalPartitioner;
pub use remote::RemotePartitioner;

/// Processing strategy hint understood by the partitioning API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Auto,
    Fast,
    HiRes,
    OcrOnly,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Auto => "auto",
            Strategy::Fast => "fast",
            Strategy::HiRes => "hi_res",
            Strategy::OcrOnly => "ocr_only",
        }
    }
}

/// Which partitioning routine applies to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Image,
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "tif" | "tiff" | "webp" => {
                Some(DocumentKind::Image)
            }
            _ => None,
        }
    }
}

/// One partitioning call.
#[derive(Debug, Clone)]
pub struct PartitionRequest {
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub languages: Vec<String>,
    pub ocr_languages: Vec<String>,
    pub strategy: Option<Strategy>,
}

impl PartitionRequest {
    pub fn new(path: impl Into<PathBuf>, kind: DocumentKind) -> Self {
        Self {
            path: path.into(),
            kind,
            languages: Vec::new(),
            ocr_languages: Vec::new(),
            strategy: None,
        }
    }

    pub fn languages(mut self, languages: &[String]) -> Self {
        self.languages = languages.to_vec();
        self
    }

    pub fn ocr_languages(mut self, languages: &[String]) -> Self {
        self.ocr_languages = languages.to_vec();
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Languages to hand to an OCR engine: the explicit OCR hints, falling
    /// back to the general language hints.
    pub fn effective_ocr_languages(&self) -> &[String] {
        if self.ocr_languages.is_empty() {
            &self.languages
        } else {
            &self.ocr_languages
        }
    }

    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }
}

/// A structural text element, shaped like the partitioning API's JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(rename = "type", default = "default_element_type")]
    pub element_type: String,
    #[serde(default)]
    pub element_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: ElementMetadata,
}

fn default_element_type() -> String {
    "UncategorizedText".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementMetadata {
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
}

impl Element {
    pub fn new(element_type: &str, text: impl Into<String>) -> Self {
        Self {
            element_type: element_type.to_string(),
            element_id: None,
            text: text.into(),
            metadata: ElementMetadata::default(),
        }
    }

    pub fn on_page(mut self, page_number: u32) -> Self {
        self.metadata.page_number = Some(page_number);
        self
    }

    pub fn page_number(&self) -> Option<u32> {
        self.metadata.page_number
    }
}

/// Anything that can split a file into text elements.
pub trait Partitioner: Send + Sync {
    fn partition(&self, request: &PartitionRequest) -> Result<Vec<Element>, PartitionError>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// Builds the remote partitioner when an API URL is configured, the
/// in-process one otherwise.
pub fn build_partitioner(config: &PartitionConfig) -> Result<Arc<dyn Partitioner>, ConfigError> {
    match config.api_url.as_deref().filter(|url| !url.trim().is_empty()) {
        Some(url) => {
            let api_key = config.credential().resolve_optional()?;
            let remote = RemotePartitioner::new(url, api_key, config.request_timeout_secs)
                .map_err(|e| ConfigError::Validation {
                    message: e.to_string(),
                })?;
            tracing::info!(api_url = url, "Using remote partitioning API");
            Ok(Arc::new(remote))
        }
        None => {
            tracing::info!("No partitioning API configured, partitioning in-process");
            let local = LocalPartitioner::new(config.ocr_dpi)
                .with_tool_timeout(Duration::from_secs(config.tool_timeout_secs));
            Ok(Arc::new(local))
        }
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string()
}
