pub mod docx;
pub mod pdf;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{Config, ImageOcrConfig, PartitionConfig};
use crate::error::{ConfigError, ExtractError};
use crate::images::ImageOcr;
use crate::partition::{build_partitioner, Partitioner};
use crate::toggle;

pub use docx::DocxExtractor;
pub use pdf::PdfExtractor;

/// Metadata key holding the source file path.
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding the 1-based page number of a PDF page.
pub const PAGE_KEY: &str = "page";

/// A unit of extracted text handed to the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

pub trait Extractor {
    fn extract(&self) -> Result<Vec<Document>, ExtractError>;
}

type ToggleLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Picks an extractor by file extension, honoring the per-extension toggles.
pub struct ExtractorRegistry {
    partitioner: Arc<dyn Partitioner>,
    partition: PartitionConfig,
    images: ImageOcrConfig,
    toggle_lookup: ToggleLookup,
}

impl ExtractorRegistry {
    pub fn new(
        partitioner: Arc<dyn Partitioner>,
        partition: PartitionConfig,
        images: ImageOcrConfig,
    ) -> Self {
        Self {
            partitioner,
            partition,
            images,
            toggle_lookup: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let partitioner = build_partitioner(&config.partition)?;
        Ok(Self::new(
            partitioner,
            config.partition.clone(),
            config.images.clone(),
        ))
    }

    /// Replaces the environment as the source of toggle values.
    pub fn with_toggle_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.toggle_lookup = Arc::new(lookup);
        self
    }

    pub fn is_enabled(&self, extension: &str) -> bool {
        toggle::is_enabled_with(extension, |name| (self.toggle_lookup)(name))
    }

    pub fn extract(&self, path: &Path) -> Result<Vec<Document>, ExtractError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        if !matches!(extension.as_str(), "pdf" | "docx") {
            return Err(ExtractError::UnsupportedFormat(extension));
        }

        if !self.is_enabled(&extension) {
            tracing::info!(
                file = %path.display(),
                variable = %toggle::toggle_var_name(&extension),
                "Partitioning disabled for this file type"
            );
            return Err(ExtractError::Disabled(extension));
        }

        let partitioner = Arc::clone(&self.partitioner);
        match extension.as_str() {
            "pdf" => PdfExtractor::from_config(path, partitioner, &self.partition).extract(),
            _ => {
                let mut extractor = DocxExtractor::from_config(path, partitioner, &self.partition);
                if self.images.enabled {
                    extractor = extractor.with_image_ocr(ImageOcr::from_config(
                        Arc::clone(&self.partitioner),
                        &self.partition,
                        &self.images,
                    ));
                }
                extractor.extract()
            }
        }
    }
}
