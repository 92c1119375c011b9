use std::path::PathBuf;
use std::sync::Arc;

use super::{Document, Extractor, SOURCE_KEY};
use crate::config::PartitionConfig;
use crate::error::ExtractError;
use crate::images::{ImageOcr, IMAGE_TEXT_SEPARATOR};
use crate::partition::{file_name_of, DocumentKind, Element, PartitionRequest, Partitioner};

/// The whole DOCX as a single document, optionally followed by the OCR text
/// of its embedded images.
pub struct DocxExtractor {
    path: PathBuf,
    partitioner: Arc<dyn Partitioner>,
    languages: Vec<String>,
    image_ocr: Option<ImageOcr>,
}

impl DocxExtractor {
    pub fn new(path: impl Into<PathBuf>, partitioner: Arc<dyn Partitioner>) -> Self {
        Self::from_config(path, partitioner, &PartitionConfig::default())
    }

    pub fn from_config(
        path: impl Into<PathBuf>,
        partitioner: Arc<dyn Partitioner>,
        config: &PartitionConfig,
    ) -> Self {
        Self {
            path: path.into(),
            partitioner,
            languages: config.languages.clone(),
            image_ocr: None,
        }
    }

    pub fn with_image_ocr(mut self, image_ocr: ImageOcr) -> Self {
        self.image_ocr = Some(image_ocr);
        self
    }
}

impl Extractor for DocxExtractor {
    fn extract(&self) -> Result<Vec<Document>, ExtractError> {
        let filename = file_name_of(&self.path);
        let _span = tracing::info_span!(
            "extractor.docx",
            file = %filename,
            partitioner = self.partitioner.name()
        )
        .entered();

        let request =
            PartitionRequest::new(&self.path, DocumentKind::Docx).languages(&self.languages);
        let elements = self.partitioner.partition(&request)?;
        let base_text = join_fragments(&elements);

        let image_text = match &self.image_ocr {
            Some(image_ocr) => image_ocr.extract_text(&self.path),
            None => String::new(),
        };
        if !image_text.is_empty() {
            tracing::info!(
                chars = image_text.chars().count(),
                "Appending text recognized in embedded images"
            );
        }

        let combined = append_image_text(&base_text, &image_text);
        if combined.is_empty() {
            tracing::error!(
                "[DOCX] {}: extraction produced no text, upstream partitioning may have failed silently",
                filename
            );
        } else {
            tracing::info!(
                "[DOCX] {}: Successfully extracted {} chars",
                filename,
                combined.chars().count()
            );
        }

        Ok(vec![Document::new(combined)
            .with_metadata(SOURCE_KEY, self.path.display().to_string())])
    }
}

/// Non-empty element texts joined with `\n`, in order.
pub fn join_fragments(elements: &[Element]) -> String {
    elements
        .iter()
        .map(|e| e.text.as_str())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Appends image text after the base text, separated by a blank line.
pub fn append_image_text(base: &str, image_text: &str) -> String {
    match (base.is_empty(), image_text.is_empty()) {
        (_, true) => base.to_string(),
        (true, false) => image_text.to_string(),
        (false, false) => format!("{}{}{}", base, IMAGE_TEXT_SEPARATOR, image_text),
    }
}
