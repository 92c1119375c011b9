use std::path::PathBuf;
use std::sync::Arc;

use super::{Document, Extractor, PAGE_KEY, SOURCE_KEY};
use crate::config::PartitionConfig;
use crate::error::ExtractError;
use crate::partition::{file_name_of, DocumentKind, Element, PartitionRequest, Partitioner};

/// One document per page, in the order pages first appear.
pub struct PdfExtractor {
    path: PathBuf,
    partitioner: Arc<dyn Partitioner>,
    languages: Vec<String>,
    ocr_languages: Vec<String>,
}

impl PdfExtractor {
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
            ocr_languages: config.ocr_languages.clone(),
        }
    }
}

impl Extractor for PdfExtractor {
    fn extract(&self) -> Result<Vec<Document>, ExtractError> {
        let filename = file_name_of(&self.path);
        let _span = tracing::info_span!(
            "extractor.pdf",
            file = %filename,
            partitioner = self.partitioner.name()
        )
        .entered();

        let request = PartitionRequest::new(&self.path, DocumentKind::Pdf)
            .languages(&self.languages)
            .ocr_languages(&self.ocr_languages);
        let elements = self.partitioner.partition(&request)?;

        let source = self.path.display().to_string();
        let documents: Vec<Document> = group_by_page(&elements)
            .into_iter()
            .map(|(page, text)| {
                Document::new(text)
                    .with_metadata(SOURCE_KEY, source.as_str())
                    .with_metadata(PAGE_KEY, page.to_string())
            })
            .collect();

        let total_chars: usize = documents
            .iter()
            .map(|d| d.page_content.chars().count())
            .sum();
        tracing::info!(
            "[PDF] {}: Successfully extracted {} chars from {} pages",
            filename,
            total_chars,
            documents.len()
        );

        Ok(documents)
    }
}

/// Groups element text by page number in first-seen page order. Fragments
/// on a page are joined with `\n` and the result is trimmed. Elements
/// without a page number are dropped.
pub fn group_by_page(elements: &[Element]) -> Vec<(u32, String)> {
    let mut pages: Vec<(u32, String)> = Vec::new();

    for element in elements {
        let Some(page) = element.page_number() else {
            continue;
        };
        match pages.iter_mut().find(|(p, _)| *p == page) {
            Some((_, text)) => {
                text.push('\n');
                text.push_str(&element.text);
            }
            None => pages.push((page, element.text.clone())),
        }
    }

    pages
        .into_iter()
        .map(|(page, text)| (page, text.trim().to_string()))
        .collect()
}
