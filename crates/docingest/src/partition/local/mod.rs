//! In-process partitioning for when no API endpoint is configured.

pub mod docx;
pub mod ocr;
pub mod pdf;

use std::time::Duration;

use super::{DocumentKind, Element, PartitionRequest, Partitioner};
use crate::error::PartitionError;

pub use ocr::TesseractOcr;

/// Upper bound for the poppler helpers used while rasterizing PDF pages.
const TOOL_TIMEOUT: Duration = Duration::from_secs(120);

pub struct LocalPartitioner {
    ocr: TesseractOcr,
    tool_timeout: Duration,
}

impl LocalPartitioner {
    pub fn new(ocr_dpi: u32) -> Self {
        Self {
            ocr: TesseractOcr::new(ocr_dpi),
            tool_timeout: TOOL_TIMEOUT,
        }
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }
}

impl Partitioner for LocalPartitioner {
    fn partition(&self, request: &PartitionRequest) -> Result<Vec<Element>, PartitionError> {
        let _span = tracing::info_span!(
            "partition.local",
            file = %request.file_name(),
            kind = ?request.kind
        )
        .entered();

        match request.kind {
            DocumentKind::Pdf => pdf::partition_pdf(
                &request.path,
                &self.ocr,
                request.effective_ocr_languages(),
                self.tool_timeout,
            ),
            DocumentKind::Docx => docx::partition_docx(&request.path),
            DocumentKind::Image => {
                let text = self
                    .ocr
                    .recognize_file(&request.path, request.effective_ocr_languages())?;
                Ok(split_paragraphs(&text)
                    .into_iter()
                    .map(|p| Element::new("NarrativeText", p))
                    .collect())
            }
        }
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Splits text on blank lines into trimmed, non-empty paragraphs.
pub(crate) fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            flush_paragraph(&mut current, &mut paragraphs);
        } else {
            current.push(line.trim_end());
        }
    }
    flush_paragraph(&mut current, &mut paragraphs);

    paragraphs
}

fn flush_paragraph(lines: &mut Vec<&str>, paragraphs: &mut Vec<String>) {
    if lines.is_empty() {
        return;
    }
    let paragraph = lines.join("\n").trim().to_string();
    if !paragraph.is_empty() {
        paragraphs.push(paragraph);
    }
    lines.clear();
}
