use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use super::ocr::TesseractOcr;
use super::split_paragraphs;
use crate::error::PartitionError;
use crate::partition::Element;
use crate::subprocess::run_with_timeout;

/// Pattern for Identity-H Unimplemented errors (common with CID fonts).
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Text shorter than this is considered valid regardless of composition.
const MIN_TOTAL_CHARS: usize = 50;

/// Below this share of alphanumeric characters, extracted text is treated as
/// garbled and the page is OCR'd instead.
const MIN_ALPHANUMERIC_PERCENT: usize = 10;

/// Partitions a PDF page by page: embedded text where usable, OCR of the
/// rendered page otherwise.
pub(super) fn partition_pdf(
    path: &Path,
    ocr: &TesseractOcr,
    ocr_languages: &[String],
    tool_timeout: Duration,
) -> Result<Vec<Element>, PartitionError> {
    let _span = tracing::info_span!("partition.local.pdf").entered();

    let pdf_bytes = std::fs::read(path).map_err(|e| PartitionError::ReadDocument {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut elements = Vec::new();

    match lopdf::Document::load_mem(&pdf_bytes) {
        Ok(doc) => {
            for (page_num, _) in doc.get_pages() {
                let mut text = doc.extract_text(&[page_num]).unwrap_or_default();
                if should_use_ocr(&text) {
                    let _ocr_span =
                        tracing::info_span!("partition.ocr_fallback", page = page_num).entered();
                    match ocr_page(path, page_num, ocr, ocr_languages, tool_timeout) {
                        Ok(ocr_text) => text = ocr_text,
                        Err(e) => {
                            tracing::warn!(page = page_num, "OCR fallback failed: {}", e);
                        }
                    }
                }
                push_page(&mut elements, page_num, &text);
            }
        }
        Err(e) => {
            // lopdf can't parse every PDF variant; poppler usually can
            tracing::warn!(
                "lopdf failed to parse {}: {}. Falling back to OCR.",
                path.display(),
                e
            );
            let page_count = count_pdf_pages(path, tool_timeout)?;
            for page_num in 1..=page_count {
                match ocr_page(path, page_num, ocr, ocr_languages, tool_timeout) {
                    Ok(text) => push_page(&mut elements, page_num, &text),
                    Err(e) => tracing::warn!(page = page_num, "OCR of page failed: {}", e),
                }
            }
        }
    }

    Ok(elements)
}

fn push_page(elements: &mut Vec<Element>, page_num: u32, text: &str) {
    elements.extend(
        split_paragraphs(text)
            .into_iter()
            .map(|p| Element::new("NarrativeText", p).on_page(page_num)),
    );
}

fn ocr_page(
    path: &Path,
    page_num: u32,
    ocr: &TesseractOcr,
    ocr_languages: &[String],
    tool_timeout: Duration,
) -> Result<String, PartitionError> {
    let image_data = render_pdf_page_to_image(path, page_num, ocr.dpi(), tool_timeout)?;
    ocr.recognize_bytes(&image_data, ocr_languages)
}

/// Whether extracted page text is unusable: empty, nothing but font
/// encoding error markers, or mostly non-alphanumeric noise.
pub(super) fn should_use_ocr(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");
    if cleaned.is_empty() {
        return true;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();

    total_chars > MIN_TOTAL_CHARS
        && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
}

/// Page count via `pdfinfo`, for PDFs lopdf can't open.
fn count_pdf_pages(path: &Path, timeout: Duration) -> Result<u32, PartitionError> {
    let output = run_with_timeout("pdfinfo", [path.as_os_str()], None, timeout)
        .map_err(|e| PartitionError::Pdf(format!("pdfinfo failed: {}", e)))?;

    Ok(parse_pdfinfo_pages(&String::from_utf8_lossy(&output.stdout)).unwrap_or(1))
}

fn parse_pdfinfo_pages(stdout: &str) -> Option<u32> {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|count| count.trim().parse().ok())
}

fn render_pdf_page_to_image(
    path: &Path,
    page_num: u32,
    dpi: u32,
    timeout: Duration,
) -> Result<Vec<u8>, PartitionError> {
    let scratch = tempfile::Builder::new()
        .prefix("docingest-page-")
        .tempdir()
        .map_err(|e| PartitionError::Pdf(format!("Failed to create scratch dir: {}", e)))?;
    let output_prefix = scratch.path().join(format!("page_{}", uuid::Uuid::new_v4()));

    let dpi_arg = dpi.to_string();
    let page_arg = page_num.to_string();
    let args: [&OsStr; 9] = [
        OsStr::new("-png"),
        OsStr::new("-r"),
        OsStr::new(&dpi_arg),
        OsStr::new("-f"),
        OsStr::new(&page_arg),
        OsStr::new("-l"),
        OsStr::new(&page_arg),
        path.as_os_str(),
        output_prefix.as_os_str(),
    ];
    run_with_timeout("pdftoppm", args, None, timeout)
        .map_err(|e| PartitionError::Pdf(format!("pdftoppm failed: {}", e)))?;

    // pdftoppm zero-pads the page suffix to the width of the page count
    let prefix = output_prefix.display().to_string();
    let candidates = [
        format!("{}-{}.png", prefix, page_num),
        format!("{}-{:02}.png", prefix, page_num),
        format!("{}-{:03}.png", prefix, page_num),
    ];
    let image_path = candidates
        .iter()
        .find(|p| Path::new(p).exists())
        .ok_or_else(|| PartitionError::Pdf("Failed to find rendered page image".to_string()))?;

    std::fs::read(image_path)
        .map_err(|e| PartitionError::Pdf(format!("Failed to read rendered image: {}", e)))
}
