use std::io::Cursor;
use std::path::Path;

use crate::error::PartitionError;

/// In-process Tesseract OCR.
#[derive(Debug, Clone, Copy)]
pub struct TesseractOcr {
    dpi: u32,
}

impl TesseractOcr {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }

    /// Resolution used when rasterizing PDF pages for OCR.
    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn recognize_file(
        &self,
        image_path: &Path,
        languages: &[String],
    ) -> Result<String, PartitionError> {
        let data = std::fs::read(image_path).map_err(|e| PartitionError::ReadDocument {
            path: image_path.to_path_buf(),
            source: e,
        })?;
        self.recognize_bytes(&data, languages)
    }

    pub fn recognize_bytes(
        &self,
        image_data: &[u8],
        languages: &[String],
    ) -> Result<String, PartitionError> {
        let _span = tracing::info_span!("partition.ocr").entered();

        let img = image::load_from_memory(image_data)
            .map_err(|e| PartitionError::OcrFailed(format!("Failed to load image: {}", e)))?;

        // leptess reads from an encoded buffer, normalize to PNG
        let mut png_data = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| PartitionError::OcrFailed(format!("Failed to convert image: {}", e)))?;

        let mut lt = leptess::LepTess::new(None, &tesseract_languages(languages)).map_err(|e| {
            PartitionError::OcrFailed(format!("Failed to initialize Tesseract: {}", e))
        })?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| PartitionError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| PartitionError::OcrFailed(format!("OCR failed: {}", e)))
    }
}

/// Tesseract language string (`rus+eng`); English when no hint is given.
fn tesseract_languages(languages: &[String]) -> String {
    if languages.is_empty() {
        "eng".to_string()
    } else {
        languages.join("+")
    }
}
