//! OCR over images embedded in a DOCX container.
//!
//! Image parts are found through `word/_rels/document.xml.rels`, typed
//! through `[Content_Types].xml`, written to a scratch directory and sent one
//! by one through the partitioner. Failures on a single image are logged and
//! that image is skipped; the scratch directory is always removed.

pub mod convert;

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::config::{ImageOcrConfig, PartitionConfig};
use crate::error::ImageError;
use crate::partition::{DocumentKind, PartitionRequest, Partitioner, Strategy};

pub use convert::{needs_conversion, ConversionChain, ImageConverter};

const DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";
const CONTENT_TYPES: &str = "[Content_Types].xml";
const IMAGE_REL_SUFFIX: &str = "/image";

/// Separator between fragments of one image and between images.
pub const IMAGE_TEXT_SEPARATOR: &str = "\n\n";

/// File extension for a declared image MIME type. Unknown types map to `.jpg`.
pub fn mime_to_extension(content_type: &str) -> &'static str {
    match content_type.trim().to_lowercase().as_str() {
        "image/png" => ".png",
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/gif" => ".gif",
        "image/bmp" | "image/x-ms-bmp" => ".bmp",
        "image/tiff" => ".tiff",
        "image/webp" => ".webp",
        "image/x-wmf" | "image/wmf" => ".wmf",
        "image/x-emf" | "image/emf" => ".emf",
        _ => ".jpg",
    }
}

/// An image payload written to scratch storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub index: usize,
    pub size: usize,
    pub content_type: String,
    pub extension: &'static str,
    pub path: PathBuf,
}

/// Copies every internal image part of the DOCX at `docx_path` into
/// `scratch_dir` as `image_<index><ext>`, in relationship order.
pub fn extract_images(
    docx_path: &Path,
    scratch_dir: &Path,
) -> Result<Vec<EmbeddedImage>, ImageError> {
    let file = File::open(docx_path).map_err(|e| ImageError::OpenContainer {
        path: docx_path.to_path_buf(),
        source: e,
    })?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ImageError::Container(format!("Failed to open DOCX: {}", e)))?;

    let Some(rels_xml) = read_part(&mut archive, DOCUMENT_RELS)? else {
        return Ok(Vec::new());
    };
    let targets = parse_image_targets(&rels_xml)?;
    if targets.is_empty() {
        return Ok(Vec::new());
    }

    let content_types = match read_part(&mut archive, CONTENT_TYPES)? {
        Some(xml) => ContentTypes::parse(&xml)?,
        None => ContentTypes::default(),
    };

    let mut images = Vec::with_capacity(targets.len());
    for (position, part_name) in targets.iter().enumerate() {
        let index = position + 1;

        let data = match read_binary_part(&mut archive, part_name) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(
                    image = index,
                    part = %part_name,
                    "Skipping unreadable image: {}",
                    e
                );
                continue;
            }
        };

        let content_type = content_types.lookup(part_name);
        let extension = mime_to_extension(&content_type);
        let path = scratch_dir.join(format!("image_{}{}", index, extension));
        if let Err(source) = std::fs::write(&path, &data) {
            let e = ImageError::WriteScratch { path, source };
            tracing::warn!(image = index, part = %part_name, "Skipping image: {}", e);
            continue;
        }

        tracing::debug!(
            image = index,
            size = data.len(),
            content_type = %content_type,
            "Extracted embedded image"
        );
        images.push(EmbeddedImage {
            index,
            size: data.len(),
            content_type,
            extension,
            path,
        });
    }

    Ok(images)
}

/// Runs OCR over the images of a DOCX and returns their combined text.
pub struct ImageOcr {
    partitioner: Arc<dyn Partitioner>,
    chain: ConversionChain,
    languages: Vec<String>,
    ocr_languages: Vec<String>,
    strategy: Strategy,
    scratch_parent: Option<PathBuf>,
}

impl ImageOcr {
    pub fn new(partitioner: Arc<dyn Partitioner>, chain: ConversionChain) -> Self {
        let defaults = PartitionConfig::default();
        Self {
            partitioner,
            chain,
            languages: defaults.languages,
            ocr_languages: defaults.ocr_languages,
            strategy: defaults.image_strategy,
            scratch_parent: None,
        }
    }

    pub fn from_config(
        partitioner: Arc<dyn Partitioner>,
        partition: &PartitionConfig,
        images: &ImageOcrConfig,
    ) -> Self {
        Self {
            partitioner,
            chain: ConversionChain::from_config(images),
            languages: partition.languages.clone(),
            ocr_languages: partition.ocr_languages.clone(),
            strategy: partition.image_strategy,
            scratch_parent: images.scratch_dir.as_ref().map(PathBuf::from),
        }
    }

    pub fn with_scratch_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_parent = Some(dir.into());
        self
    }

    /// OCR text of every readable image in `docx_path`, images separated by a
    /// blank line. Never fails: problems are logged and yield less text.
    pub fn extract_text(&self, docx_path: &Path) -> String {
        let _span = tracing::info_span!("images.ocr", file = %docx_path.display()).entered();

        let scratch = match self.scratch_dir() {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!("Failed to create image scratch directory: {}", e);
                return String::new();
            }
        };

        let texts = match extract_images(docx_path, scratch.path()) {
            Ok(images) => {
                tracing::debug!(count = images.len(), "Found embedded images");
                images
                    .iter()
                    .filter_map(|image| match self.ocr_image(image, scratch.path()) {
                        Ok(text) if !text.is_empty() => Some(text),
                        Ok(_) => None,
                        Err(e) => {
                            tracing::warn!(image = image.index, "Skipping image: {}", e);
                            None
                        }
                    })
                    .collect::<Vec<_>>()
            }
            Err(e) => {
                tracing::warn!("Failed to extract embedded images: {}", e);
                Vec::new()
            }
        };

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::debug!(dir = %scratch_path.display(), "Scratch cleanup failed: {}", e);
        }

        texts.join(IMAGE_TEXT_SEPARATOR)
    }

    fn scratch_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("docingest-images-");
        match &self.scratch_parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
    }

    fn ocr_image(&self, image: &EmbeddedImage, scratch: &Path) -> Result<String, ImageError> {
        let raster = if needs_conversion(image.extension) {
            self.chain.convert(&image.path, scratch)?
        } else {
            image.path.clone()
        };

        let request = PartitionRequest::new(raster, DocumentKind::Image)
            .languages(&self.languages)
            .ocr_languages(&self.ocr_languages)
            .strategy(self.strategy);
        let elements = self.partitioner.partition(&request)?;

        let fragments: Vec<&str> = elements
            .iter()
            .map(|e| e.text.trim())
            .filter(|t| !t.is_empty())
            .collect();

        tracing::debug!(
            image = image.index,
            fragments = fragments.len(),
            "OCR finished for image"
        );
        Ok(fragments.join(IMAGE_TEXT_SEPARATOR))
    }
}

fn read_part<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ImageError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(ImageError::Container(format!(
                "Failed to read {}: {}",
                name, e
            )))
        }
    };
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| ImageError::Container(format!("Failed to read {}: {}", name, e)))?;
    Ok(Some(content))
}

fn read_binary_part<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Vec<u8>, ImageError> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| ImageError::Container(format!("Failed to read {}: {}", name, e)))?;
    let mut data = Vec::new();
    entry
        .read_to_end(&mut data)
        .map_err(|e| ImageError::Container(format!("Failed to read {}: {}", name, e)))?;
    Ok(data)
}

/// Part names of internal image relationships, in document order.
fn parse_image_targets(rels_xml: &str) -> Result<Vec<String>, ImageError> {
    let mut reader = Reader::from_str(rels_xml);
    let mut targets = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let rel_type = attribute(e, b"Type").unwrap_or_default();
                let external = attribute(e, b"TargetMode")
                    .is_some_and(|mode| mode.eq_ignore_ascii_case("External"));
                if !rel_type.ends_with(IMAGE_REL_SUFFIX) || external {
                    continue;
                }
                if let Some(target) = attribute(e, b"Target") {
                    targets.push(resolve_target(&target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ImageError::Container(format!(
                    "Invalid relationships XML: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(targets)
}

/// Resolves a relationship target against the `word/` directory.
fn resolve_target(target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{}", target),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// `[Content_Types].xml`: overrides by part name, defaults by extension.
#[derive(Debug, Default)]
struct ContentTypes {
    overrides: HashMap<String, String>,
    defaults: HashMap<String, String>,
}

impl ContentTypes {
    fn parse(xml: &str) -> Result<Self, ImageError> {
        let mut reader = Reader::from_str(xml);
        let mut types = Self::default();

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    match e.local_name().as_ref() {
                        b"Override" => {
                            if let (Some(part), Some(ct)) =
                                (attribute(e, b"PartName"), attribute(e, b"ContentType"))
                            {
                                types
                                    .overrides
                                    .insert(part.trim_start_matches('/').to_string(), ct);
                            }
                        }
                        b"Default" => {
                            if let (Some(ext), Some(ct)) =
                                (attribute(e, b"Extension"), attribute(e, b"ContentType"))
                            {
                                types.defaults.insert(ext.to_lowercase(), ct);
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ImageError::Container(format!(
                        "Invalid content types XML: {}",
                        e
                    )));
                }
                _ => {}
            }
        }

        Ok(types)
    }

    /// Declared type of `part_name`, falling back to a guess from its extension.
    fn lookup(&self, part_name: &str) -> String {
        if let Some(ct) = self.overrides.get(part_name) {
            return ct.clone();
        }
        let extension = Path::new(part_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if let Some(ct) = self.defaults.get(&extension) {
            return ct.clone();
        }
        mime_guess::from_path(part_name)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string()
    }
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}
