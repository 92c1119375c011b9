//! Rasterizing legacy metafile images (WMF/EMF) so OCR can read them.
//!
//! Three strategies are tried in order: the office suite's headless
//! converter, ImageMagick, then an in-process decode and PNG re-encode.
//! The first one that produces a PNG wins.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ImageOcrConfig;
use crate::error::{ConvertError, ImageError};
use crate::subprocess::run_with_timeout;

/// Extensions that need rasterizing before OCR.
const LEGACY_EXTENSIONS: [&str; 2] = ["wmf", "emf"];

pub fn needs_conversion(extension: &str) -> bool {
    let ext = extension.trim_start_matches('.').to_lowercase();
    LEGACY_EXTENSIONS.contains(&ext.as_str())
}

pub trait ImageConverter: Send + Sync {
    /// Converts `input` to a PNG inside `output_dir` and returns its path.
    fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, ConvertError>;

    fn name(&self) -> &str;
}

fn png_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    output_dir.join(format!("{}.png", stem))
}

fn ensure_produced(path: PathBuf) -> Result<PathBuf, ConvertError> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(ConvertError::MissingOutput(path))
    }
}

/// `soffice --headless --convert-to png --outdir <dir> <input>`
pub struct OfficeConverter {
    command: String,
    timeout: Duration,
}

impl OfficeConverter {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

impl ImageConverter for OfficeConverter {
    fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, ConvertError> {
        let args: [&OsStr; 6] = [
            OsStr::new("--headless"),
            OsStr::new("--convert-to"),
            OsStr::new("png"),
            OsStr::new("--outdir"),
            output_dir.as_os_str(),
            input.as_os_str(),
        ];
        run_with_timeout(&self.command, args, Some(output_dir), self.timeout)?;
        ensure_produced(png_output_path(input, output_dir))
    }

    fn name(&self) -> &str {
        "office"
    }
}

/// `convert <input> <output.png>`
pub struct ImageMagickConverter {
    command: String,
    timeout: Duration,
}

impl ImageMagickConverter {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

impl ImageConverter for ImageMagickConverter {
    fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, ConvertError> {
        let output = png_output_path(input, output_dir);
        run_with_timeout(
            &self.command,
            [input.as_os_str(), output.as_os_str()],
            None,
            self.timeout,
        )?;
        ensure_produced(output)
    }

    fn name(&self) -> &str {
        "imagemagick"
    }
}

/// Decodes with the `image` crate and writes a PNG. Only helps when the
/// payload is a bitmap mislabeled as a metafile.
pub struct BitmapReencoder;

impl ImageConverter for BitmapReencoder {
    fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, ConvertError> {
        let data = std::fs::read(input).map_err(|e| ConvertError::Reencode(e.to_string()))?;
        let img =
            image::load_from_memory(&data).map_err(|e| ConvertError::Reencode(e.to_string()))?;

        let output = png_output_path(input, output_dir);
        img.save_with_format(&output, image::ImageFormat::Png)
            .map_err(|e| ConvertError::Reencode(e.to_string()))?;
        ensure_produced(output)
    }

    fn name(&self) -> &str {
        "bitmap"
    }
}

/// Ordered fallback list of converters.
pub struct ConversionChain {
    converters: Vec<Box<dyn ImageConverter>>,
}

impl ConversionChain {
    pub fn new(converters: Vec<Box<dyn ImageConverter>>) -> Self {
        Self { converters }
    }

    pub fn from_config(config: &ImageOcrConfig) -> Self {
        let timeout = Duration::from_secs(config.conversion_timeout_secs);
        let converters: Vec<Box<dyn ImageConverter>> = vec![
            Box::new(OfficeConverter::new(&config.office_command, timeout)),
            Box::new(ImageMagickConverter::new(
                &config.image_magick_command,
                timeout,
            )),
            Box::new(BitmapReencoder),
        ];
        Self::new(converters)
    }

    pub fn converter_names(&self) -> Vec<&str> {
        self.converters.iter().map(|c| c.name()).collect()
    }

    pub fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, ImageError> {
        let _span = tracing::debug_span!("convert", input = %input.display()).entered();

        let mut attempts = Vec::with_capacity(self.converters.len());
        for converter in &self.converters {
            match converter.convert(input, output_dir) {
                Ok(output) => {
                    tracing::info!(
                        converter = converter.name(),
                        output = %output.display(),
                        "Converted legacy image"
                    );
                    return Ok(output);
                }
                Err(e) => {
                    tracing::debug!(
                        converter = converter.name(),
                        "Conversion attempt failed: {}",
                        e
                    );
                    attempts.push(format!("{}: {}", converter.name(), e));
                }
            }
        }

        Err(ImageError::Unconvertible {
            path: input.to_path_buf(),
            attempts: attempts.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scripted {
        name: &'static str,
        succeed: bool,
        calls: Arc<AtomicUsize>,
    }

    impl ImageConverter for Scripted {
        fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, ConvertError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                let output = png_output_path(input, output_dir);
                std::fs::write(&output, b"png").unwrap();
                Ok(output)
            } else {
                Err(ConvertError::Reencode(format!("{} unavailable", self.name)))
            }
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn scripted(
        name: &'static str,
        succeed: bool,
        calls: &Arc<AtomicUsize>,
    ) -> Box<dyn ImageConverter> {
        Box::new(Scripted {
            name,
            succeed,
            calls: Arc::clone(calls),
        })
    }

    #[test]
    fn test_needs_conversion() {
        assert!(needs_conversion(".wmf"));
        assert!(needs_conversion("EMF"));
        assert!(!needs_conversion(".png"));
        assert!(!needs_conversion("jpg"));
    }

    #[test]
    fn test_first_success_wins() {
        let dir = tempfile::tempdir().unwrap();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let third = Arc::new(AtomicUsize::new(0));
        let chain = ConversionChain::new(vec![
            scripted("a", false, &first),
            scripted("b", true, &second),
            scripted("c", true, &third),
        ]);

        let output = chain
            .convert(&dir.path().join("image_1.wmf"), dir.path())
            .unwrap();
        assert_eq!(output, dir.path().join("image_1.png"));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(third.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_all_failures_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = ConversionChain::new(vec![
            scripted("a", false, &calls),
            scripted("b", false, &calls),
        ]);

        match chain.convert(&dir.path().join("image_1.emf"), dir.path()) {
            Err(ImageError::Unconvertible { attempts, .. }) => {
                assert!(attempts.contains("a: "));
                assert!(attempts.contains("b: "));
            }
            other => panic!("Expected Unconvertible, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_default_chain_order() {
        let chain = ConversionChain::from_config(&ImageOcrConfig::default());
        assert_eq!(chain.converter_names(), vec!["office", "imagemagick", "bitmap"]);
    }

    #[test]
    fn test_missing_tools_fail_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("image_1.wmf");
        std::fs::write(&input, b"\xd7\xcd\xc6\x9a not really a metafile").unwrap();

        let timeout = Duration::from_secs(5);
        let office = OfficeConverter::new("docingest-missing-soffice", timeout);
        assert!(matches!(
            office.convert(&input, dir.path()),
            Err(ConvertError::Spawn { .. })
        ));
        let magick = ImageMagickConverter::new("docingest-missing-convert", timeout);
        assert!(matches!(
            magick.convert(&input, dir.path()),
            Err(ConvertError::Spawn { .. })
        ));
        assert!(matches!(
            BitmapReencoder.convert(&input, dir.path()),
            Err(ConvertError::Reencode(_))
        ));
    }

    #[test]
    fn test_bitmap_reencoder_handles_real_bitmaps() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("image_2.wmf");
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([255, 255, 255]));
        img.save_with_format(&input, image::ImageFormat::Bmp).unwrap();

        let output = BitmapReencoder.convert(&input, dir.path()).unwrap();
        assert_eq!(output.extension().and_then(|e| e.to_str()), Some("png"));
        assert!(image::open(&output).is_ok());
    }
}
