//! Tesseract extraction backend.
//!
//! Shells out to the `tesseract` binary for images and to `pdftoppm`
//! (poppler-utils) for PDF rasterization. Plain-text payloads are
//! decoded directly without OCR.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::{debug, warn};

use super::{OcrError, TextExtractor};

/// OCR settings for the Tesseract backend.
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Tesseract language pack, e.g. "eng".
    pub language: String,
    /// Rasterization DPI for PDF pages.
    pub dpi: u32,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            dpi: 300,
        }
    }
}

/// Text extractor backed by the system Tesseract install.
pub struct TesseractExtractor {
    config: TesseractConfig,
}

impl TesseractExtractor {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    /// Whether the required binaries are on PATH.
    pub fn check_available() -> Result<(), OcrError> {
        if which::which("tesseract").is_err() {
            return Err(OcrError::BackendNotAvailable(
                "tesseract",
                "install tesseract-ocr",
            ));
        }
        if which::which("pdftoppm").is_err() {
            return Err(OcrError::BackendNotAvailable(
                "pdftoppm",
                "install poppler-utils",
            ));
        }
        Ok(())
    }

    fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.config.language])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(OcrError::ExtractionFailed(format!(
                    "tesseract failed: {stderr}"
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                OcrError::BackendNotAvailable("tesseract", "install tesseract-ocr"),
            ),
            Err(e) => Err(OcrError::Io(e)),
        }
    }

    /// Rasterize every PDF page into `output_dir` and return the images
    /// in page order.
    fn pdf_to_images(&self, pdf_path: &Path, output_dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
        let output_prefix = output_dir.join("page");
        let dpi = self.config.dpi.to_string();

        let status = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi])
            .arg(pdf_path)
            .arg(&output_prefix)
            .status();

        match status {
            Ok(s) if s.success() => {
                let mut pages: Vec<PathBuf> = std::fs::read_dir(output_dir)?
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
                    .collect();
                // pdftoppm zero-pads page numbers, so name order is page order
                pages.sort();
                if pages.is_empty() {
                    return Err(OcrError::ExtractionFailed(
                        "pdftoppm produced no pages".to_string(),
                    ));
                }
                Ok(pages)
            }
            Ok(_) => Err(OcrError::ExtractionFailed(
                "pdftoppm failed to rasterize PDF".to_string(),
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                OcrError::BackendNotAvailable("pdftoppm", "install poppler-utils"),
            ),
            Err(e) => Err(OcrError::Io(e)),
        }
    }

    fn extract_blocking(&self, bytes: &[u8], filename: &str) -> Result<String, OcrError> {
        let start = Instant::now();
        let kind = detect_kind(bytes, filename);

        let text = match kind {
            PayloadKind::Text => String::from_utf8_lossy(bytes).to_string(),
            PayloadKind::Pdf => {
                let scratch = TempDir::new()?;
                let pdf_path = scratch.path().join("input.pdf");
                std::fs::write(&pdf_path, bytes)?;

                let pages = self.pdf_to_images(&pdf_path, scratch.path())?;
                let mut combined = String::new();
                for page in &pages {
                    combined.push_str(&self.run_tesseract(page)?);
                    combined.push('\n');
                }
                combined
            }
            PayloadKind::Image => {
                let scratch = TempDir::new()?;
                let ext = Path::new(filename)
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("png");
                let image_path = scratch.path().join(format!("input.{ext}"));
                std::fs::write(&image_path, bytes)?;
                self.run_tesseract(&image_path)?
            }
        };

        debug!(
            filename,
            chars = text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "text extraction finished"
        );
        Ok(text)
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract(&self, bytes: &[u8], filename: &str) -> Result<String, OcrError> {
        let this = Self {
            config: self.config.clone(),
        };
        let bytes = bytes.to_vec();
        let filename = filename.to_string();

        tokio::task::spawn_blocking(move || this.extract_blocking(&bytes, &filename))
            .await
            .map_err(|e| OcrError::ExtractionFailed(format!("extraction task panicked: {e}")))?
    }
}

enum PayloadKind {
    Pdf,
    Image,
    Text,
}

/// Classify the payload by magic bytes, falling back to the file
/// extension for formats `infer` does not recognize (plain text).
fn detect_kind(bytes: &[u8], filename: &str) -> PayloadKind {
    if let Some(kind) = infer::get(bytes) {
        return match kind.mime_type() {
            "application/pdf" => PayloadKind::Pdf,
            mime if mime.starts_with("image/") => PayloadKind::Image,
            other => {
                warn!(filename, mime = other, "unrecognized payload type, treating as text");
                PayloadKind::Text
            }
        };
    }

    match Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => PayloadKind::Pdf,
        Some("png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp") => PayloadKind::Image,
        _ => PayloadKind::Text,
    }
}
