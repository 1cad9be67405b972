mod parse;
mod tesseract;

use anyhow::{Context, Result};
use image::DynamicImage;
use std::io::Write;
use std::time::Duration;
use tracing::debug;

use crate::ocr::{OcrEngine, RawToken};

pub use tesseract::list_tesseract_languages;

/// OCR backed by the `tesseract` command line tool.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    languages: String,
    psm: u32,
    limit: Option<Duration>,
}

impl TesseractEngine {
    /// Verifies the binary and the requested languages. Blocks while tesseract runs.
    pub fn initialize(languages: &str, psm: u32) -> Result<Self> {
        let version = tesseract::tesseract_version()?;
        let languages = tesseract::normalize_ocr_languages(languages)?;
        debug!("tesseract {} ready (languages={}, psm={})", version, languages, psm);
        Ok(Self {
            languages,
            psm,
            limit: None,
        })
    }

    /// Kills any single tesseract invocation that runs longer than `limit`.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RawToken>> {
        let mut tmp = tempfile::Builder::new()
            .prefix("qsnap-zone-")
            .suffix(".png")
            .tempfile()
            .with_context(|| "failed to create temp file for OCR")?;
        image
            .write_to(&mut tmp, image::ImageFormat::Png)
            .with_context(|| "failed to write temp image for OCR")?;
        tmp.flush().ok();

        let tsv = tesseract::run_tesseract_tsv(tmp.path(), &self.languages, self.psm, self.limit)?;
        Ok(parse::parse_tsv_tokens(&tsv))
    }
}
