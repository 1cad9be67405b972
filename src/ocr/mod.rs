mod engine;
mod preprocess;

use anyhow::Result;
use image::DynamicImage;
use std::sync::{Arc, OnceLock};

use crate::error::PipelineError;

pub use engine::{list_tesseract_languages, TesseractEngine};
pub use preprocess::preprocess_for_labels;

/// Granularity of a detection, using tesseract's TSV level codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionLevel {
    Page,
    Block,
    Paragraph,
    Line,
    Word,
}

impl DetectionLevel {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Page),
            2 => Some(Self::Block),
            3 => Some(Self::Paragraph),
            4 => Some(Self::Line),
            5 => Some(Self::Word),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    pub level: DetectionLevel,
    pub text: String,
    /// Top of the bounding box in the coordinate space of the recognized image.
    pub top: u32,
}

impl RawToken {
    pub fn word(text: impl Into<String>, top: u32) -> Self {
        Self {
            level: DetectionLevel::Word,
            text: text.into(),
            top,
        }
    }
}

/// Text recognition capability. A single instance is shared by every run.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<RawToken>>;
}

/// Process-wide OCR slot, filled once the engine has finished initializing.
#[derive(Clone, Default)]
pub struct SharedOcr {
    inner: Arc<OnceLock<Arc<dyn OcrEngine>>>,
}

impl SharedOcr {
    pub fn ready(engine: Arc<dyn OcrEngine>) -> Self {
        let shared = Self::default();
        shared.install(engine);
        shared
    }

    /// Returns `false` if an engine was already installed.
    pub fn install(&self, engine: Arc<dyn OcrEngine>) -> bool {
        self.inner.set(engine).is_ok()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.get().is_some()
    }

    pub fn get(&self) -> Result<Arc<dyn OcrEngine>, PipelineError> {
        self.inner.get().cloned().ok_or(PipelineError::OcrNotReady)
    }
}

/// Runs OCR over a zone image and returns word-level tokens with `top` mapped back
/// to page pixels.
pub fn detect_tokens(
    engine: &dyn OcrEngine,
    zone: &DynamicImage,
    upscale: u32,
) -> Result<Vec<RawToken>> {
    let upscale = upscale.max(1);
    let prepared = preprocess_for_labels(zone, upscale);
    let tokens = engine.recognize(&prepared)?;
    Ok(tokens
        .into_iter()
        .filter(|token| token.level == DetectionLevel::Word)
        .filter_map(|token| {
            let text = token.text.trim();
            if text.is_empty() {
                return None;
            }
            Some(RawToken {
                level: token.level,
                text: text.to_string(),
                top: (token.top as f64 / upscale as f64).round() as u32,
            })
        })
        .collect())
}
