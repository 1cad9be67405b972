//! Splits scanned question papers into one image per question.
//!
//! Pages are uploaded into a [`session::Session`], the operator configures the
//! column that holds the question numbers, and a run OCRs that column on every
//! page to find where each question starts before cropping the page there.

pub mod error;
pub mod logging;
pub mod normalize;
pub mod ocr;
pub mod pattern;
pub mod pipeline;
pub mod segment;
pub mod server;
pub mod session;
pub mod settings;
mod test_util;

pub use error::{PipelineError, ZoneError};
pub use normalize::normalize;
pub use ocr::{OcrEngine, RawToken, SharedOcr, TesseractEngine};
pub use pattern::{Pattern, PatternSet};
pub use pipeline::{PipelineEvent, RunOutcome, SegmentOptions};
pub use server::ServerState;
pub use session::{Session, SessionConfig, SessionStore};
