use thiserror::Error;

/// Run-level failures reported to the stream consumer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Zone not set")]
    ZoneNotSet,

    #[error("Question style not set")]
    NoPatterns,

    #[error("OCR engine is not ready")]
    OcrNotReady,
}

/// Zone validation and extraction failures. Extraction failures skip the page.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ZoneError {
    #[error("zone bounds are invalid: x1={x1}, x2={x2}")]
    Invalid { x1: f64, x2: f64 },

    #[error("zone starts at x={left} but the page is only {width}px wide")]
    OutsidePage { left: u32, width: u32 },

    #[error("zone has no width")]
    Empty,

    #[error("zone too narrow: height {height}px is below {min}px")]
    TooNarrow { height: u32, min: u32 },
}
