use serde::{Deserialize, Serialize};

use crate::session::DEFAULT_SESSION;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct SessionQuery {
    pub(crate) session: Option<String>,
}

impl SessionQuery {
    pub(crate) fn id(&self) -> &str {
        self.session
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_SESSION)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfirmZoneRequest {
    pub(crate) payload: ConfirmZonePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfirmZonePayload {
    pub(crate) zone_x_bounds: Option<ZoneBounds>,
    #[serde(default)]
    pub(crate) ques_seq_style: Vec<String>,
    #[serde(default)]
    pub(crate) ban_word: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ZoneBounds {
    pub(crate) x1: f64,
    pub(crate) x2: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    pub(crate) status: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: String,
    pub(crate) ocr_ready: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

/// Data event body for one segment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentPayload {
    pub ques_number: String,
    #[serde(rename = "imgSRC")]
    pub img_src: String,
}
