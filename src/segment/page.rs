use anyhow::{Context, Result};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

use super::Label;

/// Rows `[top, bottom)` of the page belonging to one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpan {
    pub top: u32,
    pub bottom: u32,
}

impl SegmentSpan {
    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// One cropped question.
#[derive(Debug, Clone)]
pub struct Segment {
    pub label: String,
    pub page_index: usize,
    pub span: SegmentSpan,
    pub png: Vec<u8>,
}

/// Computes the crop rows for each label, in label order.
///
/// A label's span starts `lift` rows above it and ends where the next label
/// starts (or at the page bottom). Labels with no room below them before the
/// next label are skipped.
pub fn plan_spans<'a>(
    labels: &'a [Label],
    page_height: u32,
    lift: u32,
) -> impl Iterator<Item = (&'a Label, SegmentSpan)> + 'a {
    labels.iter().enumerate().filter_map(move |(idx, label)| {
        let boundary = labels
            .get(idx + 1)
            .map_or(page_height, |next| next.top)
            .min(page_height);
        if boundary <= label.top {
            debug!(label = %label.text, top = label.top, "skipping empty segment");
            return None;
        }
        let span = SegmentSpan {
            top: label.top.saturating_sub(lift),
            bottom: boundary,
        };
        Some((label, span))
    })
}

/// Lazily crops `page` into one PNG per planned span, full page width.
pub fn segment<'a>(
    page: &'a DynamicImage,
    page_index: usize,
    labels: &'a [Label],
    lift: u32,
) -> impl Iterator<Item = Result<Segment>> + 'a {
    plan_spans(labels, page.height(), lift).map(move |(label, span)| {
        let crop = page.crop_imm(0, span.top, page.width(), span.height());
        let mut out = Cursor::new(Vec::new());
        crop.write_to(&mut out, image::ImageFormat::Png)
            .with_context(|| format!("failed to encode segment {}", label.text))?;
        Ok(Segment {
            label: label.text.clone(),
            page_index,
            span,
            png: out.into_inner(),
        })
    })
}
