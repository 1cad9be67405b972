use image::DynamicImage;

use crate::error::ZoneError;

/// Horizontal band `[x1, x2)` in page pixels expected to hold the question labels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub x1: f64,
    pub x2: f64,
}

impl Zone {
    pub fn new(x1: f64, x2: f64) -> Result<Self, ZoneError> {
        if !x1.is_finite() || !x2.is_finite() || x1 < 0.0 || x2 <= x1 {
            return Err(ZoneError::Invalid { x1, x2 });
        }
        Ok(Self { x1, x2 })
    }

    /// Pixel columns covered by the zone, before clipping to a page.
    pub fn columns(&self) -> (u32, u32) {
        (round_px(self.x1), round_px(self.x2))
    }
}

fn round_px(value: f64) -> u32 {
    value.round().clamp(0.0, u32::MAX as f64) as u32
}

/// Crops the full-height band covered by `zone` out of `page`.
pub fn extract_zone(
    page: &DynamicImage,
    zone: &Zone,
    min_height: u32,
) -> Result<DynamicImage, ZoneError> {
    let (left, right) = zone.columns();
    let width = page.width();
    if left >= width {
        return Err(ZoneError::OutsidePage { left, width });
    }
    let right = right.min(width);
    if right <= left {
        return Err(ZoneError::Empty);
    }
    let height = page.height();
    if height < min_height {
        return Err(ZoneError::TooNarrow {
            height,
            min: min_height,
        });
    }
    Ok(page.crop_imm(left, 0, right - left, height))
}
