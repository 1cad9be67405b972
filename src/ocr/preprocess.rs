use image::{DynamicImage, GrayImage};

// Share of pixels clipped at each end by the contrast normalization.
const NORMALIZE_CLIP: f32 = 0.01;
const LINEAR_GAIN: f32 = 4.0;
const LINEAR_OFFSET: f32 = -150.0;
const THRESHOLD: u8 = 100;

/// Greyscale, normalize, stretch, binarize and upscale a zone image for OCR.
pub fn preprocess_for_labels(image: &DynamicImage, upscale: u32) -> DynamicImage {
    let luma = flatten_to_luma(image);
    let normalized = normalize_contrast(&luma);
    let stretched = linear(&normalized, LINEAR_GAIN, LINEAR_OFFSET);
    let bin = binarize(&stretched, THRESHOLD);

    let (width, height) = bin.dimensions();
    let resized = if upscale > 1 {
        image::imageops::resize(
            &bin,
            width.saturating_mul(upscale),
            height.saturating_mul(upscale),
            image::imageops::FilterType::Lanczos3,
        )
    } else {
        bin
    };
    DynamicImage::ImageLuma8(resized)
}

// Transparent pixels are composited over white.
fn flatten_to_luma(image: &DynamicImage) -> GrayImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut luma = GrayImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let r = r as f32 * alpha + 255.0 * (1.0 - alpha);
        let g = g as f32 * alpha + 255.0 * (1.0 - alpha);
        let b = b as f32 * alpha + 255.0 * (1.0 - alpha);
        let value = (0.299 * r + 0.587 * g + 0.114 * b).round() as u8;
        luma.put_pixel(x, y, image::Luma([value]));
    }
    luma
}

fn normalize_contrast(image: &GrayImage) -> GrayImage {
    let mut histogram = [0usize; 256];
    for pixel in image.pixels() {
        histogram[pixel[0] as usize] += 1;
    }
    let total = image.width() as usize * image.height() as usize;
    if total == 0 {
        return image.clone();
    }
    let clip = (total as f32 * NORMALIZE_CLIP) as usize;
    let min = percentile(&histogram, clip);
    let max = percentile(&histogram, total.saturating_sub(clip + 1));

    if max <= min {
        return image.clone();
    }

    let scale = 255.0 / (max as f32 - min as f32);
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        let value = pixel[0].clamp(min, max);
        pixel[0] = ((value - min) as f32 * scale).round() as u8;
    }
    output
}

// Value of the pixel at `rank` in ascending order.
fn percentile(histogram: &[usize; 256], rank: usize) -> u8 {
    let mut seen = 0usize;
    for (value, count) in histogram.iter().enumerate() {
        seen += count;
        if seen > rank {
            return value as u8;
        }
    }
    255
}

fn linear(image: &GrayImage, gain: f32, offset: f32) -> GrayImage {
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        pixel[0] = (pixel[0] as f32 * gain + offset).round().clamp(0.0, 255.0) as u8;
    }
    output
}

fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        pixel[0] = if pixel[0] >= threshold { 255 } else { 0 };
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| {
            image::Luma([(60 + x * 100 / width.max(1)) as u8])
        })
    }

    #[test]
    fn output_is_binary_and_upscaled() {
        let image = DynamicImage::ImageLuma8(gradient(40, 10));
        let prepared = preprocess_for_labels(&image, 1).to_luma8();
        assert_eq!(prepared.dimensions(), (40, 10));
        assert!(prepared.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(prepared.get_pixel(0, 0)[0], 0);
        assert_eq!(prepared.get_pixel(39, 0)[0], 255);

        let doubled = preprocess_for_labels(&image, 2);
        assert_eq!((doubled.width(), doubled.height()), (80, 20));
    }

    #[test]
    fn uniform_image_passes_through_normalization() {
        let white = GrayImage::from_pixel(5, 5, image::Luma([255]));
        assert_eq!(normalize_contrast(&white), white);
        let bin = binarize(&linear(&white, LINEAR_GAIN, LINEAR_OFFSET), THRESHOLD);
        assert!(bin.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn transparent_pixels_flatten_to_white() {
        let rgba = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 0]));
        let luma = flatten_to_luma(&DynamicImage::ImageRgba8(rgba));
        assert!(luma.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn linear_clamps_to_byte_range() {
        let image = GrayImage::from_fn(3, 1, |x, _| image::Luma([[10u8, 50, 200][x as usize]]));
        let out = linear(&image, LINEAR_GAIN, LINEAR_OFFSET);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(1, 0)[0], 50);
        assert_eq!(out.get_pixel(2, 0)[0], 255);
    }
}
