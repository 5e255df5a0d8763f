use image::{DynamicImage, GenericImageView, ImageBuffer, Luma};
use imageproc::filter::filter3x3;
use serde::Serialize;

use crate::config::QualityConfig;

/// 4-neighbour Laplacian
const K_LAPLACIAN: [f32; 9] = [0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0];

type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Grayscale with BT.601 weights (0.299, 0.587, 0.114), the conversion the
/// blur threshold is calibrated against. `to_luma8` uses BT.709 instead.
fn to_gray_f32(img: &DynamicImage) -> GrayF32 {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let buf: Vec<f32> = rgb
        .pixels()
        .map(|p| {
            0.299 * f32::from(p[0]) + 0.587 * f32::from(p[1]) + 0.114 * f32::from(p[2])
        })
        .collect();
    // Same dimensions as the source buffer, so from_raw always fits
    ImageBuffer::from_raw(width, height, buf).unwrap_or_else(|| ImageBuffer::new(width, height))
}

/// Variance of the Laplacian of the grayscale image, on a 0-255 scale.
///
/// Sharp images have strong edges and a high variance; a flat image scores 0.
pub fn blur_score(img: &DynamicImage) -> f64 {
    let gray = to_gray_f32(img);
    if gray.width() == 0 || gray.height() == 0 {
        return 0.0;
    }

    let response: Vec<f32> = filter3x3(&gray, &K_LAPLACIAN).into_raw();
    let n = response.len() as f64;
    let mean = response.iter().map(|&v| v as f64).sum::<f64>() / n;
    response
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

/// Why an image failed the quality check
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum QualityIssue {
    TooSmall { width: u32, height: u32 },
    Blurry { score: f64 },
}

/// Check minimum dimensions first, then sharpness
pub fn check_quality(img: &DynamicImage, config: &QualityConfig) -> Result<(), QualityIssue> {
    let (width, height) = img.dimensions();
    if width < config.min_width || height < config.min_height {
        return Err(QualityIssue::TooSmall { width, height });
    }

    let score = blur_score(img);
    if score < config.blur_threshold {
        return Err(QualityIssue::Blurry { score });
    }

    Ok(())
}
