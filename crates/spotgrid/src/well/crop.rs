//! Square crop of the well interior.

use image::GrayImage;

use crate::error::AnalysisError;
use crate::well::WellCircle;

/// Configuration for cropping the located well.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CropConfig {
    /// Inward margin (pixels) subtracted from the well radius.
    pub border_px: u32,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self { border_px: 200 }
    }
}

/// Pixel box of a crop inside its source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CropBox {
    /// Left column in the source image.
    pub x0: u32,
    /// Top row in the source image.
    pub y0: u32,
    /// Side length (pixels); always `2 * (radius - border)`.
    pub size: u32,
}

/// Cut the axis-aligned square spanning `radius - border` around the well
/// center.
///
/// Fails rather than clamping when the box leaves the image, since a clamped
/// crop shifts the grid origin.
pub fn crop_well(
    gray: &GrayImage,
    circle: &WellCircle,
    config: &CropConfig,
) -> Result<(GrayImage, CropBox), AnalysisError> {
    let (w, h) = gray.dimensions();
    let cx = circle.cx.round() as i64;
    let cy = circle.cy.round() as i64;
    let half = circle.radius.round() as i64 - config.border_px as i64;

    let err = || AnalysisError::Crop {
        cx,
        cy,
        half_size: half,
        width: w,
        height: h,
    };
    if half <= 0 {
        return Err(err());
    }
    let (x0, y0) = (cx - half, cy - half);
    let (x1, y1) = (cx + half, cy + half);
    if x0 < 0 || y0 < 0 || x1 > w as i64 || y1 > h as i64 {
        return Err(err());
    }

    let crop_box = CropBox {
        x0: x0 as u32,
        y0: y0 as u32,
        size: (2 * half) as u32,
    };
    let crop = image::imageops::crop_imm(gray, crop_box.x0, crop_box.y0, crop_box.size, crop_box.size)
        .to_image();
    Ok((crop, crop_box))
}
