//! Binarization of the cropped well into candidate spot pixels.

use image::GrayImage;
use imageproc::distance_transform::Norm;

use crate::error::AnalysisError;
use crate::threshold::{binarize_inverted, ThresholdMethod};

/// Configuration for spot segmentation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Histogram policy applied to the inverted crop.
    pub method: ThresholdMethod,
    /// Side length (pixels) of the square structuring element used for a
    /// binary closing. `None` or values below 2 skip the closing.
    pub closing_size: Option<u32>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            method: ThresholdMethod::Unimodal,
            closing_size: Some(3),
        }
    }
}

/// Return a 0/255 mask of candidate spot pixels in `crop`.
pub fn segment_spots(crop: &GrayImage, config: &SegmentConfig) -> Result<GrayImage, AnalysisError> {
    let binary = binarize_inverted(crop, config.method).ok_or_else(|| {
        AnalysisError::Segmentation {
            reason: format!("degenerate histogram for {:?} threshold", config.method),
        }
    })?;
    tracing::debug!("spot threshold {} ({:?})", binary.threshold, config.method);

    let mask = match config.closing_size {
        Some(size) if size >= 2 => close_square(&binary.mask, size),
        _ => binary.mask,
    };
    Ok(mask)
}

/// Binary closing with a square structuring element of side `2k + 1`, where
/// `k = size / 2`.
fn close_square(mask: &GrayImage, size: u32) -> GrayImage {
    let k = (size / 2).min(u8::MAX as u32) as u8;
    imageproc::morphology::close(mask, Norm::LInf, k)
}
