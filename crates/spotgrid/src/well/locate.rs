//! Circular well boundary localization.
//!
//! The inverted image is binarized so the dark well wall becomes foreground,
//! edges are extracted with Canny on a blurred copy of the mask, and every
//! edge pixel votes along its gradient direction at each candidate radius.
//! The single strongest (center, radius) peak across radii wins.

use image::GrayImage;

use crate::error::AnalysisError;
use crate::threshold::{binarize_inverted, ThresholdMethod};
use crate::GrayF32;

/// Configuration for well localization.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WellLocatorConfig {
    /// Histogram policy used to binarize the inverted image.
    pub threshold: ThresholdMethod,
    /// Candidate well radii (pixels). Depends on magnification.
    pub candidate_radii: Vec<u32>,
    /// Gaussian sigma applied to the binary mask before edge detection.
    pub edge_sigma: f32,
    /// Canny hysteresis low threshold.
    pub canny_low: f32,
    /// Canny hysteresis high threshold.
    pub canny_high: f32,
    /// Gaussian sigma for accumulator smoothing.
    pub accum_sigma: f32,
}

impl Default for WellLocatorConfig {
    fn default() -> Self {
        Self {
            threshold: ThresholdMethod::Unimodal,
            candidate_radii: vec![300, 400, 500, 600],
            edge_sigma: 3.0,
            canny_low: 20.0,
            canny_high: 50.0,
            accum_sigma: 1.5,
        }
    }
}

/// Best-fit well circle in source image pixels.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WellCircle {
    /// Center column.
    pub cx: f64,
    /// Center row.
    pub cy: f64,
    pub radius: f64,
    /// Smoothed accumulator peak normalized by candidate circumference.
    pub score: f32,
}

/// Localization output: the circle plus the binary mask it was found on.
#[derive(Debug, Clone)]
pub struct WellLocation {
    pub circle: WellCircle,
    pub mask: GrayImage,
}

struct EdgeVote {
    x: f32,
    y: f32,
    dx: f32,
    dy: f32,
}

/// Deposit a weighted vote into the accumulator using bilinear interpolation.
#[inline]
fn bilinear_add_in_bounds(accum: &mut [f32], stride: usize, x: f32, y: f32, weight: f32) {
    let x0 = x as usize;
    let y0 = y as usize;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let base = y0 * stride + x0;
    accum[base] += weight * (1.0 - fx) * (1.0 - fy);
    accum[base + 1] += weight * fx * (1.0 - fy);
    accum[base + stride] += weight * (1.0 - fx) * fy;
    accum[base + stride + 1] += weight * fx * fy;
}

/// Find the single best circular well boundary in `gray`.
pub fn locate_well(
    gray: &GrayImage,
    config: &WellLocatorConfig,
) -> Result<WellLocation, AnalysisError> {
    let (w, h) = gray.dimensions();
    if w < 4 || h < 4 {
        return Err(AnalysisError::Localization {
            reason: format!("image too small ({w}x{h})"),
        });
    }

    let binary = binarize_inverted(gray, config.threshold).ok_or_else(|| {
        AnalysisError::Localization {
            reason: "degenerate intensity histogram".to_string(),
        }
    })?;
    tracing::debug!("well threshold {} ({:?})", binary.threshold, config.threshold);

    let smoothed = if config.edge_sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(&binary.mask, config.edge_sigma)
    } else {
        binary.mask.clone()
    };
    let edges = imageproc::edges::canny(&smoothed, config.canny_low, config.canny_high);
    let gx = imageproc::gradients::horizontal_scharr(&smoothed);
    let gy = imageproc::gradients::vertical_scharr(&smoothed);

    let mut votes = Vec::new();
    for (x, y, p) in edges.enumerate_pixels() {
        if p[0] == 0 {
            continue;
        }
        let gxv = gx.get_pixel(x, y)[0] as f32;
        let gyv = gy.get_pixel(x, y)[0] as f32;
        let mag = (gxv * gxv + gyv * gyv).sqrt();
        if mag < 1e-6 {
            continue;
        }
        votes.push(EdgeVote {
            x: x as f32,
            y: y as f32,
            dx: gxv / mag,
            dy: gyv / mag,
        });
    }
    tracing::debug!("well edges: {} voting pixels", votes.len());
    if votes.is_empty() {
        return Err(AnalysisError::Localization {
            reason: "no edge pixels found".to_string(),
        });
    }

    let mut best: Option<WellCircle> = None;
    for &radius in &config.candidate_radii {
        if radius == 0 {
            continue;
        }
        let Some(candidate) = best_center_for_radius(&votes, w, h, radius as f32, config) else {
            continue;
        };
        tracing::debug!(
            "radius {}: peak ({:.0}, {:.0}) score {:.4}",
            radius,
            candidate.cx,
            candidate.cy,
            candidate.score
        );
        if best.map_or(true, |b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }

    let circle = best.ok_or_else(|| AnalysisError::Localization {
        reason: "hough accumulator is empty".to_string(),
    })?;
    Ok(WellLocation {
        circle,
        mask: binary.mask,
    })
}

fn best_center_for_radius(
    votes: &[EdgeVote],
    w: u32,
    h: u32,
    r: f32,
    config: &WellLocatorConfig,
) -> Option<WellCircle> {
    let stride = w as usize;
    let mut accum = vec![0.0f32; stride * h as usize];
    let x_limit = (w - 1) as f32;
    let y_limit = (h - 1) as f32;

    for v in votes {
        for sign in [1.0f32, -1.0] {
            let cx = v.x + sign * v.dx * r;
            let cy = v.y + sign * v.dy * r;
            if cx >= 0.0 && cx < x_limit && cy >= 0.0 && cy < y_limit {
                bilinear_add_in_bounds(&mut accum, stride, cx, cy, 1.0);
            }
        }
    }

    let accum_img = GrayF32::from_raw(w, h, accum)?;
    let smoothed = if config.accum_sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(&accum_img, config.accum_sigma)
    } else {
        accum_img
    };

    let mut peak = (0u32, 0u32, 0.0f32);
    for (x, y, p) in smoothed.enumerate_pixels() {
        if p[0] > peak.2 {
            peak = (x, y, p[0]);
        }
    }
    if peak.2 < 1e-6 {
        return None;
    }

    let circumference = std::f32::consts::TAU * r;
    Some(WellCircle {
        cx: peak.0 as f64,
        cy: peak.1 as f64,
        radius: r as f64,
        score: peak.2 / circumference,
    })
}
