//! Smooth polynomial background under the spot grid.
//!
//! The surface is `sum a_ij * u^i * v^j` over `i + j <= order`, with `u`
//! (column) and `v` (row) normalized to `[-1, 1]`. Coefficients come from a
//! least-squares fit to non-spot pixels sampled on a regular lattice.

use image::{GrayImage, Luma};
use nalgebra::{DMatrix, DVector};

use crate::error::AnalysisError;
use crate::GrayF32;

/// Eigenvalue ratio of the normal matrix below which the fit is singular.
const SINGULAR_RATIO: f64 = 1e-12;

/// Configuration for background estimation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Total polynomial degree.
    pub order: u32,
    /// Sampling stride in pixels along both axes. Falls back to every pixel
    /// when the stride leaves fewer samples than coefficients.
    pub sample_step: u32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            order: 2,
            sample_step: 4,
        }
    }
}

struct Normalizer {
    su: f64,
    sv: f64,
}

impl Normalizer {
    fn new(width: u32, height: u32) -> Self {
        let s = |n: u32| if n > 1 { 2.0 / (n - 1) as f64 } else { 0.0 };
        Self {
            su: s(width),
            sv: s(height),
        }
    }

    fn uv(&self, x: u32, y: u32) -> (f64, f64) {
        let u = if self.su > 0.0 { x as f64 * self.su - 1.0 } else { 0.0 };
        let v = if self.sv > 0.0 { y as f64 * self.sv - 1.0 } else { 0.0 };
        (u, v)
    }
}

/// Monomials of total degree `<= order`, graded.
fn monomials(order: u32, u: f64, v: f64, out: &mut Vec<f64>) {
    out.clear();
    for d in 0..=order {
        for j in 0..=d {
            out.push(u.powi((d - j) as i32) * v.powi(j as i32));
        }
    }
}

fn n_terms(order: u32) -> usize {
    let o = order as usize;
    (o + 1) * (o + 2) / 2
}

fn background_samples(mask: &GrayImage, step: u32) -> Vec<(u32, u32)> {
    let step = step.max(1) as usize;
    let (w, h) = mask.dimensions();
    (0..h)
        .step_by(step)
        .flat_map(|y| (0..w).step_by(step).map(move |x| (x, y)))
        .filter(|&(x, y)| mask.get_pixel(x, y)[0] == 0)
        .collect()
}

/// Fit the background surface of `image` outside the foreground of
/// `spot_mask` and evaluate it over the whole image.
pub fn fit_background(
    image: &GrayF32,
    spot_mask: &GrayImage,
    config: &BackgroundConfig,
) -> Result<GrayF32, AnalysisError> {
    if image.dimensions() != spot_mask.dimensions() {
        return Err(AnalysisError::BackgroundFit {
            reason: format!(
                "image {:?} and mask {:?} differ in size",
                image.dimensions(),
                spot_mask.dimensions()
            ),
        });
    }
    let (w, h) = image.dimensions();
    let k = n_terms(config.order);

    let mut samples = background_samples(spot_mask, config.sample_step);
    if samples.len() < k && config.sample_step > 1 {
        samples = background_samples(spot_mask, 1);
    }
    if samples.is_empty() {
        return Err(AnalysisError::BackgroundFit {
            reason: "no background pixels outside the spot mask".to_string(),
        });
    }
    if samples.len() < k {
        return Err(AnalysisError::BackgroundFit {
            reason: format!("{} background samples for {} coefficients", samples.len(), k),
        });
    }

    let norm = Normalizer::new(w, h);
    let mut ata = DMatrix::<f64>::zeros(k, k);
    let mut atb = DVector::<f64>::zeros(k);
    let mut row = Vec::with_capacity(k);
    for &(x, y) in &samples {
        let (u, v) = norm.uv(x, y);
        monomials(config.order, u, v, &mut row);
        let b = image.get_pixel(x, y)[0] as f64;
        for i in 0..k {
            atb[i] += row[i] * b;
            for j in i..k {
                ata[(i, j)] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            ata[(i, j)] = ata[(j, i)];
        }
    }

    let eig = ata.clone().symmetric_eigen().eigenvalues;
    let (lo, hi) = (eig.min(), eig.max());
    if !(hi > 0.0) || lo / hi < SINGULAR_RATIO {
        return Err(AnalysisError::BackgroundFit {
            reason: format!(
                "singular order-{} fit over {} samples",
                config.order,
                samples.len()
            ),
        });
    }
    let coeffs = ata
        .cholesky()
        .ok_or_else(|| AnalysisError::BackgroundFit {
            reason: "normal matrix is not positive definite".to_string(),
        })?
        .solve(&atb);
    tracing::debug!(
        "background: order {} over {} samples, constant term {:.2}",
        config.order,
        samples.len(),
        coeffs[0]
    );

    Ok(GrayF32::from_fn(w, h, |x, y| {
        let (u, v) = norm.uv(x, y);
        monomials(config.order, u, v, &mut row);
        let z: f64 = row.iter().zip(coeffs.iter()).map(|(m, c)| m * c).sum();
        Luma([z as f32])
    }))
}
