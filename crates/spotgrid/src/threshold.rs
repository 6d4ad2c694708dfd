//! Histogram thresholds used for both well and spot binarization.
//!
//! All policies operate on the *inverted* 8-bit image so that dark structures
//! (the well wall, printed spots) become the bright foreground. Each policy
//! returns the smallest inverted intensity that counts as foreground.

use image::GrayImage;

const HIST_BINS: usize = 256;
const MINIMUM_MAX_ITERS: usize = 10_000;

/// Histogram thresholding policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// Minimum between the two modes of an iteratively smoothed histogram.
    Bimodal,
    /// Rosin corner of a single-peaked histogram.
    #[default]
    Unimodal,
    /// Otsu's between-class variance maximum.
    Otsu,
}

/// Result of binarizing an inverted image.
#[derive(Debug, Clone)]
pub struct Binarized {
    /// Foreground lower bound in inverted intensity units.
    pub threshold: u8,
    /// Foreground pixels are 255, background 0.
    pub mask: GrayImage,
}

/// Invert `gray`, choose a threshold with `method`, and binarize.
///
/// Returns `None` when the histogram is degenerate (fewer than two occupied
/// bins, or no threshold satisfies the policy).
pub fn binarize_inverted(gray: &GrayImage, method: ThresholdMethod) -> Option<Binarized> {
    let mut inv = gray.clone();
    image::imageops::invert(&mut inv);

    let hist = histogram(&inv);
    if hist.iter().filter(|&&c| c > 0).count() < 2 {
        return None;
    }

    let threshold = match method {
        ThresholdMethod::Bimodal => minimum_threshold(&hist)?,
        ThresholdMethod::Unimodal => rosin_threshold(&hist)?,
        ThresholdMethod::Otsu => imageproc::contrast::otsu_level(&inv).checked_add(1)?,
    };

    let mask = GrayImage::from_fn(inv.width(), inv.height(), |x, y| {
        image::Luma([if inv.get_pixel(x, y)[0] >= threshold { 255 } else { 0 }])
    });
    Some(Binarized { threshold, mask })
}

fn histogram(gray: &GrayImage) -> [u32; HIST_BINS] {
    imageproc::stats::histogram(gray).channels[0]
}

/// Bimodal minimum threshold.
///
/// The histogram is smoothed with a 3-bin running mean (edge-reflected) until
/// at most two local maxima remain; the threshold is the first minimum
/// between them.
pub fn minimum_threshold(hist: &[u32; HIST_BINS]) -> Option<u8> {
    let mut smooth: Vec<f64> = hist.iter().map(|&c| c as f64).collect();
    let mut maxima = Vec::new();

    for _ in 0..MINIMUM_MAX_ITERS {
        smooth = running_mean3(&smooth);
        maxima = local_maxima(&smooth);
        if maxima.len() < 3 {
            break;
        }
    }
    if maxima.len() != 2 {
        return None;
    }

    let (lo, hi) = (maxima[0], maxima[1]);
    let mut best = lo;
    for i in lo..=hi {
        if smooth[i] < smooth[best] {
            best = i;
        }
    }
    u8::try_from(best).ok()
}

fn running_mean3(h: &[f64]) -> Vec<f64> {
    let n = h.len();
    (0..n)
        .map(|i| {
            let prev = h[i.saturating_sub(1)];
            let next = h[(i + 1).min(n - 1)];
            (prev + h[i] + next) / 3.0
        })
        .collect()
}

/// Indices where the histogram turns from rising to falling; plateaus report
/// their last bin.
fn local_maxima(h: &[f64]) -> Vec<usize> {
    let mut out = Vec::new();
    let mut rising = true;
    for i in 0..h.len().saturating_sub(1) {
        if rising {
            if h[i + 1] < h[i] {
                rising = false;
                out.push(i);
            }
        } else if h[i + 1] > h[i] {
            rising = true;
        }
    }
    out
}

/// Unimodal (Rosin) threshold.
///
/// Draws a line from the histogram peak to the last occupied bin of its upper
/// tail and returns the bin with maximal perpendicular distance to that line.
pub fn rosin_threshold(hist: &[u32; HIST_BINS]) -> Option<u8> {
    let peak = (0..HIST_BINS).fold(0, |best, i| if hist[i] > hist[best] { i } else { best });
    let last = (0..HIST_BINS).rev().find(|&i| hist[i] > 0)?;
    if last <= peak {
        return None;
    }

    let (x0, y0) = (peak as f64, hist[peak] as f64);
    let (x1, y1) = (last as f64, hist[last] as f64);
    let (dx, dy) = (x1 - x0, y1 - y0);
    let norm = (dx * dx + dy * dy).sqrt();

    let mut best = peak + 1;
    let mut best_dist = f64::NEG_INFINITY;
    for (i, &count) in hist.iter().enumerate().take(last + 1).skip(peak + 1) {
        let dist = (dy * i as f64 - dx * count as f64 + x1 * y0 - y1 * x0).abs() / norm;
        if dist > best_dist {
            best_dist = dist;
            best = i;
        }
    }
    u8::try_from(best).ok()
}
