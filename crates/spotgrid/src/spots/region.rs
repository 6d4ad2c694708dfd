//! Connected-component labelling and per-region statistics.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::GrayF32;

/// Half-open pixel bounds `[min, max)` of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub min_row: u32,
    pub min_col: u32,
    pub max_row: u32,
    pub max_col: u32,
}

/// One connected component of a binary mask.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Region {
    /// Positive label, unique within one labelling pass.
    pub label: u32,
    /// Centroid as `[row, col]`.
    pub centroid: [f64; 2],
    /// Pixel count.
    pub area: usize,
    /// Eccentricity of the moment-equivalent ellipse, in `[0, 1]`.
    pub eccentricity: f64,
    /// Major-axis angle (radians) from the column axis toward increasing rows.
    pub orientation: f64,
    pub bbox: BoundingBox,
    /// Mean of the co-registered intensity image over the region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_intensity: Option<f64>,
}

#[derive(Default)]
struct Moments {
    n: usize,
    sum_r: f64,
    sum_c: f64,
    sum_rr: f64,
    sum_cc: f64,
    sum_rc: f64,
    sum_i: f64,
    min_row: u32,
    min_col: u32,
    max_row: u32,
    max_col: u32,
}

impl Moments {
    fn add(&mut self, row: u32, col: u32, intensity: f64) {
        if self.n == 0 {
            self.min_row = row;
            self.min_col = col;
            self.max_row = row;
            self.max_col = col;
        }
        let (r, c) = (row as f64, col as f64);
        self.n += 1;
        self.sum_r += r;
        self.sum_c += c;
        self.sum_rr += r * r;
        self.sum_cc += c * c;
        self.sum_rc += r * c;
        self.sum_i += intensity;
        self.min_row = self.min_row.min(row);
        self.min_col = self.min_col.min(col);
        self.max_row = self.max_row.max(row);
        self.max_col = self.max_col.max(col);
    }

    fn into_region(self, label: u32, has_intensity: bool) -> Region {
        let n = self.n as f64;
        let mr = self.sum_r / n;
        let mc = self.sum_c / n;
        let mu_rr = (self.sum_rr / n - mr * mr).max(0.0);
        let mu_cc = (self.sum_cc / n - mc * mc).max(0.0);
        let mu_rc = self.sum_rc / n - mr * mc;

        let half_trace = 0.5 * (mu_rr + mu_cc);
        let root = (0.25 * (mu_rr - mu_cc).powi(2) + mu_rc * mu_rc).sqrt();
        let l1 = half_trace + root;
        let l2 = (half_trace - root).max(0.0);
        let eccentricity = if l1 > 1e-12 { (1.0 - l2 / l1).sqrt() } else { 0.0 };

        Region {
            label,
            centroid: [mr, mc],
            area: self.n,
            eccentricity,
            orientation: 0.5 * (2.0 * mu_rc).atan2(mu_cc - mu_rr),
            bbox: BoundingBox {
                min_row: self.min_row,
                min_col: self.min_col,
                max_row: self.max_row + 1,
                max_col: self.max_col + 1,
            },
            mean_intensity: has_intensity.then(|| self.sum_i / n),
        }
    }
}

/// Label 8-connected foreground components of `mask` and measure each one.
///
/// Labels are `1..=n`, numbered by the row-major position of each component's
/// first pixel, so identical masks always produce identical labels. When
/// `intensity` is given it must have the mask's dimensions; its values feed
/// `mean_intensity`.
pub fn extract_regions(mask: &GrayImage, intensity: Option<&GrayF32>) -> Vec<Region> {
    let intensity = intensity.filter(|img| {
        let same = img.dimensions() == mask.dimensions();
        if !same {
            tracing::warn!(
                "intensity image {:?} does not match mask {:?}; ignoring",
                img.dimensions(),
                mask.dimensions()
            );
        }
        same
    });

    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    // Renumber in scan order of first appearance.
    let mut remap: Vec<u32> = Vec::new();
    let mut moments: Vec<Moments> = Vec::new();
    for (col, row, px) in labels.enumerate_pixels() {
        let raw = px[0] as usize;
        if raw == 0 {
            continue;
        }
        if raw >= remap.len() {
            remap.resize(raw + 1, 0);
        }
        if remap[raw] == 0 {
            moments.push(Moments::default());
            remap[raw] = moments.len() as u32;
        }
        let value = intensity.map_or(0.0, |img| img.get_pixel(col, row)[0] as f64);
        moments[remap[raw] as usize - 1].add(row, col, value);
    }

    let has_intensity = intensity.is_some();
    let regions: Vec<Region> = moments
        .into_iter()
        .enumerate()
        .map(|(i, m)| m.into_region(i as u32 + 1, has_intensity))
        .collect();
    tracing::debug!("extracted {} regions", regions.len());
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn mask_from(rows: &[&str]) -> GrayImage {
        let h = rows.len() as u32;
        let w = rows[0].len() as u32;
        GrayImage::from_fn(w, h, |x, y| {
            let on = rows[y as usize].as_bytes()[x as usize] == b'#';
            Luma([if on { 255 } else { 0 }])
        })
    }

    #[test]
    fn labels_follow_scan_order() {
        let mask = mask_from(&[
            "......##",
            "##....##",
            "##......",
            "....#...",
        ]);
        let regions = extract_regions(&mask, None);
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].label, 1);
        assert_eq!(regions[0].bbox.min_col, 6);
        assert_eq!(regions[1].bbox.min_col, 0);
        assert_eq!(regions[2].area, 1);
        assert!(regions.iter().all(|r| r.mean_intensity.is_none()));
    }

    #[test]
    fn labelling_is_deterministic() {
        let mask = mask_from(&[
            "#..#..#.",
            ".#....#.",
            "..#.##..",
            "#....#.#",
        ]);
        let a = extract_regions(&mask, None);
        let b = extract_regions(&mask, None);
        assert_eq!(a, b);
    }

    #[test]
    fn diagonal_pixels_are_connected() {
        let mask = mask_from(&["#..", ".#.", "..#"]);
        let regions = extract_regions(&mask, None);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 3);
        assert_abs_diff_eq!(regions[0].centroid[0], 1.0);
        assert_abs_diff_eq!(regions[0].centroid[1], 1.0);
    }

    #[test]
    fn shape_statistics() {
        let square = mask_from(&["....", ".##.", ".##.", "...."]);
        let r = &extract_regions(&square, None)[0];
        assert_eq!(r.area, 4);
        assert_abs_diff_eq!(r.eccentricity, 0.0, epsilon = 1e-12);
        assert_eq!(
            r.bbox,
            BoundingBox {
                min_row: 1,
                min_col: 1,
                max_row: 3,
                max_col: 3
            }
        );

        let bar = mask_from(&["......", "######", "......"]);
        let r = &extract_regions(&bar, None)[0];
        assert!(r.eccentricity > 0.99);
        assert_abs_diff_eq!(r.orientation, 0.0, epsilon = 1e-12);

        let column = mask_from(&[".#.", ".#.", ".#.", ".#."]);
        let r = &extract_regions(&column, None)[0];
        assert_abs_diff_eq!(r.orientation.abs(), std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn mean_intensity_uses_intensity_image() {
        let mask = mask_from(&["##..", "##..", "...#"]);
        let intensity = GrayF32::from_fn(4, 3, |x, y| Luma([(x + 10 * y) as f32]));
        let regions = extract_regions(&mask, Some(&intensity));
        assert_abs_diff_eq!(regions[0].mean_intensity.unwrap(), (0.0 + 1.0 + 10.0 + 11.0) / 4.0);
        assert_abs_diff_eq!(regions[1].mean_intensity.unwrap(), 23.0);
    }

    #[test]
    fn mismatched_intensity_is_ignored() {
        let mask = mask_from(&["#.", ".."]);
        let intensity = GrayF32::new(3, 3);
        let regions = extract_regions(&mask, Some(&intensity));
        assert!(regions[0].mean_intensity.is_none());
    }
}
