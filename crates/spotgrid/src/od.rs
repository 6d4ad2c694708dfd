//! Per-cell optical density from spot and background grids.

use serde::{Deserialize, Serialize};

use crate::grid::GridArray;
use crate::spots::Region;

/// Formula combining spot and background mean intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OdTransform {
    /// `log10(background / spot)`. Positive for spots darker than their
    /// local background; undefined (absent) for non-positive intensities.
    #[default]
    Log10Ratio,
    /// `background - spot`, in the intensity units of the source image.
    Difference,
}

impl OdTransform {
    pub fn apply(self, spot: f64, background: f64) -> Option<f64> {
        let od = match self {
            Self::Log10Ratio => {
                if spot <= 0.0 || background <= 0.0 {
                    return None;
                }
                (background / spot).log10()
            }
            Self::Difference => background - spot,
        };
        od.is_finite().then_some(od)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OdConfig {
    pub transform: OdTransform,
}

/// OD and the intensities it was derived from, per grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdTable {
    pub transform: OdTransform,
    pub od: GridArray<f64>,
    pub spot_intensity: GridArray<f64>,
    pub background_intensity: GridArray<f64>,
}

/// Combine co-positioned spot and background regions into an OD table.
///
/// A cell is present only when both grids carry a region with a mean
/// intensity there and the transform is defined for the pair.
pub fn compute_od(
    spots: &GridArray<Region>,
    background: &GridArray<Region>,
    config: &OdConfig,
) -> OdTable {
    let spot_intensity = spots.map(|_, r| r.mean_intensity);
    let background_intensity = background.map(|_, r| r.mean_intensity);
    let od = spot_intensity.map(|pos, &s| {
        background_intensity
            .get(pos)
            .and_then(|&b| config.transform.apply(s, b))
    });
    tracing::debug!(
        "od: {} of {} cells defined ({:?})",
        od.n_occupied(),
        spots.rows() * spots.cols(),
        config.transform
    );
    OdTable {
        transform: config.transform,
        od,
        spot_intensity,
        background_intensity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::tests::region_at;
    use crate::grid::GridPosition;
    use approx::assert_abs_diff_eq;

    fn with_intensity(label: u32, v: f64) -> Region {
        let mut r = region_at(label, 0.0, 0.0);
        r.mean_intensity = Some(v);
        r
    }

    fn grids() -> (GridArray<Region>, GridArray<Region>) {
        let mut spots = GridArray::new(2, 3);
        let mut bg = GridArray::new(2, 3);
        spots.try_insert(GridPosition::new(0, 0), with_intensity(1, 20.0)).unwrap();
        spots.try_insert(GridPosition::new(0, 2), with_intensity(2, 100.0)).unwrap();
        spots.try_insert(GridPosition::new(1, 1), with_intensity(3, 50.0)).unwrap();
        bg.try_insert(GridPosition::new(0, 0), with_intensity(1, 200.0)).unwrap();
        bg.try_insert(GridPosition::new(0, 2), with_intensity(2, 200.0)).unwrap();
        (spots, bg)
    }

    #[test]
    fn log_ratio_and_sentinels() {
        let (spots, bg) = grids();
        let table = compute_od(&spots, &bg, &OdConfig::default());
        assert_abs_diff_eq!(*table.od.get(GridPosition::new(0, 0)).unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            *table.od.get(GridPosition::new(0, 2)).unwrap(),
            2f64.log10(),
            epsilon = 1e-12
        );
        // Spot without background and empty cells stay absent.
        assert!(table.od.get(GridPosition::new(1, 1)).is_none());
        assert!(table.od.get(GridPosition::new(1, 2)).is_none());
        assert_eq!(table.od.n_occupied(), 2);
        assert_eq!(table.spot_intensity.n_occupied(), 3);
    }

    #[test]
    fn difference_transform() {
        let (spots, bg) = grids();
        let cfg = OdConfig {
            transform: OdTransform::Difference,
        };
        let table = compute_od(&spots, &bg, &cfg);
        assert_eq!(table.od.get(GridPosition::new(0, 0)), Some(&180.0));
        assert_eq!(table.od.get(GridPosition::new(0, 2)), Some(&100.0));
    }

    #[test]
    fn non_positive_intensity_has_no_log_ratio() {
        assert_eq!(OdTransform::Log10Ratio.apply(0.0, 100.0), None);
        assert_eq!(OdTransform::Log10Ratio.apply(10.0, -1.0), None);
        assert_eq!(OdTransform::Difference.apply(0.0, 100.0), Some(100.0));
    }

    #[test]
    fn absent_cells_serialize_as_null() {
        let (spots, bg) = grids();
        let table = compute_od(&spots, &bg, &OdConfig::default());
        let json = serde_json::to_value(&table.od.to_rows()).unwrap();
        assert!(json[1][0].is_null());
        assert!(json[0][0].is_number());
    }
}
