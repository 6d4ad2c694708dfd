use std::path::Path;

use crate::assign::{GridConfig, PlacementConfig};
use crate::background::BackgroundConfig;
use crate::od::OdConfig;
use crate::spots::{RegionPredicate, SegmentConfig};
use crate::well::{CropConfig, WellLocatorConfig};

/// Full per-well analysis configuration.
///
/// Every section falls back to its default when omitted from JSON.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalyzeConfig {
    /// Well boundary localization.
    pub well: WellLocatorConfig,
    /// Inward crop margin.
    pub crop: CropConfig,
    /// Spot binarization.
    pub segment: SegmentConfig,
    /// Region predicates applied in order before grid assignment.
    pub filters: Vec<RegionPredicate>,
    /// Grid assignment strategy and residual tolerance.
    pub grid: GridConfig,
    /// Background surface fit.
    pub background: BackgroundConfig,
    /// Fixed-footprint re-measurement at fitted cell positions.
    pub placement: PlacementConfig,
    /// OD formula.
    pub od: OdConfig,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            well: WellLocatorConfig::default(),
            crop: CropConfig::default(),
            segment: SegmentConfig::default(),
            filters: vec![
                RegionPredicate::area_greater_than(300.0),
                RegionPredicate::eccentricity_less_than(0.9),
            ],
            grid: GridConfig::default(),
            background: BackgroundConfig::default(),
            placement: PlacementConfig::default(),
            od: OdConfig::default(),
        }
    }
}

impl AnalyzeConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::GridStrategy;
    use crate::od::OdTransform;
    use crate::threshold::ThresholdMethod;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: AnalyzeConfig = serde_json::from_str(
            r#"{
                "segment": {"method": "otsu"},
                "od": {"transform": "difference"},
                "grid": {"strategy": {"kind": "bounding_box_normalization", "min_area": 0.0}}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.segment.method, ThresholdMethod::Otsu);
        assert_eq!(cfg.segment.closing_size, Some(3));
        assert_eq!(cfg.od.transform, OdTransform::Difference);
        assert!(matches!(
            cfg.grid.strategy,
            GridStrategy::BoundingBoxNormalization { .. }
        ));
        assert_eq!(cfg.well.candidate_radii, vec![300, 400, 500, 600]);
        assert_eq!(cfg.filters.len(), 2);
        assert_eq!(cfg.crop.border_px, 200);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = AnalyzeConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: AnalyzeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.filters, cfg.filters);
        assert_eq!(back.grid, cfg.grid);
        assert_eq!(back.background.order, 2);
    }
}
