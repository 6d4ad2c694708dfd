//! Per-well stage sequence: localize -> crop -> segment -> regions -> filter
//! -> grid -> background -> placed mask -> OD.

use image::GrayImage;

use crate::assign::{assign_to_grid, correspond_by_label, place_spot_mask};
use crate::background::fit_background;
use crate::error::AnalysisError;
use crate::od::compute_od;
use crate::plate_layout::PlateLayout;
use crate::spots::{extract_regions, filter_regions_all, segment_spots};
use crate::well::{crop_well, locate_well};

use super::{AnalyzeConfig, WellArtifacts, WellReport};

pub fn analyze_well(
    gray: &GrayImage,
    layout: &PlateLayout,
    config: &AnalyzeConfig,
) -> Result<WellReport, AnalysisError> {
    analyze_well_with_artifacts(gray, layout, config).map(|(report, _)| report)
}

/// Run every stage and also return the intermediate images.
pub fn analyze_well_with_artifacts(
    gray: &GrayImage,
    layout: &PlateLayout,
    config: &AnalyzeConfig,
) -> Result<(WellReport, WellArtifacts), AnalysisError> {
    let location = locate_well(gray, &config.well)?;
    let circle = location.circle;
    tracing::debug!(
        "well at ({:.0}, {:.0}) r={:.0} score {:.3}",
        circle.cx,
        circle.cy,
        circle.radius,
        circle.score
    );

    let (crop, crop_box) = crop_well(gray, &circle, &config.crop)?;
    let spot_mask = segment_spots(&crop, &config.segment)?;

    let intensity = crate::to_f32(&crop);
    let regions = extract_regions(&spot_mask, Some(&intensity));
    let filtered = filter_regions_all(&regions, &config.filters);

    let assignment = assign_to_grid(&filtered, layout, crop.dimensions(), &config.grid)?;

    let background = fit_background(&intensity, &spot_mask, &config.background)?;
    let (measured, bg_grid, placed_mask, placed_radius_px) = if config.placement.enabled {
        let placed = place_spot_mask(
            &assignment,
            layout,
            &intensity,
            &background,
            &config.placement,
        );
        (
            placed.spots,
            placed.background,
            Some(placed.mask),
            Some(placed.radius_px),
        )
    } else {
        let bg_regions = extract_regions(&spot_mask, Some(&background));
        let bg_grid = correspond_by_label(&assignment.grid, &bg_regions);
        (assignment.grid.clone(), bg_grid, None, None)
    };

    let table = compute_od(&measured, &bg_grid, &config.od);

    let report = WellReport {
        circle,
        crop: crop_box,
        n_regions: regions.len(),
        n_filtered: filtered.len(),
        dropped_labels: assignment.dropped,
        grid_transform: assignment.transform.map(|a| a.to_array()),
        mean_residual_cells: assignment.mean_residual_cells,
        placed_radius_px,
        table,
    };
    let artifacts = WellArtifacts {
        crop,
        well_mask: location.mask,
        spot_mask,
        background,
        spots: assignment.grid,
        placed_mask,
        measured,
    };
    Ok((report, artifacts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::{GridConfig, GridStrategy};
    use crate::grid::GridPosition;
    use crate::spots::{RegionPredicate, SegmentConfig};
    use crate::test_utils::SyntheticWell;
    use crate::well::{CropConfig, WellLocatorConfig};
    use approx::assert_abs_diff_eq;

    // Well centered at (200, 200) with its wall starting at r = 150; with a
    // 50 px border the crop is the 200x200 square starting at (100, 100).
    // Cell (r, c) sits at crop row 29.5 + 20 r, crop col 39.5 + 24 c.
    const SPOTS: [((usize, usize), u8); 6] = [
        ((0, 0), 60),
        ((0, 1), 80),
        ((0, 5), 100),
        ((7, 0), 120),
        ((7, 5), 140),
        ((4, 2), 160),
    ];
    const BG: u8 = 200;

    fn layout() -> PlateLayout {
        PlateLayout::new(
            "synthetic",
            8,
            6,
            0.2,
            0.24,
            0.01,
            PlateLayout::default().fiducials,
        )
        .unwrap()
    }

    fn well_image() -> GrayImage {
        SyntheticWell {
            size: (400, 400),
            center: [200.0, 200.0],
            inner_radius: 150.0,
            outer_radius: 185.0,
            wall_pix: 30,
            bg_pix: BG,
            spots: SPOTS
                .iter()
                .map(|&((r, c), v)| ([139.5 + 24.0 * c as f32, 129.5 + 20.0 * r as f32], v))
                .collect(),
            spot_radius: 6.0,
        }
        .render()
    }

    fn config(strategy: GridStrategy) -> AnalyzeConfig {
        AnalyzeConfig {
            well: WellLocatorConfig {
                candidate_radii: vec![120, 150, 180],
                ..WellLocatorConfig::default()
            },
            crop: CropConfig { border_px: 50 },
            segment: SegmentConfig {
                closing_size: None,
                ..SegmentConfig::default()
            },
            filters: vec![
                RegionPredicate::area_greater_than(50.0),
                RegionPredicate::eccentricity_less_than(0.9),
            ],
            grid: GridConfig {
                strategy,
                ..GridConfig::default()
            },
            ..AnalyzeConfig::default()
        }
    }

    fn check_table(report: &WellReport) {
        let od = &report.table.od;
        assert_eq!(od.n_occupied(), 6);
        assert_eq!(od.cells().filter(|(_, c)| c.is_none()).count(), 42);

        let mut prev = f64::INFINITY;
        for &((r, c), v) in &SPOTS {
            let pos = GridPosition::new(r, c);
            let value = *od.get(pos).expect("spot cell present");
            assert_abs_diff_eq!(value, (BG as f64 / v as f64).log10(), epsilon = 1e-3);
            assert_abs_diff_eq!(
                *report.table.spot_intensity.get(pos).unwrap(),
                v as f64,
                epsilon = 1e-9
            );
            // Brighter spots have lower OD.
            assert!(value < prev);
            prev = value;
        }
    }

    #[test]
    fn fiducial_fit_end_to_end() {
        let (report, artifacts) = analyze_well_with_artifacts(
            &well_image(),
            &layout(),
            &config(GridStrategy::default()),
        )
        .expect("well analyzed");
        assert_eq!(report.circle.radius, 150.0);
        assert!((report.circle.cx - 200.0).abs() <= 3.0);
        assert!((report.circle.cy - 200.0).abs() <= 3.0);
        assert_eq!(report.n_filtered, 6);
        assert!(report.dropped_labels.is_empty());
        assert!(report.grid_transform.is_some());
        assert_eq!(artifacts.spots.n_occupied(), 6);
        assert_eq!(artifacts.background.dimensions(), artifacts.crop.dimensions());
        // 0.2 of the 20 px row pitch.
        assert_abs_diff_eq!(report.placed_radius_px.unwrap(), 4.0, epsilon = 0.1);
        let placed = artifacts.placed_mask.as_ref().expect("placement on by default");
        let pos = GridPosition::new(4, 2);
        let thresholded = artifacts.spots.get(pos).unwrap();
        let measured = artifacts.measured.get(pos).unwrap();
        assert!(measured.area < thresholded.area);
        assert_abs_diff_eq!(measured.centroid[0], thresholded.centroid[0], epsilon = 0.5);
        assert_abs_diff_eq!(measured.centroid[1], thresholded.centroid[1], epsilon = 0.5);
        assert_eq!(
            placed.pixels().filter(|p| p[0] == 255).count(),
            6 * measured.area
        );
        check_table(&report);
    }

    #[test]
    fn placement_can_be_disabled() {
        let mut cfg = config(GridStrategy::default());
        cfg.placement.enabled = false;
        let (report, artifacts) =
            analyze_well_with_artifacts(&well_image(), &layout(), &cfg).expect("analyzed");
        assert!(report.placed_radius_px.is_none());
        assert!(artifacts.placed_mask.is_none());
        assert_eq!(artifacts.measured, artifacts.spots);
        check_table(&report);
    }

    #[test]
    fn bounding_box_strategy_end_to_end() {
        let strategy = GridStrategy::BoundingBoxNormalization { min_area: 50.0 };
        let report = analyze_well(&well_image(), &layout(), &config(strategy)).expect("analyzed");
        assert!(report.grid_transform.is_none());
        check_table(&report);
    }

    #[test]
    fn stage_errors_propagate() {
        let flat = GrayImage::from_pixel(64, 64, image::Luma([90]));
        let err = analyze_well(&flat, &layout(), &config(GridStrategy::default())).unwrap_err();
        assert_eq!(err.kind(), "localization");
    }
}
