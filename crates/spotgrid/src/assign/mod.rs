//! Region-to-grid assignment.
//!
//! Two interchangeable strategies map filtered regions onto the logical
//! `rows x cols` print grid:
//!
//! - [`GridStrategy::BoundingBoxNormalization`] rescales centroids from their
//!   bounding rectangle onto `[0, rows-1] x [0, cols-1]`.
//! - [`GridStrategy::FiducialAnchoredFit`] locates fiducial spots near their
//!   nominal positions, fits an affine grid-to-image map and inverts it for
//!   every region.
//!
//! Both share the same placement rule: a region whose continuous grid
//! coordinate lies further than `max_residual_cells` from the nearest integer
//! cell (or outside the grid) is dropped as spurious, and two regions landing
//! on one cell fail the well with [`AnalysisError::DuplicateAssignment`].
//! Bounding-box normalization checks collisions over every rounded centroid
//! before the residual drop, so a rounding collision is never resolved by
//! dropping one of the pair.

mod affine;
mod bbox;
mod fiducial;
mod placed;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use affine::GridAffine;
pub use fiducial::FiducialFitConfig;
pub use placed::{place_spot_mask, PlacedSpots, PlacementConfig};

use crate::error::AnalysisError;
use crate::grid::{GridArray, GridPosition};
use crate::plate_layout::PlateLayout;
use crate::spots::{filter_regions, Region, RegionPredicate};

/// Grid assignment strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridStrategy {
    /// Proportional rescaling of the centroid bounding rectangle. Only regions
    /// with `area > min_area` take part.
    BoundingBoxNormalization { min_area: f64 },
    /// Affine fit anchored on the layout's fiducial positions.
    FiducialAnchoredFit(FiducialFitConfig),
}

impl Default for GridStrategy {
    fn default() -> Self {
        Self::FiducialAnchoredFit(FiducialFitConfig::default())
    }
}

/// Configuration for grid assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub strategy: GridStrategy,
    /// Maximum distance, in grid cells, between a region's continuous grid
    /// coordinate and its nearest cell before the region is dropped.
    pub max_residual_cells: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            strategy: GridStrategy::default(),
            max_residual_cells: 0.5,
        }
    }
}

/// Result of assigning one well's regions to the print grid.
#[derive(Debug, Clone)]
pub struct GridAssignment {
    pub grid: GridArray<Region>,
    /// Labels of regions dropped as spurious, in input order.
    pub dropped: Vec<u32>,
    /// Fitted grid-to-image map (fiducial strategy only).
    pub transform: Option<GridAffine>,
    /// Mean residual of assigned regions, in grid cells.
    pub mean_residual_cells: f64,
}

/// Map `regions` onto the layout's grid.
///
/// `crop_size` is the `(width, height)` of the image the region centroids are
/// expressed in; the fiducial strategy centers its nominal grid there.
pub fn assign_to_grid(
    regions: &[Region],
    layout: &PlateLayout,
    crop_size: (u32, u32),
    config: &GridConfig,
) -> Result<GridAssignment, AnalysisError> {
    let assignment = match &config.strategy {
        GridStrategy::BoundingBoxNormalization { min_area } => {
            bbox::assign(regions, layout, *min_area, config.max_residual_cells)?
        }
        GridStrategy::FiducialAnchoredFit(fit) => {
            fiducial::assign(regions, layout, crop_size, fit, config.max_residual_cells)?
        }
    };
    tracing::debug!(
        "grid: {} of {} regions assigned, {} dropped, mean residual {:.3} cells",
        assignment.grid.n_occupied(),
        regions.len(),
        assignment.dropped.len(),
        assignment.mean_residual_cells
    );
    if !assignment.dropped.is_empty() {
        tracing::warn!("dropped spurious regions {:?}", assignment.dropped);
    }
    Ok(assignment)
}

/// Background grid sharing the spot grid's positions.
///
/// `background` regions come from labelling the same spot mask against the
/// background image, so labels correspond one to one. Regions whose label is
/// not assigned in `spots` are discarded.
pub fn correspond_by_label(spots: &GridArray<Region>, background: &[Region]) -> GridArray<Region> {
    let assigned: Vec<u32> = spots.occupied().map(|(_, r)| r.label).collect();
    let kept = filter_regions(background, &RegionPredicate::label_in(assigned));
    let by_label: HashMap<u32, &Region> = kept.iter().map(|r| (r.label, r)).collect();
    spots.map(|_, spot| by_label.get(&spot.label).map(|r| (*r).clone()))
}

#[derive(Debug)]
struct Placement {
    grid: GridArray<Region>,
    dropped: Vec<u32>,
    mean_residual_cells: f64,
}

/// Which regions take part in the collision check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollisionScope {
    /// Every region rounding to an in-grid cell, before any residual drop.
    AllRounded,
    /// Only regions that survive the residual drop.
    Kept,
}

/// Round every region's continuous grid coordinate to a cell.
///
/// `to_grid` returning `None` drops the region.
fn place(
    regions: &[&Region],
    rows: usize,
    cols: usize,
    max_residual_cells: f64,
    scope: CollisionScope,
    to_grid: impl Fn(&Region) -> Option<[f64; 2]>,
) -> Result<Placement, AnalysisError> {
    let rounded: Vec<(&Region, Option<([f64; 2], Option<GridPosition>)>)> = regions
        .iter()
        .map(|&region| {
            let cell = to_grid(region).map(|g| (g, nearest_cell(g, rows, cols)));
            (region, cell)
        })
        .collect();

    if scope == CollisionScope::AllRounded {
        let mut claimed: HashMap<GridPosition, u32> = HashMap::new();
        for (region, cell) in &rounded {
            let Some((_, Some(pos))) = cell else { continue };
            if let Some(&first_label) = claimed.get(pos) {
                return Err(AnalysisError::DuplicateAssignment {
                    position: *pos,
                    first_label,
                    second_label: region.label,
                });
            }
            claimed.insert(*pos, region.label);
        }
    }

    let mut grid = GridArray::new(rows, cols);
    let mut dropped = Vec::new();
    let mut residual_sum = 0.0;

    for (region, cell) in rounded {
        let Some((g, pos)) = cell else {
            dropped.push(region.label);
            continue;
        };
        let residual = (g[0] - g[0].round()).hypot(g[1] - g[1].round());
        let pos = match pos {
            Some(pos) if residual <= max_residual_cells => pos,
            _ => {
                tracing::debug!(
                    "region {} at grid ({:.2}, {:.2}) dropped (residual {:.2})",
                    region.label,
                    g[0],
                    g[1],
                    residual
                );
                dropped.push(region.label);
                continue;
            }
        };

        if let Err(rejected) = grid.try_insert(pos, region.clone()) {
            let first_label = grid.get(pos).map_or(0, |r| r.label);
            return Err(AnalysisError::DuplicateAssignment {
                position: pos,
                first_label,
                second_label: rejected.label,
            });
        }
        residual_sum += residual;
    }

    let n = grid.n_occupied();
    Ok(Placement {
        grid,
        dropped,
        mean_residual_cells: if n > 0 { residual_sum / n as f64 } else { 0.0 },
    })
}

/// Nearest integer cell of a continuous grid coordinate, if inside the grid.
fn nearest_cell(g: [f64; 2], rows: usize, cols: usize) -> Option<GridPosition> {
    let (r, c) = (g[0].round(), g[1].round());
    let inside = r >= 0.0 && c >= 0.0 && r < rows as f64 && c < cols as f64;
    inside.then(|| GridPosition::new(r as usize, c as usize))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::spots::BoundingBox;

    pub(crate) fn region_at(label: u32, row: f64, col: f64) -> Region {
        Region {
            label,
            centroid: [row, col],
            area: 100,
            eccentricity: 0.1,
            orientation: 0.0,
            bbox: BoundingBox {
                min_row: row as u32,
                min_col: col as u32,
                max_row: row as u32 + 1,
                max_col: col as u32 + 1,
            },
            mean_intensity: Some(label as f64),
        }
    }

    #[test]
    fn place_drops_far_and_outside_regions() {
        let a = region_at(1, 0.0, 0.0);
        let b = region_at(2, 0.0, 0.0);
        let c = region_at(3, 0.0, 0.0);
        let coords: HashMap<u32, [f64; 2]> =
            HashMap::from([(1, [1.1, 0.9]), (2, [0.5, 1.5]), (3, [5.0, 0.0])]);
        let placed = place(&[&a, &b, &c], 2, 2, 0.5, CollisionScope::Kept, |r| {
            coords.get(&r.label).copied()
        })
        .unwrap();
        assert_eq!(placed.grid.get(GridPosition::new(1, 1)).unwrap().label, 1);
        assert_eq!(placed.dropped, vec![2, 3]);
    }

    #[test]
    fn place_reports_both_labels_on_collision() {
        let a = region_at(4, 0.0, 0.0);
        let b = region_at(7, 0.0, 0.0);
        let err = place(&[&a, &b], 3, 3, 0.5, CollisionScope::Kept, |r| {
            Some(if r.label == 4 { [1.1, 2.0] } else { [0.9, 1.8] })
        })
        .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::DuplicateAssignment {
                position: GridPosition::new(1, 2),
                first_label: 4,
                second_label: 7,
            }
        );
    }

    #[test]
    fn rounded_collision_is_caught_before_residual_drop() {
        let a = region_at(3, 0.0, 0.0);
        let b = region_at(4, 0.0, 0.0);
        let to_grid = |r: &Region| Some(if r.label == 3 { [3.4, 2.4] } else { [2.6, 2.0] });

        let err = place(&[&a, &b], 8, 6, 0.5, CollisionScope::AllRounded, to_grid).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::DuplicateAssignment {
                position: GridPosition::new(3, 2),
                first_label: 3,
                second_label: 4,
            }
        );

        let placed = place(&[&a, &b], 8, 6, 0.5, CollisionScope::Kept, to_grid).unwrap();
        assert_eq!(placed.dropped, vec![3]);
    }

    #[test]
    fn background_grid_follows_spot_labels() {
        let mut spots = GridArray::new(2, 2);
        spots.try_insert(GridPosition::new(0, 1), region_at(3, 0.0, 10.0)).unwrap();
        spots.try_insert(GridPosition::new(1, 0), region_at(5, 10.0, 0.0)).unwrap();

        let mut bg3 = region_at(3, 0.0, 10.0);
        bg3.mean_intensity = Some(200.0);
        let bg = vec![region_at(1, 0.0, 0.0), bg3, region_at(9, 4.0, 4.0)];

        let out = correspond_by_label(&spots, &bg);
        assert_eq!(out.get(GridPosition::new(0, 1)).unwrap().mean_intensity, Some(200.0));
        assert!(out.get(GridPosition::new(1, 0)).is_none());
        assert_eq!(out.n_occupied(), 1);
    }

    #[test]
    fn strategy_json_is_tagged() {
        let cfg: GridConfig = serde_json::from_str(
            r#"{"strategy":{"kind":"bounding_box_normalization","min_area":50.0}}"#,
        )
        .unwrap();
        assert_eq!(
            cfg.strategy,
            GridStrategy::BoundingBoxNormalization { min_area: 50.0 }
        );
        assert_eq!(cfg.max_residual_cells, 0.5);

        let cfg: GridConfig =
            serde_json::from_str(r#"{"strategy":{"kind":"fiducial_anchored_fit","refit":false}}"#)
                .unwrap();
        match cfg.strategy {
            GridStrategy::FiducialAnchoredFit(f) => {
                assert!(!f.refit);
                assert_eq!(f.min_anchors, FiducialFitConfig::default().min_anchors);
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }
}
