//! Fiducial-anchored affine grid fit.
//!
//! The nominal grid is axis aligned, centered in the crop and spaced by the
//! layout pitch. Each fiducial claims the nearest unclaimed region within the
//! search radius of its nominal position; the claimed pairs fix an affine
//! grid-to-image map that is then inverted for every region.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::grid::{GridArray, GridPosition};
use crate::plate_layout::PlateLayout;
use crate::spots::Region;

use super::{place, CollisionScope, GridAffine, GridAssignment};

/// Configuration for the fiducial-anchored strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiducialFitConfig {
    /// Anchor search radius around each nominal fiducial position, in units
    /// of the smaller grid pitch.
    pub search_radius_cells: f64,
    /// Minimum matched fiducials. Values below 3 are raised to 3.
    pub min_anchors: usize,
    /// Refit the affine map once from every assigned region and reassign.
    pub refit: bool,
}

impl Default for FiducialFitConfig {
    fn default() -> Self {
        Self {
            search_radius_cells: 0.5,
            min_anchors: 3,
            refit: true,
        }
    }
}

pub(super) fn assign(
    regions: &[Region],
    layout: &PlateLayout,
    crop_size: (u32, u32),
    config: &FiducialFitConfig,
    max_residual_cells: f64,
) -> Result<GridAssignment, AnalysisError> {
    let (width, height) = crop_size;
    let nominal = GridAffine::centered(
        [(height as f64 - 1.0) * 0.5, (width as f64 - 1.0) * 0.5],
        layout.row_pitch_px(),
        layout.col_pitch_px(),
        layout.rows,
        layout.cols,
    );
    let radius = config.search_radius_cells * layout.row_pitch_px().min(layout.col_pitch_px());

    let anchors = match_anchors(regions, &layout.fiducials, &nominal, radius);
    let needed = config.min_anchors.max(3);
    tracing::debug!(
        "fiducials: {}/{} anchored within {:.1}px",
        anchors.len(),
        layout.fiducials.len(),
        radius
    );
    if anchors.len() < needed {
        return Err(AnalysisError::MissingFiducial {
            found: anchors.len(),
            needed,
        });
    }

    let grid_pts: Vec<[f64; 2]> = anchors
        .iter()
        .map(|(p, _)| [p.row as f64, p.col as f64])
        .collect();
    let image_pts: Vec<[f64; 2]> = anchors.iter().map(|(_, c)| *c).collect();
    let mut transform = GridAffine::fit(&grid_pts, &image_pts).ok_or(
        AnalysisError::DegenerateFiducials {
            anchors: anchors.len(),
        },
    )?;

    let refs: Vec<&Region> = regions.iter().collect();
    let (rows, cols) = (layout.rows, layout.cols);
    let mut placed = place(&refs, rows, cols, max_residual_cells, CollisionScope::Kept, |r| {
        transform.invert(r.centroid)
    })?;

    if config.refit {
        if let Some(refined) = refit(&placed.grid) {
            match place(&refs, rows, cols, max_residual_cells, CollisionScope::Kept, |r| {
                refined.invert(r.centroid)
            }) {
                Ok(p) => {
                    placed = p;
                    transform = refined;
                }
                Err(e) => tracing::warn!("refit discarded: {e}"),
            }
        }
    }

    Ok(GridAssignment {
        grid: placed.grid,
        dropped: placed.dropped,
        transform: Some(transform),
        mean_residual_cells: placed.mean_residual_cells,
    })
}

/// Pair each fiducial with the nearest unclaimed region inside `radius`.
fn match_anchors(
    regions: &[Region],
    fiducials: &[GridPosition],
    nominal: &GridAffine,
    radius: f64,
) -> Vec<(GridPosition, [f64; 2])> {
    let mut claimed = vec![false; regions.len()];
    let mut anchors = Vec::with_capacity(fiducials.len());
    for &f in fiducials {
        let expected = nominal.apply([f.row as f64, f.col as f64]);
        let best = regions
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed[*i])
            .map(|(i, r)| {
                let d = (r.centroid[0] - expected[0]).hypot(r.centroid[1] - expected[1]);
                (i, d)
            })
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match best {
            Some((i, _)) => {
                claimed[i] = true;
                anchors.push((f, regions[i].centroid));
            }
            None => tracing::debug!(
                "fiducial ({}, {}) not found near ({:.1}, {:.1})",
                f.row,
                f.col,
                expected[0],
                expected[1]
            ),
        }
    }
    anchors
}

fn refit(grid: &GridArray<Region>) -> Option<GridAffine> {
    let (g, p): (Vec<[f64; 2]>, Vec<[f64; 2]>) = grid
        .occupied()
        .map(|(pos, r)| ([pos.row as f64, pos.col as f64], r.centroid))
        .unzip();
    GridAffine::fit(&g, &p)
}
