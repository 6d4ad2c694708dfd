//! Bounding-box normalization strategy.

use crate::error::AnalysisError;
use crate::plate_layout::PlateLayout;
use crate::spots::Region;

use super::{place, CollisionScope, GridAssignment};

const MIN_SPAN_PX: f64 = 1e-6;

pub(super) fn assign(
    regions: &[Region],
    layout: &PlateLayout,
    min_area: f64,
    max_residual_cells: f64,
) -> Result<GridAssignment, AnalysisError> {
    let (rows, cols) = (layout.rows, layout.cols);
    let (candidates, small): (Vec<&Region>, Vec<&Region>) =
        regions.iter().partition(|r| r.area as f64 > min_area);

    let mut lo = [f64::INFINITY; 2];
    let mut hi = [f64::NEG_INFINITY; 2];
    for r in &candidates {
        for k in 0..2 {
            lo[k] = lo[k].min(r.centroid[k]);
            hi[k] = hi[k].max(r.centroid[k]);
        }
    }
    let scale = |k: usize, n: usize, v: f64| {
        let span = hi[k] - lo[k];
        if n < 2 || span < MIN_SPAN_PX {
            0.0
        } else {
            (n - 1) as f64 * (v - lo[k]) / span
        }
    };

    let mut placed = place(
        &candidates,
        rows,
        cols,
        max_residual_cells,
        CollisionScope::AllRounded,
        |r| Some([scale(0, rows, r.centroid[0]), scale(1, cols, r.centroid[1])]),
    )?;
    placed.dropped.extend(small.iter().map(|r| r.label));
    placed.dropped.sort_unstable();

    Ok(GridAssignment {
        grid: placed.grid,
        dropped: placed.dropped,
        transform: None,
        mean_residual_cells: placed.mean_residual_cells,
    })
}
