use image::GrayImage;

use crate::grid::GridArray;
use crate::od::OdTable;
use crate::spots::Region;
use crate::well::{CropBox, WellCircle};
use crate::GrayF32;

/// Analysis result for one well image.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WellReport {
    /// Located well boundary in source pixels.
    pub circle: WellCircle,
    /// Crop box in source pixels; region centroids are relative to it.
    pub crop: CropBox,
    /// Regions labelled in the spot mask.
    pub n_regions: usize,
    /// Regions surviving the filters.
    pub n_filtered: usize,
    /// Labels dropped by grid assignment as spurious.
    pub dropped_labels: Vec<u32>,
    /// Fitted grid-to-crop affine map (`[row, col] = A * [r, c, 1]`), when
    /// the fiducial strategy ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_transform: Option<[[f64; 3]; 2]>,
    /// Mean assignment residual in grid cells.
    pub mean_residual_cells: f64,
    /// Radius of the placed measurement discs, when placement ran.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub placed_radius_px: Option<f64>,
    /// OD with the spot and background intensities it came from.
    pub table: OdTable,
}

/// Intermediate images and assignments of one well, for debug output.
#[derive(Debug, Clone)]
pub struct WellArtifacts {
    pub crop: GrayImage,
    pub well_mask: GrayImage,
    pub spot_mask: GrayImage,
    pub background: GrayF32,
    /// Thresholded regions as assigned to the grid.
    pub spots: GridArray<Region>,
    /// Fixed-size disc mask the OD was measured over, when placement ran.
    pub placed_mask: Option<GrayImage>,
    /// Regions the OD was measured over, per cell.
    pub measured: GridArray<Region>,
}
