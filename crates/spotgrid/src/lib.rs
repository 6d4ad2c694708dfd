//! spotgrid: optical-density quantification of antibody-array spots printed
//! in the wells of a multi-well plate.
//!
//! Each well image flows forward through these stages:
//!
//! 1. **Well** – circular well boundary localization (histogram threshold,
//!    Canny edges, gradient-directed circular Hough votes) and square crop of
//!    the interior.
//! 2. **Spots** – inverted-histogram binarization with optional closing,
//!    connected-component labelling with shape/intensity statistics, and
//!    attribute predicates over regions.
//! 3. **Assign** – mapping of regions onto the logical print grid, either by
//!    bounding-box normalization or by an affine fit anchored on fiducials.
//! 4. **Background** – low-order polynomial surface fitted outside the spots.
//! 5. **Placement** – fixed-size discs stamped at the fitted cell positions;
//!    spot and background intensities are re-measured over that mask.
//! 6. **OD** – per-cell combination of spot and background intensity.
//!
//! # Public API
//! - [`WellAnalyzer`] with [`PlateLayout`] and [`AnalyzeConfig`] for single wells
//! - [`run_plate`] for a pool of workers over many wells, producing a
//!   [`PlateReport`]
//! - stage functions for callers that need intermediate results

mod analyzer;
mod assign;
mod background;
mod debug_dump;
mod error;
mod grid;
mod od;
mod pipeline;
mod plate;
mod plate_layout;
mod spots;
mod threshold;
mod well;

#[cfg(test)]
mod test_utils;

use image::{GrayImage, ImageBuffer, Luma};

pub use analyzer::WellAnalyzer;
pub use assign::{
    assign_to_grid, correspond_by_label, place_spot_mask, FiducialFitConfig, GridAffine,
    GridAssignment, GridConfig, GridStrategy, PlacedSpots, PlacementConfig,
};
pub use background::{fit_background, BackgroundConfig};
pub use error::AnalysisError;
pub use grid::{GridArray, GridPosition};
pub use od::{compute_od, OdConfig, OdTable, OdTransform};
pub use pipeline::{analyze_well, analyze_well_with_artifacts, AnalyzeConfig, WellArtifacts, WellReport};
pub use plate::{
    discover_wells, run_plate, ParseWellIdError, PlateReport, PlateRunConfig, WellFailure,
    WellId, WellInput, WellSource,
};
pub use plate_layout::PlateLayout;
pub use spots::{
    extract_regions, filter_regions, filter_regions_all, segment_spots, BoundingBox, Condition,
    Region, RegionAttribute, RegionPredicate, SegmentConfig,
};
pub use threshold::{binarize_inverted, Binarized, ThresholdMethod};
pub use well::{crop_well, locate_well, CropBox, CropConfig, WellCircle, WellLocation, WellLocatorConfig};

/// Single-channel floating-point image.
pub type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Widen an 8-bit image to `f32` without rescaling.
pub fn to_f32(gray: &GrayImage) -> GrayF32 {
    GrayF32::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([gray.get_pixel(x, y)[0] as f32])
    })
}
