//! Per-well failure taxonomy.
//!
//! Every variant is fatal for the well being processed and non-fatal for the
//! plate: the plate runner records it and moves on to the next well.

use thiserror::Error;

use crate::grid::GridPosition;

/// Errors raised by the per-well analysis pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// No circular well boundary could be found.
    #[error("well localization failed: {reason}")]
    Localization {
        /// Human-readable cause (no edges, empty accumulator, flat histogram).
        reason: String,
    },

    /// The crop box derived from the located well is invalid.
    #[error(
        "invalid crop: center ({cx}, {cy}), half-size {half_size} does not fit a {width}x{height} image"
    )]
    Crop {
        /// Well center x (column).
        cx: i64,
        /// Well center y (row).
        cy: i64,
        /// Radius minus border margin.
        half_size: i64,
        /// Source image width.
        width: u32,
        /// Source image height.
        height: u32,
    },

    /// Spot thresholding produced no usable threshold.
    #[error("spot segmentation failed: {reason}")]
    Segmentation {
        /// Human-readable cause.
        reason: String,
    },

    /// Two regions mapped to the same grid position.
    #[error(
        "duplicate grid assignment at ({}, {}): regions {first_label} and {second_label}",
        position.row,
        position.col
    )]
    DuplicateAssignment {
        /// Contested grid position.
        position: GridPosition,
        /// Label of the region assigned first.
        first_label: u32,
        /// Label of the colliding region.
        second_label: u32,
    },

    /// The background surface could not be fitted.
    #[error("background fit failed: {reason}")]
    BackgroundFit {
        /// Human-readable cause.
        reason: String,
    },

    /// Too few fiducial anchors were matched to regions.
    #[error("missing fiducials: found {found}, need at least {needed}")]
    MissingFiducial {
        /// Number of fiducials matched to a region.
        found: usize,
        /// Minimum number required for an affine fit.
        needed: usize,
    },

    /// Enough anchors were matched but they do not constrain an affine map.
    #[error("degenerate fiducial geometry: {anchors} anchors are collinear")]
    DegenerateFiducials {
        /// Number of anchors used.
        anchors: usize,
    },

    /// Plate layout failed validation.
    #[error("invalid plate layout: {0}")]
    InvalidLayout(String),

    /// A well image could not be read.
    #[error("failed to load image: {0}")]
    ImageLoad(String),
}

impl AnalysisError {
    /// Stable snake_case tag used in failure summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Localization { .. } => "localization",
            Self::Crop { .. } => "crop",
            Self::Segmentation { .. } => "segmentation",
            Self::DuplicateAssignment { .. } => "duplicate_assignment",
            Self::BackgroundFit { .. } => "background_fit",
            Self::MissingFiducial { .. } => "missing_fiducial",
            Self::DegenerateFiducials { .. } => "degenerate_fiducials",
            Self::InvalidLayout(_) => "invalid_layout",
            Self::ImageLoad(_) => "image_load",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_assignment_message_names_position_and_labels() {
        let err = AnalysisError::DuplicateAssignment {
            position: GridPosition::new(2, 3),
            first_label: 4,
            second_label: 9,
        };
        let msg = err.to_string();
        assert!(msg.contains("(2, 3)"), "{msg}");
        assert!(msg.contains('4') && msg.contains('9'), "{msg}");
        assert_eq!(err.kind(), "duplicate_assignment");
    }

    #[test]
    fn kinds_are_distinct() {
        let errs = [
            AnalysisError::Localization { reason: String::new() },
            AnalysisError::Segmentation { reason: String::new() },
            AnalysisError::BackgroundFit { reason: String::new() },
            AnalysisError::MissingFiducial { found: 1, needed: 3 },
            AnalysisError::DegenerateFiducials { anchors: 3 },
            AnalysisError::InvalidLayout(String::new()),
            AnalysisError::ImageLoad(String::new()),
        ];
        let mut kinds: Vec<_> = errs.iter().map(AnalysisError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errs.len());
    }
}
