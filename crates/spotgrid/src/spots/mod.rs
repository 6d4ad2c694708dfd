//! Spot-level stages: segmentation, region extraction and filtering.

mod filter;
mod region;
mod segment;

pub use filter::{filter_regions, filter_regions_all, Condition, RegionAttribute, RegionPredicate};
pub use region::{extract_regions, BoundingBox, Region};
pub use segment::{segment_spots, SegmentConfig};
