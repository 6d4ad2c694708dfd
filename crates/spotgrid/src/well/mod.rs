//! Well-level stages: boundary localization and interior cropping.

mod crop;
mod locate;

pub use crop::{crop_well, CropBox, CropConfig};
pub use locate::{locate_well, WellCircle, WellLocation, WellLocatorConfig};
