//! High-level analysis API.
//!
//! [`WellAnalyzer`] is the primary entry point. It pairs a [`PlateLayout`]
//! with an [`AnalyzeConfig`]; create it once and analyze many well images.

use std::path::Path;

use image::GrayImage;

use crate::error::AnalysisError;
use crate::pipeline::{self, AnalyzeConfig, WellArtifacts, WellReport};
use crate::plate_layout::PlateLayout;

/// Primary per-well analysis interface.
///
/// # Examples
///
/// ```no_run
/// use spotgrid::{PlateLayout, WellAnalyzer};
/// use image::GrayImage;
///
/// let analyzer = WellAnalyzer::new(PlateLayout::default());
/// let image = GrayImage::new(2048, 2048);
/// match analyzer.analyze(&image) {
///     Ok(report) => println!("{} cells measured", report.table.od.n_occupied()),
///     Err(e) => eprintln!("{} failed: {e}", e.kind()),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct WellAnalyzer {
    layout: PlateLayout,
    config: AnalyzeConfig,
}

impl WellAnalyzer {
    /// Analyzer with the default configuration.
    pub fn new(layout: PlateLayout) -> Self {
        Self::with_config(layout, AnalyzeConfig::default())
    }

    pub fn with_config(layout: PlateLayout, config: AnalyzeConfig) -> Self {
        Self { layout, config }
    }

    /// Load a layout JSON file and use the default configuration.
    pub fn from_layout_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::new(PlateLayout::from_json_file(path)?))
    }

    pub fn layout(&self) -> &PlateLayout {
        &self.layout
    }

    pub fn config(&self) -> &AnalyzeConfig {
        &self.config
    }

    /// Mutable access for post-construction tuning.
    pub fn config_mut(&mut self) -> &mut AnalyzeConfig {
        &mut self.config
    }

    /// Analyze one well image.
    pub fn analyze(&self, image: &GrayImage) -> Result<WellReport, AnalysisError> {
        pipeline::analyze_well(image, &self.layout, &self.config)
    }

    /// Analyze one well image and keep the intermediate images.
    pub fn analyze_with_artifacts(
        &self,
        image: &GrayImage,
    ) -> Result<(WellReport, WellArtifacts), AnalysisError> {
        pipeline::analyze_well_with_artifacts(image, &self.layout, &self.config)
    }
}
