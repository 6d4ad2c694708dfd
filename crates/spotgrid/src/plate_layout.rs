//! Runtime print layout: grid shape, pitch, pixel scale and fiducials.
//!
//! Layout JSON follows schema `spotgrid.layout.v1`: grid dimensions, physical
//! pitch, camera pixel size and the grid positions of fiducial spots.

use std::path::Path;

use crate::error::AnalysisError;
use crate::grid::GridPosition;

const LAYOUT_SCHEMA_V1: &str = "spotgrid.layout.v1";

const DEFAULT_NAME: &str = "spotgrid_8x6";
const DEFAULT_ROWS: usize = 8;
const DEFAULT_COLS: usize = 6;
const DEFAULT_PITCH_MM: f64 = 0.4;
const DEFAULT_PIXEL_SIZE_MM: f64 = 0.0049;
const DEFAULT_FIDUCIALS: [[usize; 2]; 5] = [[0, 0], [0, 1], [0, 5], [7, 0], [7, 5]];

/// Print layout of the spot array inside one well.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateLayout {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    /// Center-to-center spacing between grid rows (mm).
    pub row_pitch_mm: f64,
    /// Center-to-center spacing between grid columns (mm).
    pub col_pitch_mm: f64,
    /// Physical size of one image pixel (mm).
    pub pixel_size_mm: f64,
    pub fiducials: Vec<GridPosition>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct PlateLayoutJsonV1 {
    schema: String,
    name: String,
    rows: usize,
    cols: usize,
    row_pitch_mm: f64,
    col_pitch_mm: f64,
    pixel_size_mm: f64,
    fiducials: Vec<[usize; 2]>,
}

impl PlateLayout {
    /// Build a validated layout from explicit values.
    pub fn new(
        name: impl Into<String>,
        rows: usize,
        cols: usize,
        row_pitch_mm: f64,
        col_pitch_mm: f64,
        pixel_size_mm: f64,
        fiducials: Vec<GridPosition>,
    ) -> Result<Self, AnalysisError> {
        let layout = Self {
            name: name.into(),
            rows,
            cols,
            row_pitch_mm,
            col_pitch_mm,
            pixel_size_mm,
            fiducials,
        };
        layout.validate().map_err(AnalysisError::InvalidLayout)?;
        Ok(layout)
    }

    /// Row pitch in image pixels.
    pub fn row_pitch_px(&self) -> f64 {
        self.row_pitch_mm / self.pixel_size_mm
    }

    /// Column pitch in image pixels.
    pub fn col_pitch_px(&self) -> f64 {
        self.col_pitch_mm / self.pixel_size_mm
    }

    /// Total number of grid cells.
    pub fn n_cells(&self) -> usize {
        self.rows * self.cols
    }

    /// Load a layout from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data).map_err(Into::into)
    }

    /// Parse a layout from JSON text.
    pub fn from_json_str(data: &str) -> Result<Self, AnalysisError> {
        let doc: PlateLayoutJsonV1 =
            serde_json::from_str(data).map_err(|e| AnalysisError::InvalidLayout(e.to_string()))?;
        Self::from_json_v1(doc).map_err(AnalysisError::InvalidLayout)
    }

    /// Serialize to the `spotgrid.layout.v1` JSON schema.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        let doc = PlateLayoutJsonV1 {
            schema: LAYOUT_SCHEMA_V1.to_string(),
            name: self.name.clone(),
            rows: self.rows,
            cols: self.cols,
            row_pitch_mm: self.row_pitch_mm,
            col_pitch_mm: self.col_pitch_mm,
            pixel_size_mm: self.pixel_size_mm,
            fiducials: self.fiducials.iter().map(|p| [p.row, p.col]).collect(),
        };
        serde_json::to_string_pretty(&doc)
    }

    fn from_json_v1(doc: PlateLayoutJsonV1) -> Result<Self, String> {
        if doc.schema != LAYOUT_SCHEMA_V1 {
            return Err(format!(
                "unsupported layout schema '{}' (expected '{}')",
                doc.schema, LAYOUT_SCHEMA_V1
            ));
        }

        let layout = Self {
            name: doc.name,
            rows: doc.rows,
            cols: doc.cols,
            row_pitch_mm: doc.row_pitch_mm,
            col_pitch_mm: doc.col_pitch_mm,
            pixel_size_mm: doc.pixel_size_mm,
            fiducials: doc.fiducials.into_iter().map(GridPosition::from).collect(),
        };
        layout.validate()?;
        Ok(layout)
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("layout name must not be empty".to_string());
        }
        if self.rows == 0 || self.cols == 0 {
            return Err("rows and cols must be >= 1".to_string());
        }
        for (field, v) in [
            ("row_pitch_mm", self.row_pitch_mm),
            ("col_pitch_mm", self.col_pitch_mm),
            ("pixel_size_mm", self.pixel_size_mm),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(format!("{field} must be finite and > 0"));
            }
        }

        for (i, f) in self.fiducials.iter().enumerate() {
            if f.row >= self.rows || f.col >= self.cols {
                return Err(format!(
                    "fiducial ({}, {}) lies outside the {}x{} grid",
                    f.row, f.col, self.rows, self.cols
                ));
            }
            if self.fiducials[..i].contains(f) {
                return Err(format!("fiducial ({}, {}) listed twice", f.row, f.col));
            }
        }
        Ok(())
    }
}

impl Default for PlateLayout {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            row_pitch_mm: DEFAULT_PITCH_MM,
            col_pitch_mm: DEFAULT_PITCH_MM,
            pixel_size_mm: DEFAULT_PIXEL_SIZE_MM,
            fiducials: DEFAULT_FIDUCIALS
                .iter()
                .copied()
                .map(GridPosition::from)
                .collect(),
        }
    }
}
