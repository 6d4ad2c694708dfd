//! Plate-level orchestration.
//!
//! Wells are independent: each one runs the full pipeline on a worker of a
//! fixed-size pool, and completed results are gathered at a single point into
//! a [`PlateReport`] keyed by [`WellId`]. A failing well is recorded in the
//! failure summary and never stops the others.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::WellAnalyzer;
use crate::debug_dump;
use crate::error::AnalysisError;
use crate::pipeline::WellReport;

const MAX_ROWS: u8 = 16;
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "tif", "tiff", "jpg", "jpeg"];

/// Well label such as `A9` or `H12`: one row letter `A`..`P` and a one- or
/// two-digit column from 1, written without leading zeros.
///
/// Orders by row, then numerically by column, so `A9 < A10 < B1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WellId {
    row: u8,
    col: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid well id {0:?}: expected a row letter A-P followed by a column 1-99 without leading zeros")]
pub struct ParseWellIdError(String);

impl WellId {
    /// Zero-based row index (`A` = 0).
    pub fn row(self) -> usize {
        self.row as usize
    }

    pub fn col(self) -> u32 {
        self.col as u32
    }

    /// Parse the file stem of `path` (`.../B10.png` -> `B10`).
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_stem()?.to_str()?.parse().ok()
    }
}

impl FromStr for WellId {
    type Err = ParseWellIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseWellIdError(s.to_string());
        let bytes = s.as_bytes();
        let (&letter, digits) = bytes.split_first().ok_or_else(err)?;
        if !(b'A'..b'A' + MAX_ROWS).contains(&letter)
            || digits.is_empty()
            || digits.len() > 2
            || !digits.iter().all(u8::is_ascii_digit)
            || digits[0] == b'0'
        {
            return Err(err());
        }
        let col = digits.iter().fold(0u8, |acc, d| acc * 10 + (d - b'0'));
        Ok(Self {
            row: letter - b'A',
            col,
        })
    }
}

impl fmt::Display for WellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'A' + self.row) as char, self.col)
    }
}

impl TryFrom<String> for WellId {
    type Error = ParseWellIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<WellId> for String {
    fn from(id: WellId) -> Self {
        id.to_string()
    }
}

/// Where a well image comes from.
#[derive(Debug, Clone)]
pub enum WellSource {
    /// Decoded on the worker; decode failures become [`AnalysisError::ImageLoad`].
    File(PathBuf),
    Image(GrayImage),
}

#[derive(Debug, Clone)]
pub struct WellInput {
    pub id: WellId,
    pub source: WellSource,
}

impl WellInput {
    /// Input for an image file named after its well, or `None` when the file
    /// stem is not a well id.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let id = WellId::from_path(&path)?;
        Some(Self {
            id,
            source: WellSource::File(path),
        })
    }
}

/// Image files in `dir` named after a well, sorted by well id.
///
/// Files with other names or extensions are skipped.
pub fn discover_wells(dir: &Path) -> std::io::Result<Vec<WellInput>> {
    let mut inputs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if !is_image || !path.is_file() {
            continue;
        }
        match WellInput::from_path(path.clone()) {
            Some(input) => inputs.push(input),
            None => tracing::debug!("skipping {}", path.display()),
        }
    }
    inputs.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(inputs)
}

/// Run-level options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateRunConfig {
    /// Worker threads; `0` lets the pool pick one per core.
    pub workers: usize,
    /// Directory for per-well debug PNGs. Nothing is written when `None`.
    pub debug_dir: Option<PathBuf>,
}

/// One failed well in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellFailure {
    pub well: WellId,
    /// Stable error tag, see [`AnalysisError::kind`].
    pub kind: String,
    pub message: String,
}

/// Aggregated results of one plate run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlateReport {
    /// Layout name the wells were analyzed against.
    pub layout: String,
    pub wells: BTreeMap<WellId, WellReport>,
    /// Failed wells, sorted by id.
    pub failures: Vec<WellFailure>,
}

impl PlateReport {
    pub fn n_succeeded(&self) -> usize {
        self.wells.len()
    }

    pub fn n_failed(&self) -> usize {
        self.failures.len()
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

/// Analyze every well on a pool of `config.workers` threads.
///
/// Only pool construction can fail; per-well errors land in
/// [`PlateReport::failures`]. Repeated well ids keep their first input.
pub fn run_plate(
    analyzer: &WellAnalyzer,
    inputs: Vec<WellInput>,
    config: &PlateRunConfig,
) -> Result<PlateReport, rayon::ThreadPoolBuildError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .thread_name(|i| format!("spotgrid-well-{i}"))
        .build()?;

    let mut seen = BTreeSet::new();
    let inputs: Vec<WellInput> = inputs
        .into_iter()
        .filter(|input| {
            let fresh = seen.insert(input.id);
            if !fresh {
                tracing::warn!("well {} listed more than once; keeping the first", input.id);
            }
            fresh
        })
        .collect();
    tracing::info!(
        "analyzing {} wells on {} workers",
        inputs.len(),
        pool.current_num_threads()
    );

    let debug_dir = config.debug_dir.as_deref();
    let outcomes: Vec<(WellId, Result<WellReport, AnalysisError>)> = pool.install(|| {
        inputs
            .into_par_iter()
            .map(|input| {
                let id = input.id;
                let span = tracing::info_span!("well", id = %id);
                let _enter = span.enter();
                (id, process_well(analyzer, input, debug_dir))
            })
            .collect()
    });

    let mut report = PlateReport {
        layout: analyzer.layout().name.clone(),
        ..PlateReport::default()
    };
    for (id, outcome) in outcomes {
        match outcome {
            Ok(well) => {
                report.wells.insert(id, well);
            }
            Err(e) => report.failures.push(WellFailure {
                well: id,
                kind: e.kind().to_string(),
                message: e.to_string(),
            }),
        }
    }
    report.failures.sort_by(|a, b| a.well.cmp(&b.well));
    tracing::info!(
        "plate done: {} succeeded, {} failed",
        report.n_succeeded(),
        report.n_failed()
    );
    Ok(report)
}

fn process_well(
    analyzer: &WellAnalyzer,
    input: WellInput,
    debug_dir: Option<&Path>,
) -> Result<WellReport, AnalysisError> {
    let gray = match input.source {
        WellSource::File(path) => load_gray(&path)?,
        WellSource::Image(img) => img,
    };

    let outcome = match debug_dir {
        Some(dir) => analyzer.analyze_with_artifacts(&gray).map(|(report, artifacts)| {
            if let Err(e) = debug_dump::write_well_artifacts(dir, &input.id.to_string(), &artifacts)
            {
                tracing::warn!("debug artifacts not written: {e}");
            }
            report
        }),
        None => analyzer.analyze(&gray),
    };

    match &outcome {
        Ok(report) => tracing::info!(
            "{} of {} cells measured, {} regions dropped",
            report.table.od.n_occupied(),
            analyzer.layout().n_cells(),
            report.dropped_labels.len()
        ),
        Err(e) => tracing::warn!("failed ({}): {e}", e.kind()),
    }
    outcome
}

fn load_gray(path: &Path) -> Result<GrayImage, AnalysisError> {
    image::open(path)
        .map(|img| img.into_luma8())
        .map_err(|e| AnalysisError::ImageLoad(format!("{}: {e}", path.display())))
}
