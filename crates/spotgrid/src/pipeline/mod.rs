//! Per-well analysis pipeline.
//!
//! Glue layer wiring the stages together in a fixed forward order:
//! well localization -> crop -> spot segmentation -> region extraction ->
//! filtering -> grid assignment -> background fit -> OD. Any stage error ends
//! the well.
//!
//! Algorithmic primitives live in `crate::well`, `crate::spots`,
//! `crate::assign`, `crate::background` and `crate::od`.

mod config;
mod result;
mod run;

pub use config::AnalyzeConfig;
pub use result::{WellArtifacts, WellReport};
pub use run::{analyze_well, analyze_well_with_artifacts};
