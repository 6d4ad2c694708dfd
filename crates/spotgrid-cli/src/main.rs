//! spotgrid CLI: batch OD measurement over a folder of well images.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use spotgrid::{
    discover_wells, run_plate, AnalyzeConfig, FiducialFitConfig, GridStrategy, OdTransform,
    PlateLayout, PlateRunConfig, WellAnalyzer,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

const REPORT_FILE: &str = "ods.json";

#[derive(Parser)]
#[command(name = "spotgrid")]
#[command(about = "Measure antibody-array spot optical density in multi-well plate images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every well image in a folder and write ods.json.
    Analyze(CliAnalyzeArgs),

    /// Print the plate layout and derived pixel pitches.
    LayoutInfo {
        /// Layout JSON (spotgrid.layout.v1). Defaults to the built-in 8x6 layout.
        #[arg(long)]
        layout: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    /// Folder holding well images named like A1.png, H12.tif.
    #[arg(long)]
    input: PathBuf,

    /// Output folder for ods.json (and debug images).
    #[arg(long)]
    out: PathBuf,

    /// Layout JSON (spotgrid.layout.v1). Defaults to the built-in 8x6 layout.
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Analysis config JSON; omitted sections use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write per-well debug PNGs to <out>/debug.
    #[arg(long)]
    debug: bool,

    /// Worker threads (0 = one per core).
    #[arg(long, default_value = "0")]
    workers: usize,

    /// Override the grid assignment strategy.
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Override the OD formula.
    #[arg(long, value_enum)]
    od_transform: Option<OdTransformArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    /// Affine fit anchored on the layout's fiducial spots.
    Fiducial,
    /// Rescale the centroid bounding box onto the grid.
    BoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OdTransformArg {
    /// log10(background / spot)
    Log10Ratio,
    /// background - spot
    Difference,
}

impl From<OdTransformArg> for OdTransform {
    fn from(arg: OdTransformArg) -> Self {
        match arg {
            OdTransformArg::Log10Ratio => OdTransform::Log10Ratio,
            OdTransformArg::Difference => OdTransform::Difference,
        }
    }
}

impl CliAnalyzeArgs {
    fn to_config(&self) -> CliResult<AnalyzeConfig> {
        let mut config = match &self.config {
            Some(path) => AnalyzeConfig::from_json_file(path).map_err(|e| -> CliError {
                format!("Failed to load config {}: {}", path.display(), e).into()
            })?,
            None => AnalyzeConfig::default(),
        };
        match self.strategy {
            Some(StrategyArg::Fiducial) => {
                if !matches!(config.grid.strategy, GridStrategy::FiducialAnchoredFit(_)) {
                    config.grid.strategy =
                        GridStrategy::FiducialAnchoredFit(FiducialFitConfig::default());
                }
            }
            Some(StrategyArg::BoundingBox) => {
                config.grid.strategy = GridStrategy::BoundingBoxNormalization { min_area: 0.0 };
            }
            None => {}
        }
        if let Some(t) = self.od_transform {
            config.od.transform = t.into();
        }
        Ok(config)
    }

    fn to_run_config(&self) -> PlateRunConfig {
        PlateRunConfig {
            workers: self.workers,
            debug_dir: self.debug.then(|| self.out.join("debug")),
        }
    }
}

fn load_layout(path: Option<&Path>) -> CliResult<PlateLayout> {
    match path {
        Some(p) => PlateLayout::from_json_file(p).map_err(|e| -> CliError {
            format!("Failed to load layout {}: {}", p.display(), e).into()
        }),
        None => Ok(PlateLayout::default()),
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => run_analyze(&args),
        Commands::LayoutInfo { layout } => run_layout_info(layout.as_deref()),
    }
}

// ── layout-info ────────────────────────────────────────────────────────

fn run_layout_info(path: Option<&Path>) -> CliResult<()> {
    let layout = load_layout(path)?;

    println!("spotgrid plate layout");
    println!("  name:           {}", layout.name);
    println!("  grid:           {} rows x {} cols", layout.rows, layout.cols);
    println!(
        "  pitch:          {} x {} mm",
        layout.row_pitch_mm, layout.col_pitch_mm
    );
    println!("  pixel size:     {} mm", layout.pixel_size_mm);
    println!(
        "  pitch (px):     {:.1} x {:.1}",
        layout.row_pitch_px(),
        layout.col_pitch_px()
    );
    let fiducials: Vec<String> = layout
        .fiducials
        .iter()
        .map(|p| format!("({}, {})", p.row, p.col))
        .collect();
    println!("  fiducials:      {}", fiducials.join(" "));
    println!();
    println!("{}", layout.to_json_string()?);
    Ok(())
}

// ── analyze ────────────────────────────────────────────────────────────

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    let layout = load_layout(args.layout.as_deref())?;
    let config = args.to_config()?;
    tracing::debug!("config: {}", serde_json::to_string(&config)?);

    let inputs = discover_wells(&args.input).map_err(|e| -> CliError {
        format!("Failed to list {}: {}", args.input.display(), e).into()
    })?;
    if inputs.is_empty() {
        return Err(format!("No well images found in {}", args.input.display()).into());
    }
    tracing::info!(
        "Found {} well images in {} (layout {})",
        inputs.len(),
        args.input.display(),
        layout.name
    );

    std::fs::create_dir_all(&args.out)?;
    let analyzer = WellAnalyzer::with_config(layout, config);
    let report = run_plate(&analyzer, inputs, &args.to_run_config())?;

    let out_path = args.out.join(REPORT_FILE);
    report.write_json(&out_path)?;
    tracing::info!(
        "{} wells analyzed, {} failed; results written to {}",
        report.n_succeeded(),
        report.n_failed(),
        out_path.display()
    );
    for f in &report.failures {
        tracing::warn!("{}: {} ({})", f.well, f.kind, f.message);
    }
    Ok(())
}
