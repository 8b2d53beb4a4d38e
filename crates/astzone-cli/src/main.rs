//! astzone CLI: command-line interface for inhibition-zone measurement.

use astzone::{
    Circle, ClusterCenters, ErrorKind, InhibDisk, MeasureConfig, MeasureMode, MeasurementContext,
    ProfileKind, ZoneMeter,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "astzone")]
#[command(about = "Measure inhibition-zone diameters on disk-diffusion antibiogram images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure the inhibition zone of every pellet on a dish.
    Measure(CliMeasureArgs),

    /// Dump the radial intensity profile of one pellet.
    Profile(CliProfileArgs),

    /// Print the default configuration (JSON).
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct CliDishArgs {
    /// Path to the cropped dish image.
    #[arg(long)]
    image: PathBuf,

    /// Path to the pellet circles (JSON array of {"center":[x,y],"radius":r}).
    #[arg(long)]
    circles: PathBuf,

    /// The dish is round (default: rectangular).
    #[arg(long)]
    round: bool,

    /// Path to a measurement config (JSON). Missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Diameter reading sensitivity in [0, 1]; 0 selects it per pellet.
    #[arg(long)]
    sensitivity: Option<f32>,
}

#[derive(Debug, Clone, Args)]
struct CliMeasureArgs {
    #[command(flatten)]
    dish: CliDishArgs,

    /// Which diameter to read.
    #[arg(long, value_enum, default_value_t = ModeArg::Inscribed)]
    mode: ModeArg,

    /// Path to write results (JSON). Printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliProfileArgs {
    #[command(flatten)]
    dish: CliDishArgs,

    /// Pellet index (order of the circles file).
    #[arg(long)]
    pellet: usize,

    /// Profile reduction.
    #[arg(long, value_enum, default_value_t = ProfileKindArg::Mean)]
    kind: ProfileKindArg,

    /// Switch-profile threshold on the 0-1 scale.
    #[arg(long, default_value = "0.5")]
    threshold: f32,

    /// Path to write the profile (JSON). Printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Inscribed,
    Circumscribed,
}

impl ModeArg {
    fn to_core(self) -> MeasureMode {
        match self {
            Self::Inscribed => MeasureMode::Inscribed,
            Self::Circumscribed => MeasureMode::Circumscribed,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileKindArg {
    Mean,
    Max,
    MaxAverage,
    Switch,
}

impl ProfileKindArg {
    fn to_core(self) -> ProfileKind {
        match self {
            Self::Mean => ProfileKind::Mean,
            Self::Max => ProfileKind::Max,
            Self::MaxAverage => ProfileKind::MaxAverage,
            Self::Switch => ProfileKind::Switch,
        }
    }
}

#[derive(serde::Serialize)]
struct PelletReport {
    index: usize,
    /// Pellet circle in the input image frame.
    circle: Circle,
    #[serde(skip_serializing_if = "Option::is_none")]
    disk: Option<InhibDisk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
}

#[derive(serde::Serialize)]
struct MeasureReport {
    image: String,
    mode: MeasureMode,
    px_per_mm: f32,
    original_px_per_mm: f32,
    global_centers: ClusterCenters,
    pellets: Vec<PelletReport>,
}

#[derive(serde::Serialize)]
struct ProfileReport {
    pellet: usize,
    kind: ProfileKind,
    px_per_mm: f32,
    local_centers: ClusterCenters,
    local_threshold: f32,
    profile: Vec<f32>,
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
        Commands::Measure(args) => run_measure(&args),
        Commands::Profile(args) => run_profile(&args),
        Commands::DefaultConfig => run_default_config(),
    }
}

fn build_config(args: &CliDishArgs) -> CliResult<MeasureConfig> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("Loading config: {}", path.display());
            MeasureConfig::from_json_file(path)?
        }
        None => MeasureConfig::default(),
    };
    if let Some(s) = args.sensitivity {
        config.inhibition.sensitivity = s;
    }
    Ok(config)
}

fn load_circles(path: &Path) -> CliResult<Vec<Circle>> {
    let data = std::fs::read_to_string(path).map_err(|e| -> CliError {
        format!("Failed to read circles {}: {}", path.display(), e).into()
    })?;
    let circles: Vec<Circle> = serde_json::from_str(&data)?;
    Ok(circles)
}

/// Load inputs and build the measurement context shared by both commands.
fn prepare(args: &CliDishArgs) -> CliResult<(ZoneMeter, Vec<Circle>, MeasurementContext)> {
    let meter = ZoneMeter::new(build_config(args)?)?;
    let circles = load_circles(&args.circles)?;

    tracing::info!("Loading image: {}", args.image.display());
    let img = image::open(&args.image).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", args.image.display(), e).into()
    })?;
    let rgb = img.to_rgb8();
    let (w, h) = rgb.dimensions();
    tracing::info!(
        "Image size: {}x{}, {} pellets, {} dish",
        w,
        h,
        circles.len(),
        if args.round { "round" } else { "rectangular" }
    );

    let ctx = meter.compute_measurement_context(&rgb, args.round, &circles)?;
    Ok((meter, circles, ctx))
}

fn write_json<T: serde::Serialize>(value: &T, out: Option<&Path>) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            std::fs::write(path, &json)?;
            tracing::info!("Results written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_measure(args: &CliMeasureArgs) -> CliResult<()> {
    let (meter, circles, ctx) = prepare(&args.dish)?;
    let mode = args.mode.to_core();

    let pellets: Vec<PelletReport> = meter
        .estimate_each_diameter(&ctx, mode)
        .into_iter()
        .zip(&circles)
        .enumerate()
        .map(|(index, (res, circle))| match res {
            Ok(disk) => PelletReport {
                index,
                circle: *circle,
                disk: Some(disk),
                error: None,
                error_kind: None,
            },
            Err(e) => {
                tracing::warn!("Pellet {}: {}", index, e);
                PelletReport {
                    index,
                    circle: *circle,
                    disk: None,
                    error: Some(e.to_string()),
                    error_kind: Some(e.kind()),
                }
            }
        })
        .collect();

    let n_measured = pellets.iter().filter(|p| p.disk.is_some()).count();
    tracing::info!(
        "Measured {}/{} pellets ({} mode)",
        n_measured,
        pellets.len(),
        mode
    );

    let report = MeasureReport {
        image: args.dish.image.display().to_string(),
        mode,
        px_per_mm: ctx.px_per_mm(),
        original_px_per_mm: ctx.original_px_per_mm(),
        global_centers: *ctx.global_centers(),
        pellets,
    };
    write_json(&report, args.out.as_deref())
}

fn run_profile(args: &CliProfileArgs) -> CliResult<()> {
    let (_meter, _circles, ctx) = prepare(&args.dish)?;
    let kind = args.kind.to_core();
    let profile = ctx.radial_profile(args.pellet, kind, args.threshold)?;
    tracing::info!("Profile of pellet {}: {} radii ({})", args.pellet, profile.len(), kind);

    let report = ProfileReport {
        pellet: args.pellet,
        kind,
        px_per_mm: ctx.px_per_mm(),
        local_centers: ctx.local_centers()[args.pellet],
        local_threshold: ctx.local_thresholds()[args.pellet],
        profile,
    };
    write_json(&report, args.out.as_deref())
}

fn run_default_config() -> CliResult<()> {
    let json = serde_json::to_string_pretty(&MeasureConfig::default())?;
    println!("{json}");
    Ok(())
}
