//! Runshape - turn a drawn shape into a runnable GPS loop.
//!
//! Backend and tuning come from the environment (`RUNSHAPE_BACKEND`,
//! `OSRM_URL`, `MAPBOX_TOKEN`, `RUNSHAPE_SHAPES_PATH`, ...). Routes are
//! printed to stdout as JSON; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use runshape_cli::{error_json, print_json, ShapeSource};
use runshape_core::{GpsBounds, RouteError};
use runshape_engine::{
    BoundsRequest, Config, GenerateRequest, RouteGenerator, ShapeCatalog, SuggestRequest,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate running routes shaped like a drawing")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit a shape to a target loop distance around a start point
    Generate(GenerateArgs),
    /// Fit a shape inside a lat/lng bounding box
    Bounds(BoundsArgs),
    /// Try several catalog shapes and return the best route
    Suggest(SuggestArgs),
    /// List catalog shape names
    Shapes,
}

#[derive(Args, Debug)]
struct ShapeArgs {
    /// Shape name from the catalog
    #[arg(long)]
    shape: Option<String>,

    /// JSON file with the shape's points
    #[arg(long)]
    points: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    shape: ShapeArgs,

    #[arg(long, allow_negative_numbers = true)]
    lat: f64,

    #[arg(long, allow_negative_numbers = true)]
    lng: f64,

    /// Target loop distance
    #[arg(long)]
    km: f64,

    /// Height to width ratio (>1 is taller and narrower)
    #[arg(long, default_value_t = 1.0)]
    aspect: f64,

    /// Rotation in degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    rotation: f64,

    /// Run local search refinement on the result
    #[arg(long)]
    refine: bool,
}

#[derive(Args, Debug)]
struct BoundsArgs {
    #[command(flatten)]
    shape: ShapeArgs,

    #[arg(long, allow_negative_numbers = true)]
    min_lat: f64,

    #[arg(long, allow_negative_numbers = true)]
    max_lat: f64,

    #[arg(long, allow_negative_numbers = true)]
    min_lng: f64,

    #[arg(long, allow_negative_numbers = true)]
    max_lng: f64,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    rotation: f64,
}

#[derive(Args, Debug)]
struct SuggestArgs {
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,

    #[arg(long, allow_negative_numbers = true)]
    lng: f64,

    #[arg(long)]
    km: f64,

    /// Height to width ratio (>1 is taller and narrower)
    #[arg(long, default_value_t = 1.0)]
    aspect: f64,

    /// Shapes to evaluate (default from config)
    #[arg(long)]
    candidates: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("runshape_engine=info,runshape_router=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let catalog = if config.shapes_path.is_some() {
        Some(Arc::new(config.load_catalog().await?))
    } else {
        None
    };

    let snapper = config.build_snapper()?;
    tracing::info!("Routing backend: {}", snapper.backend_name());
    let mut generator = RouteGenerator::from_config(snapper, &config);
    if let Some(catalog) = catalog.clone() {
        generator = generator.with_catalog(catalog);
    }

    let outcome = match cli.command {
        Command::Generate(args) => {
            let (shape_name, shape) = resolve_shape(&args.shape, catalog.as_deref())?;
            let request = GenerateRequest {
                shape_name,
                aspect_ratio: args.aspect,
                rotation_deg: args.rotation,
                refine: args.refine,
                ..GenerateRequest::new(shape, args.lat, args.lng, args.km)
            };
            generator
                .generate(request)
                .await
                .map(serde_json::to_value)
        }
        Command::Bounds(args) => {
            let (shape_name, shape) = resolve_shape(&args.shape, catalog.as_deref())?;
            let request = BoundsRequest {
                shape_name,
                shape,
                bounds: GpsBounds {
                    min_lat: args.min_lat,
                    max_lat: args.max_lat,
                    min_lng: args.min_lng,
                    max_lng: args.max_lng,
                },
                rotation_deg: args.rotation,
            };
            generator
                .generate_with_bounds(request)
                .await
                .map(serde_json::to_value)
        }
        Command::Suggest(args) => {
            let request = SuggestRequest {
                start_lat: args.lat,
                start_lng: args.lng,
                distance_km: args.km,
                aspect_ratio: args.aspect,
                num_candidates: args.candidates,
            };
            generator
                .suggest(request)
                .await
                .map(serde_json::to_value)
        }
        Command::Shapes => {
            let names = catalog.as_deref().map(ShapeCatalog::names).unwrap_or_default();
            Ok(serde_json::to_value(names))
        }
    };

    match outcome {
        Ok(value) => print_json(&value?, cli.pretty),
        Err(err) => fail(&err, cli.pretty),
    }
}

fn resolve_shape(
    args: &ShapeArgs,
    catalog: Option<&ShapeCatalog>,
) -> Result<(Option<String>, Vec<runshape_core::AbstractPoint>)> {
    ShapeSource::from_args(args.shape.clone(), args.points.clone())?.resolve(catalog)
}

fn fail(err: &RouteError, pretty: bool) -> Result<()> {
    tracing::warn!("Route generation failed: {}", err);
    print_json(&error_json(err), pretty)?;
    std::process::exit(1);
}
