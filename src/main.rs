use std::path::{Path, PathBuf};

use campus_overlay::config::EngineConfig;
use campus_overlay::engine::OverlayEngine;
use campus_overlay::error::{ConfigError, InputError};
use campus_overlay::geometry::LngLat;
use campus_overlay::icon::TypeCatalog;
use campus_overlay::layer_set::Namespace;
use campus_overlay::memory::MemorySurface;
use campus_overlay::normalize::RawGeometryInput;
use campus_overlay::places::{PlaceDrawOptions, PlaceMode};
use campus_overlay::routes::RouteDrawOptions;
use campus_overlay::style::LayerKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum PreviewError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("invalid input document: {0}")]
    Input(#[from] InputError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid click position `{0}`; expected LNG,LAT")]
    Click(String),
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "overlay-preview", about = "Draw places or routes into a headless map surface and print the result")]
struct Cli {
    /// Seed a base-map symbol layer so overlay ordering is visible in the output.
    #[arg(long, env = "OVERLAY_PREVIEW_BASE_LABELS")]
    base_labels: bool,

    /// Click at LNG,LAT after drawing and report the emitted events.
    #[arg(long)]
    click: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Places(PlacesArgs),
    Routes(RoutesArgs),
    Scratch {
        /// GeoJSON document.
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
struct PlacesArgs {
    /// GeoJSON document.
    file: PathBuf,
    /// Type catalog: JSON array of `{ id, icon, color }`.
    #[arg(long, env = "OVERLAY_TYPE_CATALOG")]
    catalog: Option<PathBuf>,
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    #[arg(long)]
    zoom: Option<bool>,
    #[arg(long)]
    no_polygon_labels: bool,
}

#[derive(Args, Debug)]
struct RoutesArgs {
    /// GeoJSON document.
    file: PathBuf,
    #[arg(long)]
    no_fit: bool,
    #[arg(long)]
    no_endpoints: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Multi,
    Single,
}

fn read(path: &Path) -> Result<String, PreviewError> {
    std::fs::read_to_string(path).map_err(|source| PreviewError::Read { path: path.to_path_buf(), source })
}

fn load_input(path: &Path) -> Result<RawGeometryInput, PreviewError> {
    Ok(RawGeometryInput::from_text(&read(path)?)?)
}

fn parse_click(raw: &str) -> Result<LngLat, PreviewError> {
    let invalid = || PreviewError::Click(raw.to_string());
    let (lng, lat) = raw.split_once(',').ok_or_else(invalid)?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    LngLat::from_position(&[lng, lat]).ok_or_else(invalid)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), PreviewError> {
    let click = cli.click.as_deref().map(parse_click).transpose()?;
    let mut engine = OverlayEngine::new(EngineConfig::from_env()?);
    let mut surface = if cli.base_labels {
        MemorySurface::new().with_base_layers(&[("road", LayerKind::Line), ("road-label", LayerKind::Symbol)])
    } else {
        MemorySurface::new()
    };

    let status = match cli.command {
        Command::Places(args) => {
            if let Some(path) = &args.catalog {
                engine.set_catalog(TypeCatalog::from_json(&read(path)?)?);
            }
            let options = PlaceDrawOptions {
                mode: args.mode.map(|m| match m {
                    ModeArg::Multi => PlaceMode::Multi,
                    ModeArg::Single => PlaceMode::Single,
                }),
                zoom: args.zoom,
                show_polygon_labels: !args.no_polygon_labels,
            };
            engine.draw_places(&mut surface, load_input(&args.file)?, options)
        }
        Command::Routes(args) => {
            let options = RouteDrawOptions { fit: !args.no_fit, show_endpoints: !args.no_endpoints };
            engine.draw_routes(&mut surface, load_input(&args.file)?, options)
        }
        Command::Scratch { file } => engine.draw_scratch(&mut surface, load_input(&file)?),
    };
    tracing::info!(?status, "draw finished");

    let events = match click {
        Some(point) => {
            let pointer = surface.pointer_click(point);
            engine.handle_pointer_events(&mut surface, &pointer)
        }
        None => Vec::new(),
    };

    let selected: Map<String, Value> = Namespace::ALL
        .iter()
        .filter_map(|ns| engine.selected(&surface, *ns).map(|id| (ns.to_string(), Value::from(id))))
        .collect();
    let output = json!({ "surface": surface.snapshot(), "events": events, "selected": selected });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
