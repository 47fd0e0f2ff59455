// =============================================================================
// GeoMesh CLI - Headless Scene Generation Entry Point
// =============================================================================
// Table of Contents:
// 1. Imports
// 2. Arguments
// 3. Main Entry Point
// 4. Job Assembly and Output Writing
// =============================================================================

mod input;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use geomesh_core::{
    footprints_from_geojson, generate, BoundingBox, CancelToken, GenerationConfig,
    GenerationInput, Quality,
};

// -----------------------------------------------------------------------------
// 2. Arguments
// -----------------------------------------------------------------------------

/// Turn pre-fetched elevation, footprint and texture data into a textured
/// OBJ+MTL scene.
#[derive(Debug, Parser)]
#[command(name = "geomesh", version, about)]
struct Args {
    /// Geographic selection as north,south,east,west (WGS84 degrees)
    #[arg(long, value_parser = input::parse_bbox)]
    bbox: BoundingBox,

    /// Elevation raster: Terrain-RGB .png or .json rows of meters (north-up)
    #[arg(long)]
    elevation: PathBuf,

    /// Building footprints as GeoJSON (optional; terrain-only without it)
    #[arg(long)]
    buildings: Option<PathBuf>,

    /// Satellite texture (PNG or JPEG), passed through to the export
    #[arg(long)]
    texture: PathBuf,

    /// Geographic coverage of the texture, when it differs from --bbox
    #[arg(long, value_parser = input::parse_bbox)]
    texture_bbox: Option<BoundingBox>,

    /// Quality tier: low, medium, high or ultra (overrides the config file)
    #[arg(long, value_parser = parse_quality)]
    quality: Option<Quality>,

    /// TOML configuration file (all fields optional)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Base name of the exported files
    #[arg(long, default_value = "scene")]
    name: String,
}

fn parse_quality(s: &str) -> anyhow::Result<Quality> {
    match s.to_ascii_lowercase().as_str() {
        "low" => Ok(Quality::Low),
        "medium" => Ok(Quality::Medium),
        "high" => Ok(Quality::High),
        "ultra" => Ok(Quality::Ultra),
        other => bail!("unknown quality '{other}' (expected low, medium, high or ultra)"),
    }
}

// -----------------------------------------------------------------------------
// 3. Main Entry Point
// -----------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    run(args)
}

// -----------------------------------------------------------------------------
// 4. Job Assembly and Output Writing
// -----------------------------------------------------------------------------

fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(quality) = args.quality {
        config.quality = quality;
    }

    let grid = input::load_elevation(&args.elevation)?;
    tracing::info!(
        "Loaded elevation raster: {}x{} samples",
        grid.rows(),
        grid.cols()
    );

    let footprints = match &args.buildings {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading footprints {}", path.display()))?;
            footprints_from_geojson(&content)?
        }
        None => Vec::new(),
    };

    let texture_bbox = args.texture_bbox.unwrap_or(args.bbox);
    let texture = input::load_texture(&args.texture, texture_bbox)?;

    let job = GenerationInput {
        bbox: args.bbox,
        grid,
        footprints,
        texture,
        stem: args.name.clone(),
    };
    let output = generate(job, &config, &CancelToken::new())?;

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating output directory {}", args.out.display()))?;
    let export = &output.export;
    std::fs::write(args.out.join(&export.obj_name), &export.obj)?;
    std::fs::write(args.out.join(&export.mtl_name), &export.mtl)?;
    std::fs::write(args.out.join(&export.texture_name), &export.texture)?;
    let report_path = args.out.join(format!("{}.report.json", args.name));
    std::fs::write(&report_path, serde_json::to_string_pretty(&output.report)?)?;

    tracing::info!(
        "Wrote {} + {} + {} and {} ({} vertices, {} triangles, {}/{} buildings)",
        export.obj_name,
        export.mtl_name,
        export.texture_name,
        report_path.display(),
        output.report.scene_vertices,
        output.report.scene_triangles,
        output.report.buildings_generated,
        output.report.footprints_total,
    );
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<GenerationConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("parsing config {}", path.display()))
        }
        None => Ok(GenerationConfig::default()),
    }
}
