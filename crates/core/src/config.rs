//! # Generation Configuration
//!
//! Explicit configuration objects passed into the pipeline — no ambient
//! global state. Defaults mirror what the upstream service ships.
//!
//! ## Table of Contents
//! 1. Quality — enumerated quality tiers
//! 2. TerrainSettings — smoothing parameters
//! 3. SamplerSettings — elevation fallback-chain thresholds
//! 4. BuildingSettings — height estimation and UV mode
//! 5. GenerationConfig — top-level bundle

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// 1. Quality — enumerated quality tiers
// ============================================================================

/// Quality tier selecting terrain resolution and texture size. Consumed as
/// configuration; the fetchers upstream decide what to download from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

/// Resolved parameters for one quality tier.
#[derive(Debug, Clone, Copy)]
pub struct QualityTier {
    /// Raster tile zoom level the elevation fetcher uses
    pub raster_zoom: u8,
    /// Approximate ground resolution of the elevation raster (meters/pixel)
    pub resolution_m: f32,
    /// Satellite texture size (pixels per side)
    pub texture_px: u32,
    /// Sanity bound: maximum vertices in the merged scene
    pub max_scene_vertices: usize,
    /// Sanity bound: maximum serialized OBJ size in bytes
    pub max_obj_bytes: usize,
}

impl Quality {
    /// The enumerated tier table.
    pub fn tier(&self) -> QualityTier {
        match self {
            Quality::Low => QualityTier {
                raster_zoom: 12,
                resolution_m: 38.2,
                texture_px: 512,
                max_scene_vertices: 300_000,
                max_obj_bytes: 64 << 20,
            },
            Quality::Medium => QualityTier {
                raster_zoom: 13,
                resolution_m: 19.1,
                texture_px: 1024,
                max_scene_vertices: 800_000,
                max_obj_bytes: 128 << 20,
            },
            Quality::High => QualityTier {
                raster_zoom: 14,
                resolution_m: 9.6,
                texture_px: 2048,
                max_scene_vertices: 2_000_000,
                max_obj_bytes: 256 << 20,
            },
            Quality::Ultra => QualityTier {
                raster_zoom: 15,
                resolution_m: 4.8,
                texture_px: 4096,
                max_scene_vertices: 6_000_000,
                max_obj_bytes: 512 << 20,
            },
        }
    }

    /// Stable name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
            Quality::Ultra => "ultra",
        }
    }
}

// ============================================================================
// 2. TerrainSettings — smoothing parameters
// ============================================================================

/// Terrain construction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainSettings {
    /// Gaussian kernel width for elevation denoising, in grid cells.
    /// Typical range 1.5–3.0; 0 disables smoothing.
    #[serde(default = "default_sigma")]
    pub smoothing_sigma: f32,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            smoothing_sigma: default_sigma(),
        }
    }
}

fn default_sigma() -> f32 {
    1.5
}

// ============================================================================
// 3. SamplerSettings — elevation fallback-chain thresholds
// ============================================================================

/// Named thresholds for the elevation fallback chain (barycentric → IDW →
/// nearest vertex → out of bounds). Kept as configuration, not inline
/// literals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplerSettings {
    /// Neighbor count for inverse-distance-weighted interpolation
    #[serde(default = "default_idw_neighbors")]
    pub idw_neighbors: usize,
    /// Elevation spread (standard deviation, meters) above which the IDW
    /// average would bridge a real discontinuity and is discarded
    #[serde(default = "default_variance_threshold")]
    pub variance_threshold_m: f64,
    /// Maximum distance from the nearest grid vertex before a query is
    /// answered with `OutOfBounds` instead of extrapolating
    #[serde(default = "default_max_vertex_distance")]
    pub max_vertex_distance_m: f64,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            idw_neighbors: default_idw_neighbors(),
            variance_threshold_m: default_variance_threshold(),
            max_vertex_distance_m: default_max_vertex_distance(),
        }
    }
}

fn default_idw_neighbors() -> usize {
    16
}
fn default_variance_threshold() -> f64 {
    15.0
}
fn default_max_vertex_distance() -> f64 {
    50.0
}

// ============================================================================
// 4. BuildingSettings — height estimation and UV mode
// ============================================================================

/// UV generation mode for extruded buildings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BuildingUvMode {
    /// Every vertex maps to one fixed texel — uniform solid color, cheap.
    #[default]
    FlatTexel,
    /// Roof mapped top-down in world units, walls tiled at a fixed density
    /// for a repeating material look.
    BoxProjection,
}

/// Building extrusion parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingSettings {
    /// UV mode for building meshes
    #[serde(default)]
    pub uv_mode: BuildingUvMode,
    /// Assumed floor height when only a level count is known
    #[serde(default = "default_meters_per_level")]
    pub meters_per_level: f64,
    /// Default heights by OSM building type, used when neither an explicit
    /// height nor a level count is present
    #[serde(default)]
    pub height_defaults: HeightDefaults,
    /// Outer rings enclosing less area than this are dropped as degenerate
    #[serde(default = "default_min_footprint_area")]
    pub min_footprint_area_m2: f64,
    /// Wall tiling density for box projection (UV units per meter)
    #[serde(default = "default_wall_uv_per_meter")]
    pub wall_uv_per_meter: f32,
}

impl Default for BuildingSettings {
    fn default() -> Self {
        Self {
            uv_mode: BuildingUvMode::default(),
            meters_per_level: default_meters_per_level(),
            height_defaults: HeightDefaults::default(),
            min_footprint_area_m2: default_min_footprint_area(),
            wall_uv_per_meter: default_wall_uv_per_meter(),
        }
    }
}

fn default_meters_per_level() -> f64 {
    3.5
}
fn default_min_footprint_area() -> f64 {
    1.0
}
fn default_wall_uv_per_meter() -> f32 {
    0.2
}

/// Per-building-type height defaults in meters. BTreeMap so lookups and
/// serialized form stay deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightDefaults {
    #[serde(default = "default_height_table")]
    pub table: BTreeMap<String, f64>,
    /// Height used for unknown building types
    #[serde(default = "default_fallback_height")]
    pub fallback_m: f64,
}

impl Default for HeightDefaults {
    fn default() -> Self {
        Self {
            table: default_height_table(),
            fallback_m: default_fallback_height(),
        }
    }
}

impl HeightDefaults {
    /// Height for a building type, or the fallback when unknown.
    pub fn height_for(&self, building_type: &str) -> f64 {
        self.table
            .get(building_type)
            .copied()
            .unwrap_or(self.fallback_m)
    }
}

fn default_height_table() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("residential".to_string(), 8.0),
        ("house".to_string(), 6.0),
        ("apartments".to_string(), 20.0),
        ("commercial".to_string(), 15.0),
        ("industrial".to_string(), 12.0),
        ("retail".to_string(), 8.0),
        ("office".to_string(), 25.0),
    ])
}

fn default_fallback_height() -> f64 {
    10.0
}

// ============================================================================
// 5. GenerationConfig — top-level bundle
// ============================================================================

/// All configuration for one generation job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub terrain: TerrainSettings,
    #[serde(default)]
    pub sampler: SamplerSettings,
    #[serde(default)]
    pub buildings: BuildingSettings,
}
