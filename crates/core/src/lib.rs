//! # geomesh-core
//!
//! Geospatial-to-mesh conversion engine. Takes an elevation raster, a
//! satellite texture and building footprint polygons for a small geographic
//! area and produces one metrically accurate, textured 3D scene exported as
//! Wavefront OBJ + MTL.
//!
//! ## Pipeline
//!
//! ```text
//! BoundingBox + ElevationGrid ──► TerrainMeshBuilder ──► TerrainMesh
//!                                        │
//!                                        ▼
//! BuildingFootprints ──► BuildingExtruder ◄── ElevationSampler
//!                                        │
//!                                        ▼
//!                          Scene::merge ──► export_scene ──► OBJ/MTL/texture
//! ```
//!
//! All geometry lives in a local metric frame: x east, y up, z south,
//! centered on the bounding box. One [`LocalTransformer`] per job applies
//! the projection to terrain and footprints alike.
//!
//! ## Modules
//! - [`coords`] — bounding box validation, geographic → local projection
//! - [`grid`] — elevation grid container, orientation, Gaussian smoothing
//! - [`terrain`] — grid → triangulated, UV-mapped terrain surface
//! - [`sampler`] — point elevation queries with a guarded fallback chain
//! - [`footprint`] — GeoJSON building footprint ingestion
//! - [`buildings`] — footprint extrusion into closed prisms
//! - [`mesh`] — shared triangle buffers, scene assembly, merging
//! - [`export`] — OBJ/MTL serialization with sanity bounds
//! - [`pipeline`] — end-to-end orchestration with cancellation and reporting
//! - [`config`] — quality tiers and tuning knobs
//! - [`error`] — the error taxonomy, split by recovery policy

pub mod buildings;
pub mod config;
pub mod coords;
pub mod error;
pub mod export;
pub mod footprint;
pub mod grid;
pub mod mesh;
pub mod pipeline;
pub mod sampler;
pub mod terrain;

pub use buildings::BuildingExtruder;
pub use config::{
    BuildingSettings, BuildingUvMode, GenerationConfig, HeightDefaults, Quality, QualityTier,
    SamplerSettings, TerrainSettings,
};
pub use coords::{BoundingBox, LocalTransformer, EARTH_RADIUS, MAX_BBOX_SIDE_M, MIN_BBOX_SIDE_M};
pub use error::{
    DataError, ExportError, ExtrusionError, GenerationError, InputError, SamplingError,
};
pub use export::{export_scene, SceneExport, TextureImage};
pub use footprint::{footprints_from_geojson, BuildingFootprint, GeoCoord, PolygonShape};
pub use grid::{ElevationGrid, RowOrientation};
pub use mesh::{
    BuildingMesh, MaterialGroup, MergedScene, MeshBuffers, Scene, MATERIAL_BUILDINGS,
    MATERIAL_TERRAIN,
};
pub use pipeline::{generate, CancelToken, GenerationInput, GenerationOutput, GenerationReport};
pub use sampler::ElevationSampler;
pub use terrain::{GridMetadata, TerrainMesh, TerrainMeshBuilder};
