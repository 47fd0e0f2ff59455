//! # Generation Pipeline
//!
//! Orchestrates one job end to end: validate inputs, build the terrain,
//! stand up the elevation sampler, extrude every footprint in parallel,
//! merge, export. Per-building failures never abort the job; they become
//! `None` entries and per-reason statistics in the report.
//!
//! ## Table of Contents
//! 1. GenerationInput / CancelToken
//! 2. GenerationReport
//! 3. generate — the pipeline

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::buildings::BuildingExtruder;
use crate::config::GenerationConfig;
use crate::coords::{BoundingBox, LocalTransformer};
use crate::error::{ExtrusionError, GenerationError};
use crate::export::{export_scene, SceneExport, TextureImage};
use crate::footprint::BuildingFootprint;
use crate::grid::ElevationGrid;
use crate::mesh::{BuildingMesh, Scene};
use crate::sampler::ElevationSampler;
use crate::terrain::TerrainMeshBuilder;

// ============================================================================
// 1. GenerationInput / CancelToken
// ============================================================================

/// Everything one generation job consumes. The fetch layer upstream fills
/// this in; the pipeline itself never touches the network.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub bbox: BoundingBox,
    pub grid: ElevationGrid,
    pub footprints: Vec<BuildingFootprint>,
    pub texture: TextureImage,
    /// Base name for the exported files (`{stem}.obj` and friends)
    pub stem: String,
}

/// Cooperative cancellation flag, checked between pipeline phases. Cloning
/// shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

// ============================================================================
// 2. GenerationReport
// ============================================================================

/// What happened during one job, in numbers. Per-reason failure counts use
/// the stable labels from [`ExtrusionError::reason`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub footprints_total: usize,
    pub buildings_generated: usize,
    pub buildings_failed: usize,
    pub failure_reasons: BTreeMap<&'static str, usize>,
    pub scene_vertices: usize,
    pub scene_triangles: usize,
}

/// A finished job: the scene (for library callers), the serialized export,
/// and the statistics report.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub scene: Scene,
    pub export: SceneExport,
    pub report: GenerationReport,
}

// ============================================================================
// 3. generate — the pipeline
// ============================================================================

/// Run one generation job.
///
/// The building result sequence stays index-aligned 1:1 with the input
/// footprint list: footprint `i` either produced building `i` or a recorded
/// failure, never a silent gap.
pub fn generate(
    input: GenerationInput,
    config: &GenerationConfig,
    cancel: &CancelToken,
) -> Result<GenerationOutput, GenerationError> {
    input.bbox.validate()?;
    input.texture.validate_for(&input.bbox)?;
    if cancel.is_cancelled() {
        return Err(GenerationError::Cancelled);
    }

    tracing::info!(
        "Starting generation: bbox {:.0}x{:.0} m, {} footprints, quality {}",
        input.bbox.width_m(),
        input.bbox.height_m(),
        input.footprints.len(),
        config.quality.name()
    );

    let transformer = LocalTransformer::new(&input.bbox);
    let terrain = TerrainMeshBuilder::new(&transformer, &config.terrain)
        .build(input.grid, &input.bbox)?;
    if cancel.is_cancelled() {
        return Err(GenerationError::Cancelled);
    }

    let sampler = ElevationSampler::new(terrain.grid.clone(), config.sampler);
    let extruder = BuildingExtruder::new(&transformer, &sampler, &config.buildings);

    // Parallel extrusion. par_iter + collect preserves input order, which is
    // what keeps the result sequence index-aligned.
    let results: Vec<Result<BuildingMesh, ExtrusionError>> = input
        .footprints
        .par_iter()
        .enumerate()
        .map(|(i, footprint)| extruder.extrude(i, footprint))
        .collect();
    if cancel.is_cancelled() {
        return Err(GenerationError::Cancelled);
    }

    let mut report = GenerationReport {
        footprints_total: input.footprints.len(),
        ..Default::default()
    };
    let mut buildings = Vec::with_capacity(results.len());
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(building) => {
                report.buildings_generated += 1;
                buildings.push(Some(building));
            }
            Err(e) => {
                tracing::debug!("Footprint {i} failed extrusion: {e}");
                report.buildings_failed += 1;
                *report.failure_reasons.entry(e.reason()).or_insert(0) += 1;
                buildings.push(None);
            }
        }
    }
    tracing::info!(
        "Extruded {}/{} buildings ({} failed: {:?})",
        report.buildings_generated,
        report.footprints_total,
        report.buildings_failed,
        report.failure_reasons
    );

    let scene = Scene { terrain, buildings };
    let mut merged = scene.merge();
    let before = merged.buffers.vertex_count();
    merged.buffers.compact();
    tracing::debug!(
        "Compacted merged scene: {} -> {} vertices",
        before,
        merged.buffers.vertex_count()
    );
    report.scene_vertices = merged.buffers.vertex_count();
    report.scene_triangles = merged.buffers.triangle_count();

    let export = export_scene(&merged, &input.texture, config.quality, &input.stem)?;

    Ok(GenerationOutput {
        scene,
        export,
        report,
    })
}
