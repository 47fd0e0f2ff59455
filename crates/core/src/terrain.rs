//! # Terrain Mesh Builder
//!
//! Turns a smoothed elevation grid into a triangulated, UV-mapped terrain
//! surface in the local coordinate frame, and retains the grid metadata the
//! elevation sampler reads for the rest of the job.
//!
//! ## Table of Contents
//! 1. GridMetadata — what survives terrain construction
//! 2. TerrainMesh
//! 3. TerrainMeshBuilder — grid → vertices → faces → UVs → centering

use glam::{Vec2, Vec3};

use crate::config::TerrainSettings;
use crate::coords::{BoundingBox, LocalTransformer};
use crate::error::{GenerationError, InputError};
use crate::grid::ElevationGrid;
use crate::mesh::MeshBuffers;

// ============================================================================
// 1. GridMetadata — what survives terrain construction
// ============================================================================

/// The regular-grid structure of a built terrain mesh.
///
/// Retained for the lifetime of the job as the sole input to the elevation
/// sampler. Elevations are row-major with row 0 at the southern edge — the
/// orientation vertex construction actually used. Positions are in the
/// centered mesh frame.
#[derive(Debug, Clone)]
pub struct GridMetadata {
    pub rows: usize,
    pub cols: usize,
    pub bbox: BoundingBox,
    /// Smoothed elevations, row-major, row 0 = southern edge
    pub elevations: Vec<f32>,
    /// x of column 0 (centered frame)
    pub origin_x: f64,
    /// z of row 0 (centered frame)
    pub origin_z: f64,
    /// x step per column (positive, eastward)
    pub step_x: f64,
    /// z step per row (negative: rows advance northward, north is −z)
    pub step_z: f64,
}

impl GridMetadata {
    /// Elevation at (row, col).
    pub fn elevation(&self, row: usize, col: usize) -> f32 {
        self.elevations[row * self.cols + col]
    }

    /// Centered-frame position of grid vertex (row, col).
    pub fn vertex_position(&self, row: usize, col: usize) -> Vec3 {
        Vec3::new(
            (self.origin_x + col as f64 * self.step_x) as f32,
            self.elevation(row, col),
            (self.origin_z + row as f64 * self.step_z) as f32,
        )
    }

    /// Fractional grid coordinates of a centered-frame point, from the
    /// inverse of the grid's affine spacing. May fall outside the grid.
    pub fn fractional_cell(&self, x: f64, z: f64) -> (f64, f64) {
        ((z - self.origin_z) / self.step_z, (x - self.origin_x) / self.step_x)
    }
}

// ============================================================================
// 2. TerrainMesh
// ============================================================================

/// Triangulated terrain surface plus the grid metadata it was built from.
#[derive(Debug, Clone)]
pub struct TerrainMesh {
    pub mesh: MeshBuffers,
    pub grid: GridMetadata,
}

// ============================================================================
// 3. TerrainMeshBuilder — grid → vertices → faces → UVs → centering
// ============================================================================

/// Builds a [`TerrainMesh`] from an elevation grid. Consumes the grid;
/// nothing else in the pipeline sees raw raster data.
pub struct TerrainMeshBuilder<'a> {
    transformer: &'a LocalTransformer,
    settings: &'a TerrainSettings,
}

impl<'a> TerrainMeshBuilder<'a> {
    pub fn new(transformer: &'a LocalTransformer, settings: &'a TerrainSettings) -> Self {
        Self {
            transformer,
            settings,
        }
    }

    /// Build the terrain surface.
    ///
    /// Invariants on the result: vertex count = rows·cols, face count =
    /// 2(rows−1)(cols−1), mean(x) = mean(z) = 0 over all vertices, y equals
    /// the smoothed input elevation at every grid point.
    pub fn build(
        &self,
        grid: ElevationGrid,
        bbox: &BoundingBox,
    ) -> Result<TerrainMesh, GenerationError> {
        if (bbox.north - bbox.south).abs() <= f64::EPSILON
            || (bbox.east - bbox.west).abs() <= f64::EPSILON
        {
            return Err(InputError::DegenerateBbox {
                width_m: bbox.width_m(),
                height_m: bbox.height_m(),
            }
            .into());
        }

        // Denoise, then establish the row orientation vertex construction
        // consumes (row 0 = southern edge).
        let mut grid = grid;
        grid.smooth(self.settings.smoothing_sigma);
        let grid = grid.flipped_south_up();

        let rows = grid.rows();
        let cols = grid.cols();
        let lat_step = (bbox.north - bbox.south) / (rows - 1) as f64;
        let lon_step = (bbox.east - bbox.west) / (cols - 1) as f64;

        let mut mesh = MeshBuffers::with_capacity(rows * cols, 2 * (rows - 1) * (cols - 1));

        // Vertices: regular lat/lon grid pushed through the shared
        // transformer, one call site per raw point.
        let mut sum_x = 0.0f64;
        let mut sum_z = 0.0f64;
        for r in 0..rows {
            let lat = bbox.south + r as f64 * lat_step;
            for c in 0..cols {
                let lon = bbox.west + c as f64 * lon_step;
                let (x, z) = self.transformer.to_local(lat, lon);
                sum_x += x;
                sum_z += z;
                mesh.positions
                    .push(Vec3::new(x as f32, grid.get(r, c), z as f32));
            }
        }

        // Faces: two triangles per cell, wound so outward normals point
        // toward +y (rows advance toward −z, columns toward +x).
        for r in 0..rows - 1 {
            for c in 0..cols - 1 {
                let v0 = (r * cols + c) as u32;
                let v1 = v0 + 1;
                let v2 = v0 + cols as u32;
                let v3 = v2 + 1;
                mesh.indices.extend_from_slice(&[v0, v1, v2]);
                mesh.indices.extend_from_slice(&[v1, v3, v2]);
            }
        }

        // Re-center: mean(x) = mean(z) = 0; y is never shifted.
        let n = (rows * cols) as f64;
        let mean_x = sum_x / n;
        let mean_z = sum_z / n;
        for p in &mut mesh.positions {
            p.x -= mean_x as f32;
            p.z -= mean_z as f32;
        }

        // Planar UVs from the mesh's own x/z bounds; texture is applied
        // top-down, ignoring elevation. v runs south → north so the image's
        // bottom edge lands on the bbox's southern edge.
        // Grid construction guarantees at least 2x2 vertices
        let (min, max) = mesh.bounds().unwrap_or((Vec3::ZERO, Vec3::ONE));
        let range_x = (max.x - min.x).max(f32::EPSILON);
        let range_z = (max.z - min.z).max(f32::EPSILON);
        mesh.uvs = mesh
            .positions
            .iter()
            .map(|p| Vec2::new((p.x - min.x) / range_x, (max.z - p.z) / range_z))
            .collect();

        mesh.compute_vertex_normals();

        // Affine spacing in the centered frame, for the sampler's inverse
        // lookup. Exact under the equirectangular projection.
        let (x0, z0) = self.transformer.to_local(bbox.south, bbox.west);
        let (x1, _) = self.transformer.to_local(bbox.south, bbox.west + lon_step);
        let (_, z1) = self.transformer.to_local(bbox.south + lat_step, bbox.west);

        let grid_meta = GridMetadata {
            rows,
            cols,
            bbox: *bbox,
            elevations: grid.values().to_vec(),
            origin_x: x0 - mean_x,
            origin_z: z0 - mean_z,
            step_x: x1 - x0,
            step_z: z1 - z0,
        };

        tracing::info!(
            "Built terrain mesh: {}x{} grid, {} vertices, {} triangles, {:.0}x{:.0} m",
            rows,
            cols,
            mesh.vertex_count(),
            mesh.triangle_count(),
            bbox.width_m(),
            bbox.height_m(),
        );

        Ok(TerrainMesh {
            mesh,
            grid: grid_meta,
        })
    }
}
