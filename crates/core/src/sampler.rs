//! # Elevation Sampler
//!
//! Answers "what is the ground height at local point (x, z)?" from a built
//! terrain's grid metadata. Ordered fallback chain, cheapest check first,
//! most conservative last:
//!
//! 1. inverse-affine cell lookup + barycentric interpolation in the cell's
//!    two triangles;
//! 2. inverse-distance weighting over the nearest grid vertices (R-tree);
//! 3. if those elevations spread wider than the discontinuity threshold,
//!    the single nearest vertex instead of a bridging average;
//! 4. beyond the maximum vertex distance, `OutOfBounds` — never extrapolate.
//!
//! ## Table of Contents
//! 1. GridVertex — R-tree entry
//! 2. ElevationSampler — construction
//! 3. Fallback chain

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::config::SamplerSettings;
use crate::error::SamplingError;
use crate::terrain::GridMetadata;

// ============================================================================
// 1. GridVertex — R-tree entry
// ============================================================================

/// One terrain grid vertex in the centered mesh frame (XZ plane).
#[derive(Debug, Clone, Copy)]
struct GridVertex {
    x: f64,
    z: f64,
    elevation: f64,
}

impl RTreeObject for GridVertex {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.z])
    }
}

impl PointDistance for GridVertex {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.x - point[0];
        let dz = self.z - point[1];
        dx * dx + dz * dz
    }
}

// ============================================================================
// 2. ElevationSampler — construction
// ============================================================================

/// Read-only elevation oracle over a built terrain. Construct once per job,
/// after terrain construction; safe to share across extrusion workers.
pub struct ElevationSampler {
    grid: GridMetadata,
    tree: RTree<GridVertex>,
    settings: SamplerSettings,
}

impl ElevationSampler {
    /// Build the sampler from a terrain's grid metadata.
    pub fn new(grid: GridMetadata, settings: SamplerSettings) -> Self {
        let mut vertices = Vec::with_capacity(grid.rows * grid.cols);
        for r in 0..grid.rows {
            for c in 0..grid.cols {
                let p = grid.vertex_position(r, c);
                vertices.push(GridVertex {
                    x: p.x as f64,
                    z: p.z as f64,
                    elevation: p.y as f64,
                });
            }
        }
        let tree = RTree::bulk_load(vertices);
        tracing::debug!(
            "Elevation sampler ready: {} grid vertices indexed",
            tree.size()
        );
        Self {
            grid,
            tree,
            settings,
        }
    }

    // ========================================================================
    // 3. Fallback chain
    // ========================================================================

    /// Ground elevation in meters at centered-frame point (x, z).
    pub fn sample(&self, x: f64, z: f64) -> Result<f64, SamplingError> {
        if let Some(elevation) = self.sample_barycentric(x, z) {
            return Ok(elevation);
        }
        self.sample_nearest_vertices(x, z)
    }

    /// Strategy 1: locate the containing cell via the inverse of the grid's
    /// affine spacing and interpolate barycentrically in its two triangles.
    fn sample_barycentric(&self, x: f64, z: f64) -> Option<f64> {
        let (row_f, col_f) = self.grid.fractional_cell(x, z);
        let row = row_f.floor() as isize;
        let col = col_f.floor() as isize;
        if row < 0
            || col < 0
            || row as usize + 1 >= self.grid.rows
            || col as usize + 1 >= self.grid.cols
        {
            return None;
        }
        let (row, col) = (row as usize, col as usize);

        let corner = |r: usize, c: usize| {
            let p = self.grid.vertex_position(r, c);
            (p.x as f64, p.z as f64, p.y as f64)
        };
        let v0 = corner(row, col);
        let v1 = corner(row, col + 1);
        let v2 = corner(row + 1, col);
        let v3 = corner(row + 1, col + 1);

        // Same diagonal split as the terrain triangulation
        barycentric_elevation(x, z, v0, v1, v2)
            .or_else(|| barycentric_elevation(x, z, v1, v3, v2))
    }

    /// Strategies 2–4: nearest grid vertices via the R-tree.
    fn sample_nearest_vertices(&self, x: f64, z: f64) -> Result<f64, SamplingError> {
        let query = [x, z];
        let neighbors: Vec<&GridVertex> = self
            .tree
            .nearest_neighbor_iter(&query)
            .take(self.settings.idw_neighbors)
            .collect();
        let nearest = *neighbors.first().ok_or(SamplingError::EmptyGrid)?;

        let nearest_distance = nearest.distance_2(&query).sqrt();
        if nearest_distance > self.settings.max_vertex_distance_m {
            return Err(SamplingError::OutOfBounds {
                distance_m: nearest_distance,
                max_m: self.settings.max_vertex_distance_m,
            });
        }

        // A query sitting on a vertex is exact; it also guards the 1/d
        // weights below.
        const ON_VERTEX_EPS_M: f64 = 1e-9;
        if nearest_distance < ON_VERTEX_EPS_M {
            return Ok(nearest.elevation);
        }

        // Sharp discontinuity among the candidates (cliff, tile seam):
        // bridging them with an average would invent terrain, so take the
        // nearest vertex instead.
        let mean: f64 =
            neighbors.iter().map(|v| v.elevation).sum::<f64>() / neighbors.len() as f64;
        let variance: f64 = neighbors
            .iter()
            .map(|v| (v.elevation - mean).powi(2))
            .sum::<f64>()
            / neighbors.len() as f64;
        if variance.sqrt() > self.settings.variance_threshold_m {
            return Ok(nearest.elevation);
        }

        // Inverse-distance weighting
        let mut weight_sum = 0.0;
        let mut weighted = 0.0;
        for v in &neighbors {
            let w = 1.0 / v.distance_2(&query).sqrt();
            weight_sum += w;
            weighted += w * v.elevation;
        }
        Ok(weighted / weight_sum)
    }
}

/// Barycentric interpolation of elevation at (x, z) inside the triangle
/// (a, b, c), each given as (x, z, elevation). Returns None when the point
/// is outside (with a small tolerance for edge-sitting points).
fn barycentric_elevation(
    x: f64,
    z: f64,
    a: (f64, f64, f64),
    b: (f64, f64, f64),
    c: (f64, f64, f64),
) -> Option<f64> {
    const EDGE_EPS: f64 = 1e-9;
    let denom = (b.1 - c.1) * (a.0 - c.0) + (c.0 - b.0) * (a.1 - c.1);
    if denom.abs() < f64::EPSILON {
        return None;
    }
    let w_a = ((b.1 - c.1) * (x - c.0) + (c.0 - b.0) * (z - c.1)) / denom;
    let w_b = ((c.1 - a.1) * (x - c.0) + (a.0 - c.0) * (z - c.1)) / denom;
    let w_c = 1.0 - w_a - w_b;
    if w_a < -EDGE_EPS || w_b < -EDGE_EPS || w_c < -EDGE_EPS {
        return None;
    }
    Some(w_a * a.2 + w_b * b.2 + w_c * c.2)
}
