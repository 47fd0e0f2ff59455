//! # Mesh Buffers and Scene Assembly
//!
//! Plain triangle-list buffers shared by the terrain builder, the building
//! extruder, and the exporter, plus the scene type that keeps building
//! results index-aligned with the input footprint list.
//!
//! ## Table of Contents
//! 1. MeshBuffers — positions / indices / UVs / normals
//! 2. Vertex normal accumulation
//! 3. Compaction (duplicate vertices, degenerate faces)
//! 4. Scene — terrain + index-aligned building results
//! 5. Merging into one buffer with material groups

use glam::{Vec2, Vec3};

use crate::terrain::TerrainMesh;

// ============================================================================
// 1. MeshBuffers — positions / indices / UVs / normals
// ============================================================================

/// Indexed triangle mesh. One UV and one normal per vertex.
#[derive(Debug, Clone, Default)]
pub struct MeshBuffers {
    pub positions: Vec<Vec3>,
    /// Triangle list, three indices per face
    pub indices: Vec<u32>,
    pub uvs: Vec<Vec2>,
    pub normals: Vec<Vec3>,
}

impl MeshBuffers {
    pub fn with_capacity(vertices: usize, triangles: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(triangles * 3),
            uvs: Vec::with_capacity(vertices),
            normals: Vec::with_capacity(vertices),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Axis-aligned bounds over all vertex positions, or None when empty.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        let mut min = first;
        let mut max = first;
        for p in &self.positions {
            min = min.min(*p);
            max = max.max(*p);
        }
        Some((min, max))
    }

    // ========================================================================
    // 2. Vertex normal accumulation
    // ========================================================================

    /// Recompute smooth vertex normals by accumulating area-weighted face
    /// normals and normalizing.
    pub fn compute_vertex_normals(&mut self) {
        let mut accumulated = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let edge1 = self.positions[b] - self.positions[a];
            let edge2 = self.positions[c] - self.positions[a];
            let face_normal = edge1.cross(edge2);
            accumulated[a] += face_normal;
            accumulated[b] += face_normal;
            accumulated[c] += face_normal;
        }
        self.normals = accumulated
            .into_iter()
            .map(|n| {
                if n.length_squared() > 0.0 {
                    n.normalize()
                } else {
                    Vec3::Y
                }
            })
            .collect();
    }

    // ========================================================================
    // 3. Compaction (duplicate vertices, degenerate faces)
    // ========================================================================

    /// Drop degenerate faces (repeated indices) and merge bit-identical
    /// vertices. Bitwise comparison keeps the pass deterministic.
    pub fn compact(&mut self) {
        use std::collections::HashMap;

        let mut remap = vec![0u32; self.positions.len()];
        let mut seen: HashMap<[u32; 8], u32> = HashMap::with_capacity(self.positions.len());
        let mut positions = Vec::with_capacity(self.positions.len());
        let mut uvs = Vec::with_capacity(self.uvs.len());
        let mut normals = Vec::with_capacity(self.normals.len());

        for i in 0..self.positions.len() {
            let p = self.positions[i];
            let uv = self.uvs.get(i).copied().unwrap_or(Vec2::ZERO);
            let n = self.normals.get(i).copied().unwrap_or(Vec3::Y);
            let key = [
                p.x.to_bits(),
                p.y.to_bits(),
                p.z.to_bits(),
                uv.x.to_bits(),
                uv.y.to_bits(),
                n.x.to_bits(),
                n.y.to_bits(),
                n.z.to_bits(),
            ];
            let next = positions.len() as u32;
            let idx = *seen.entry(key).or_insert_with(|| {
                positions.push(p);
                uvs.push(uv);
                normals.push(n);
                next
            });
            remap[i] = idx;
        }

        let mut indices = Vec::with_capacity(self.indices.len());
        for tri in self.indices.chunks_exact(3) {
            let (a, b, c) = (remap[tri[0] as usize], remap[tri[1] as usize], remap[tri[2] as usize]);
            if a != b && b != c && a != c {
                indices.extend_from_slice(&[a, b, c]);
            }
        }

        self.positions = positions;
        self.uvs = uvs;
        self.normals = normals;
        self.indices = indices;
    }

    /// Append another mesh, remapping its indices by this mesh's current
    /// vertex count.
    pub fn append(&mut self, other: &MeshBuffers) {
        let offset = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.uvs.extend_from_slice(&other.uvs);
        self.normals.extend_from_slice(&other.normals);
        self.indices.extend(other.indices.iter().map(|i| i + offset));
    }
}

// ============================================================================
// 4. Scene — terrain + index-aligned building results
// ============================================================================

/// One extruded building, tagged with the footprint it came from.
#[derive(Debug, Clone)]
pub struct BuildingMesh {
    /// Index into the input footprint list
    pub footprint_index: usize,
    pub mesh: MeshBuffers,
}

/// A complete generated scene.
///
/// `buildings` is index-aligned 1:1 with the input footprint list: entry `i`
/// is `None` exactly when footprint `i` failed extrusion. The sequence is
/// never shortened.
#[derive(Debug, Clone)]
pub struct Scene {
    pub terrain: TerrainMesh,
    pub buildings: Vec<Option<BuildingMesh>>,
}

// ============================================================================
// 5. Merging into one buffer with material groups
// ============================================================================

/// Material group names emitted by the exporter.
pub const MATERIAL_TERRAIN: &str = "terrain";
pub const MATERIAL_BUILDINGS: &str = "buildings";

/// A contiguous run of triangles bound to one material.
#[derive(Debug, Clone)]
pub struct MaterialGroup {
    pub name: &'static str,
    /// First triangle of the run
    pub start_triangle: usize,
    pub triangle_count: usize,
}

/// Terrain and building buffers concatenated into one mesh, with face
/// indices remapped by each sub-mesh's cumulative vertex offset.
#[derive(Debug, Clone)]
pub struct MergedScene {
    pub buffers: MeshBuffers,
    pub groups: Vec<MaterialGroup>,
}

impl Scene {
    /// Concatenate the terrain mesh and every successful building mesh.
    pub fn merge(&self) -> MergedScene {
        let building_vertices: usize = self
            .buildings
            .iter()
            .flatten()
            .map(|b| b.mesh.vertex_count())
            .sum();
        let building_triangles: usize = self
            .buildings
            .iter()
            .flatten()
            .map(|b| b.mesh.triangle_count())
            .sum();

        let mut buffers = MeshBuffers::with_capacity(
            self.terrain.mesh.vertex_count() + building_vertices,
            self.terrain.mesh.triangle_count() + building_triangles,
        );
        buffers.append(&self.terrain.mesh);

        let mut groups = vec![MaterialGroup {
            name: MATERIAL_TERRAIN,
            start_triangle: 0,
            triangle_count: self.terrain.mesh.triangle_count(),
        }];

        if building_triangles > 0 {
            let start = buffers.triangle_count();
            for building in self.buildings.iter().flatten() {
                buffers.append(&building.mesh);
            }
            groups.push(MaterialGroup {
                name: MATERIAL_BUILDINGS,
                start_triangle: start,
                triangle_count: building_triangles,
            });
        }

        MergedScene { buffers, groups }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> MeshBuffers {
        MeshBuffers {
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
            ],
            indices: vec![0, 1, 2, 1, 3, 2],
            uvs: vec![Vec2::ZERO; 4],
            normals: vec![Vec3::Y; 4],
        }
    }

    #[test]
    fn test_flat_quad_normals_point_up() {
        let mut mesh = quad();
        mesh.normals.clear();
        mesh.compute_vertex_normals();
        for n in &mesh.normals {
            assert!((n.y - 1.0).abs() < 1e-6, "expected +y normal, got {n:?}");
        }
    }

    #[test]
    fn test_append_remaps_indices() {
        let mut a = quad();
        let b = quad();
        a.append(&b);
        assert_eq!(a.vertex_count(), 8);
        assert_eq!(a.triangle_count(), 4);
        assert_eq!(&a.indices[6..], &[4, 5, 6, 5, 7, 6]);
    }

    #[test]
    fn test_compact_merges_identical_vertices_and_drops_degenerates() {
        let mut mesh = quad();
        // Duplicate vertex 1 and reference the copy
        mesh.positions.push(mesh.positions[1]);
        mesh.uvs.push(mesh.uvs[1]);
        mesh.normals.push(mesh.normals[1]);
        mesh.indices.extend_from_slice(&[0, 4, 2]);
        // Degenerate face
        mesh.indices.extend_from_slice(&[2, 2, 3]);
        mesh.compact();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 3);
    }
}
