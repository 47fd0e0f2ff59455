//! # Building Extruder
//!
//! Turns footprint polygons + height metadata + sampled ground elevation
//! into closed building prisms. Rings are projected through the same
//! transformer the terrain used, repaired, triangulated with earcut (holes
//! supported), and extruded along +y from the sampled base elevation.
//!
//! Any failure is local to one footprint: the caller records the reason and
//! keeps a `None` at that index.
//!
//! ## Table of Contents
//! 1. BuildingExtruder
//! 2. Ring projection and repair
//! 3. Height estimation
//! 4. Prism construction (caps + walls, two UV modes)

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, Centroid};
use glam::{DVec2, Vec2, Vec3};

use crate::config::{BuildingSettings, BuildingUvMode};
use crate::coords::LocalTransformer;
use crate::error::ExtrusionError;
use crate::footprint::{BuildingFootprint, GeoCoord, PolygonShape};
use crate::mesh::{BuildingMesh, MeshBuffers};
use crate::sampler::ElevationSampler;

/// Final height clamp. OSM metadata occasionally claims absurd values.
const MIN_BUILDING_HEIGHT_M: f64 = 1.0;
const MAX_BUILDING_HEIGHT_M: f64 = 500.0;

/// Consecutive ring points closer than this collapse into one.
const DUPLICATE_POINT_EPS_M: f64 = 1e-6;

/// UV of the single texel flat-shaded buildings map to.
const FLAT_TEXEL_UV: Vec2 = Vec2::new(0.5, 0.5);

// ============================================================================
// 1. BuildingExtruder
// ============================================================================

/// Extrudes footprints against a built terrain. Read-only over shared state;
/// safe to call from parallel workers in any order.
pub struct BuildingExtruder<'a> {
    transformer: &'a LocalTransformer,
    sampler: &'a ElevationSampler,
    settings: &'a BuildingSettings,
}

/// A footprint shape projected to the centered local frame.
/// rings[0] is the outer ring; the rest are holes.
struct LocalShape {
    rings: Vec<Vec<DVec2>>,
}

impl<'a> BuildingExtruder<'a> {
    pub fn new(
        transformer: &'a LocalTransformer,
        sampler: &'a ElevationSampler,
        settings: &'a BuildingSettings,
    ) -> Self {
        Self {
            transformer,
            sampler,
            settings,
        }
    }

    /// Extrude one footprint into a closed prism sitting on the terrain.
    pub fn extrude(
        &self,
        footprint_index: usize,
        footprint: &BuildingFootprint,
    ) -> Result<BuildingMesh, ExtrusionError> {
        if footprint.shapes.is_empty() {
            return Err(ExtrusionError::EmptyFootprint);
        }

        // Project + repair every shape. Collapsed outer rings are dropped
        // and the footprint fails only when nothing survives; a
        // self-intersecting ring fails the footprint outright, since the
        // outline itself is broken data, not a sliver.
        let mut shapes = Vec::with_capacity(footprint.shapes.len());
        let mut largest_rejected_area = 0.0f64;
        for shape in &footprint.shapes {
            match self.project_and_repair(shape) {
                Ok(local) => shapes.push(local),
                Err(ExtrusionError::DegenerateFootprint { area_m2 }) => {
                    largest_rejected_area = largest_rejected_area.max(area_m2)
                }
                Err(e) => return Err(e),
            }
        }
        if shapes.is_empty() {
            return Err(ExtrusionError::DegenerateFootprint {
                area_m2: largest_rejected_area,
            });
        }

        let height = self.estimate_height(footprint);

        // Base elevation at the footprint centroid. OutOfBounds fails this
        // footprint; defaulting to 0 would silently float or bury it.
        let centroid =
            multi_shape_centroid(&shapes).ok_or(ExtrusionError::DegenerateFootprint {
                area_m2: largest_rejected_area,
            })?;
        let base = self.sampler.sample(centroid.x, centroid.y)?;

        let mut mesh = MeshBuffers::default();
        for shape in &shapes {
            extrude_shape(
                shape,
                base,
                height,
                self.settings.uv_mode,
                self.settings.wall_uv_per_meter,
                &mut mesh,
            )?;
        }
        mesh.compute_vertex_normals();

        Ok(BuildingMesh {
            footprint_index,
            mesh,
        })
    }

    // ========================================================================
    // 2. Ring projection and repair
    // ========================================================================

    /// Project all rings of a shape and repair their geometry: drop
    /// duplicate and closing points, gate on enclosed area, reject crossing
    /// edges, normalize winding.
    fn project_and_repair(&self, shape: &PolygonShape) -> Result<LocalShape, ExtrusionError> {
        let project = |ring: &[GeoCoord]| -> Vec<DVec2> {
            let projected: Vec<DVec2> = ring
                .iter()
                .map(|c| {
                    let (x, z) = self.transformer.to_local(c.lat, c.lon);
                    DVec2::new(x, z)
                })
                .collect();
            clean_ring(projected)
        };

        let outer = project(&shape.outer);
        if outer.len() < 3 {
            return Err(ExtrusionError::DegenerateFootprint { area_m2: 0.0 });
        }
        let area = ring_polygon(&outer).unsigned_area();
        if area < self.settings.min_footprint_area_m2 {
            return Err(ExtrusionError::DegenerateFootprint { area_m2: area });
        }
        // Crossing edges survive dedup and the area gate (an asymmetric
        // bowtie still encloses net area) and would extrude into a
        // non-manifold prism; earcut happily triangulates them.
        if ring_self_intersects(&outer) {
            return Err(ExtrusionError::SelfIntersecting);
        }

        let mut rings = Vec::with_capacity(1 + shape.holes.len());
        // Winding invariant the wall generator relies on: outer rings run
        // counter-clockwise seen from above, holes clockwise.
        rings.push(oriented(outer, true));
        for hole in &shape.holes {
            let cleaned = project(hole);
            if cleaned.len() < 3 {
                continue;
            }
            if ring_self_intersects(&cleaned) {
                return Err(ExtrusionError::SelfIntersecting);
            }
            rings.push(oriented(cleaned, false));
        }
        Ok(LocalShape { rings })
    }

    // ========================================================================
    // 3. Height estimation
    // ========================================================================

    /// Height priority: explicit `height` tag, then levels × floor height,
    /// then the building-type default table.
    fn estimate_height(&self, footprint: &BuildingFootprint) -> f64 {
        let estimated = footprint
            .height_m
            .or_else(|| {
                footprint
                    .levels
                    .map(|levels| levels * self.settings.meters_per_level)
            })
            .unwrap_or_else(|| {
                let kind = footprint.building_type.as_deref().unwrap_or("");
                self.settings.height_defaults.height_for(kind)
            });
        estimated.clamp(MIN_BUILDING_HEIGHT_M, MAX_BUILDING_HEIGHT_M)
    }
}

/// Drop consecutive duplicate points and an explicit closing point.
fn clean_ring(points: Vec<DVec2>) -> Vec<DVec2> {
    let eps2 = DUPLICATE_POINT_EPS_M * DUPLICATE_POINT_EPS_M;
    let mut cleaned: Vec<DVec2> = Vec::with_capacity(points.len());
    for p in points {
        if cleaned
            .last()
            .map_or(true, |last| last.distance_squared(p) > eps2)
        {
            cleaned.push(p);
        }
    }
    while cleaned.len() > 1 {
        let first = cleaned[0];
        let last = cleaned[cleaned.len() - 1];
        if first.distance_squared(last) <= eps2 {
            cleaned.pop();
        } else {
            break;
        }
    }
    cleaned
}

/// Signed area in the XZ plane. Negative means counter-clockwise when seen
/// from above.
fn signed_area_xz(ring: &[DVec2]) -> f64 {
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum * 0.5
}

/// Enforce winding: counter-clockwise from above for outer rings, the
/// opposite for holes.
fn oriented(mut ring: Vec<DVec2>, ccw_from_above: bool) -> Vec<DVec2> {
    let is_ccw = signed_area_xz(&ring) < 0.0;
    if is_ccw != ccw_from_above {
        ring.reverse();
    }
    ring
}

/// Whether any two non-adjacent ring edges intersect. Quadratic over the
/// edge pairs, which is fine at footprint sizes; proper crossings and
/// collinear overlaps both count, shared endpoints of adjacent edges do not.
fn ring_self_intersects(ring: &[DVec2]) -> bool {
    let n = ring.len();
    let edge = |i: usize| {
        geo::Line::new(
            geo::Coord { x: ring[i].x, y: ring[i].y },
            geo::Coord {
                x: ring[(i + 1) % n].x,
                y: ring[(i + 1) % n].y,
            },
        )
    };
    for i in 0..n {
        for j in (i + 1)..n {
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            match line_intersection(edge(i), edge(j)) {
                Some(LineIntersection::SinglePoint { is_proper: true, .. }) => return true,
                Some(LineIntersection::Collinear { .. }) => return true,
                _ => {}
            }
        }
    }
    false
}

/// geo polygon over one ring, for area and centroid queries.
fn ring_polygon(ring: &[DVec2]) -> geo::Polygon<f64> {
    let coords: Vec<geo::Coord<f64>> =
        ring.iter().map(|p| geo::Coord { x: p.x, y: p.y }).collect();
    geo::Polygon::new(geo::LineString::from(coords), vec![])
}

/// 2D centroid of the (possibly multi-ring) footprint, holes respected.
fn multi_shape_centroid(shapes: &[LocalShape]) -> Option<DVec2> {
    let to_coords = |ring: &Vec<DVec2>| -> Vec<geo::Coord<f64>> {
        ring.iter().map(|p| geo::Coord { x: p.x, y: p.y }).collect()
    };
    let polygons: Vec<geo::Polygon<f64>> = shapes
        .iter()
        .map(|s| {
            geo::Polygon::new(
                geo::LineString::from(to_coords(&s.rings[0])),
                s.rings[1..]
                    .iter()
                    .map(|r| geo::LineString::from(to_coords(r)))
                    .collect(),
            )
        })
        .collect();
    geo::MultiPolygon::new(polygons)
        .centroid()
        .map(|p| DVec2::new(p.x(), p.y()))
}

// ============================================================================
// 4. Prism construction (caps + walls, two UV modes)
// ============================================================================

/// y component of the cross product of the triangle's edges in the XZ plane.
/// Positive means the triangle faces up.
fn cap_cross_y(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    let e1 = b - a;
    let e2 = c - a;
    e1.y * e2.x - e1.x * e2.y
}

/// Append one shape's prism (roof, floor, walls) to `mesh`. Normals are
/// placeholders; the caller recomputes them once all shapes are in.
fn extrude_shape(
    shape: &LocalShape,
    base: f64,
    height: f64,
    uv_mode: BuildingUvMode,
    wall_uv_per_meter: f32,
    mesh: &mut MeshBuffers,
) -> Result<(), ExtrusionError> {
    // Flatten rings for earcut: [x0, z0, x1, z1, ...] with hole start indices.
    let mut flat: Vec<f64> = Vec::new();
    let mut hole_starts: Vec<usize> = Vec::new();
    let mut ring_ranges: Vec<(usize, usize)> = Vec::new();
    for (i, ring) in shape.rings.iter().enumerate() {
        let start = flat.len() / 2;
        if i > 0 {
            hole_starts.push(start);
        }
        for p in ring {
            flat.push(p.x);
            flat.push(p.y);
        }
        ring_ranges.push((start, start + ring.len()));
    }
    let point_count = flat.len() / 2;

    let cap_triangles = earcutr::earcut(&flat, &hole_starts, 2)
        .map_err(|e| ExtrusionError::Triangulation(format!("{e:?}")))?;
    if cap_triangles.is_empty() {
        return Err(ExtrusionError::Triangulation(
            "no triangles produced (sliver or self-intersecting outline)".to_string(),
        ));
    }

    let bottom = base as f32;
    let top = (base + height) as f32;
    let point_at = |i: usize| DVec2::new(flat[2 * i], flat[2 * i + 1]);

    // Roof UV origin for box projection (top-down, world units)
    let mut uv_origin = DVec2::splat(f64::MAX);
    for i in 0..point_count {
        uv_origin = uv_origin.min(point_at(i));
    }
    let cap_uv = |p: DVec2| -> Vec2 {
        match uv_mode {
            BuildingUvMode::FlatTexel => FLAT_TEXEL_UV,
            BuildingUvMode::BoxProjection => {
                Vec2::new((p.x - uv_origin.x) as f32, (p.y - uv_origin.y) as f32)
            }
        }
    };

    // Cap vertices: all bottom ring points, then all top ring points.
    let cap_offset = mesh.vertex_count() as u32;
    let top_offset = cap_offset + point_count as u32;
    for y in [bottom, top] {
        for i in 0..point_count {
            let p = point_at(i);
            mesh.positions.push(Vec3::new(p.x as f32, y, p.y as f32));
            mesh.uvs.push(cap_uv(p));
            mesh.normals.push(Vec3::Y);
        }
    }

    // Roof faces up, floor faces down. Earcut's output winding follows the
    // input winding, so orient each triangle explicitly.
    for tri in cap_triangles.chunks_exact(3) {
        let (a, b, c) = (tri[0] as u32, tri[1] as u32, tri[2] as u32);
        let faces_up = cap_cross_y(point_at(tri[0]), point_at(tri[1]), point_at(tri[2])) > 0.0;
        let (roof, floor) = if faces_up {
            ([a, b, c], [a, c, b])
        } else {
            ([a, c, b], [a, b, c])
        };
        mesh.indices.extend(roof.iter().map(|i| top_offset + i));
        mesh.indices.extend(floor.iter().map(|i| cap_offset + i));
    }

    // Walls: one quad per ring edge with dedicated vertices, so box
    // projection can carry accumulated-perimeter UVs and walls stay
    // flat-shaded after normal recomputation. Ring windings were normalized
    // above; this corner order always faces outward from the solid.
    for &(start, end) in &ring_ranges {
        let ring_len = end - start;
        let mut travelled = 0.0f64;
        for i in 0..ring_len {
            let a = point_at(start + i);
            let b = point_at(start + (i + 1) % ring_len);
            let edge_len = a.distance(b);

            let (uv_a, uv_b, v_bottom, v_top) = match uv_mode {
                BuildingUvMode::FlatTexel => (
                    FLAT_TEXEL_UV.x,
                    FLAT_TEXEL_UV.x,
                    FLAT_TEXEL_UV.y,
                    FLAT_TEXEL_UV.y,
                ),
                BuildingUvMode::BoxProjection => (
                    (travelled * wall_uv_per_meter as f64) as f32,
                    ((travelled + edge_len) * wall_uv_per_meter as f64) as f32,
                    0.0,
                    (height * wall_uv_per_meter as f64) as f32,
                ),
            };
            travelled += edge_len;

            let quad = mesh.vertex_count() as u32;
            mesh.positions.push(Vec3::new(a.x as f32, bottom, a.y as f32));
            mesh.positions.push(Vec3::new(b.x as f32, bottom, b.y as f32));
            mesh.positions.push(Vec3::new(b.x as f32, top, b.y as f32));
            mesh.positions.push(Vec3::new(a.x as f32, top, a.y as f32));
            mesh.uvs.push(Vec2::new(uv_a, v_bottom));
            mesh.uvs.push(Vec2::new(uv_b, v_bottom));
            mesh.uvs.push(Vec2::new(uv_b, v_top));
            mesh.uvs.push(Vec2::new(uv_a, v_top));
            for _ in 0..4 {
                mesh.normals.push(Vec3::Y);
            }
            mesh.indices.extend_from_slice(&[quad, quad + 1, quad + 2]);
            mesh.indices.extend_from_slice(&[quad, quad + 2, quad + 3]);
        }
    }

    Ok(())
}
