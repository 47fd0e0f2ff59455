//! # Scene Export
//!
//! Serializes a merged scene to Wavefront OBJ + MTL with the satellite
//! texture carried alongside. The OBJ references the MTL by name, the MTL
//! references the texture by name; the caller writes all three next to each
//! other.
//!
//! Deliberately conservative: sanity bounds run before and after
//! serialization so a corrupted or runaway scene fails loudly instead of
//! producing a broken download.
//!
//! ## Table of Contents
//! 1. TextureImage — encoded texture + geodetic coverage
//! 2. SceneExport — the deliverable triple
//! 3. export_scene — sanity checks, OBJ writer, MTL writer

use std::fmt::Write as _;

use crate::config::Quality;
use crate::coords::BoundingBox;
use crate::error::{DataError, ExportError};
use crate::mesh::{MergedScene, MATERIAL_BUILDINGS, MATERIAL_TERRAIN};

/// Decimal places for vertex data. Six digits keep sub-millimeter precision
/// at the scene scales the bbox validation allows.
const OBJ_PRECISION: usize = 6;

// ============================================================================
// 1. TextureImage — encoded texture + geodetic coverage
// ============================================================================

/// An encoded satellite image (PNG or JPEG bytes, exactly as fetched) and
/// the geodetic rectangle it covers. Never re-encoded; the bytes pass
/// through to the output untouched.
#[derive(Debug, Clone)]
pub struct TextureImage {
    pub bytes: Vec<u8>,
    pub bbox: BoundingBox,
}

impl TextureImage {
    /// Check that the texture covers the terrain bbox and that the bytes
    /// decode as an image. Runs before any mesh work so bad input fails in
    /// milliseconds, not after a full terrain build.
    pub fn validate_for(&self, terrain_bbox: &BoundingBox) -> Result<(), DataError> {
        if !self.bbox.covers(terrain_bbox) {
            return Err(DataError::TextureCoverage);
        }
        let format = image::guess_format(&self.bytes)
            .map_err(|e| DataError::TextureDecode(e.to_string()))?;
        let (width, height) = image::load_from_memory(&self.bytes)
            .map(|img| (img.width(), img.height()))
            .map_err(|e| DataError::TextureDecode(e.to_string()))?;
        tracing::debug!(
            "Texture validated: {:?}, {}x{} px, {} bytes",
            format,
            width,
            height,
            self.bytes.len()
        );
        Ok(())
    }

    /// File extension matching the encoded format, for the map_Kd reference.
    pub fn file_extension(&self) -> &'static str {
        match image::guess_format(&self.bytes) {
            Ok(image::ImageFormat::Jpeg) => "jpg",
            _ => "png",
        }
    }
}

// ============================================================================
// 2. SceneExport — the deliverable triple
// ============================================================================

/// The serialized scene: three files the caller writes side by side.
#[derive(Debug, Clone)]
pub struct SceneExport {
    pub obj_name: String,
    pub obj: String,
    pub mtl_name: String,
    pub mtl: String,
    pub texture_name: String,
    pub texture: Vec<u8>,
}

// ============================================================================
// 3. export_scene — sanity checks, OBJ writer, MTL writer
// ============================================================================

/// Serialize a merged scene as `{stem}.obj` / `{stem}.mtl` / `{stem}.{ext}`.
pub fn export_scene(
    merged: &MergedScene,
    texture: &TextureImage,
    quality: Quality,
    stem: &str,
) -> Result<SceneExport, ExportError> {
    let buffers = &merged.buffers;
    if buffers.vertex_count() == 0 || buffers.triangle_count() == 0 {
        return Err(ExportError::EmptyScene);
    }
    check_buffer_consistency(merged)?;

    let tier = quality.tier();
    if buffers.vertex_count() > tier.max_scene_vertices {
        return Err(ExportError::VertexBudgetExceeded {
            count: buffers.vertex_count(),
            max: tier.max_scene_vertices,
            quality: quality.name(),
        });
    }

    let mtl_name = format!("{stem}.mtl");
    let texture_name = format!("{stem}.{}", texture.file_extension());
    let obj = write_obj(merged, &mtl_name);

    if obj.len() > tier.max_obj_bytes {
        return Err(ExportError::OutputTooLarge {
            bytes: obj.len(),
            max: tier.max_obj_bytes,
            quality: quality.name(),
        });
    }

    tracing::info!(
        "Exported scene: {} vertices, {} triangles, {} material groups, {} OBJ bytes",
        buffers.vertex_count(),
        buffers.triangle_count(),
        merged.groups.len(),
        obj.len()
    );

    Ok(SceneExport {
        obj_name: format!("{stem}.obj"),
        obj,
        mtl_name,
        mtl: write_mtl(&texture_name),
        texture_name,
        texture: texture.bytes.clone(),
    })
}

/// Positions, UVs, normals and indices must agree before serialization;
/// an OBJ with dangling `f` references loads differently in every viewer.
fn check_buffer_consistency(merged: &MergedScene) -> Result<(), ExportError> {
    let buffers = &merged.buffers;
    let vertices = buffers.vertex_count();
    if buffers.uvs.len() != vertices || buffers.normals.len() != vertices {
        return Err(ExportError::InconsistentBuffers(format!(
            "{} positions, {} uvs, {} normals",
            vertices,
            buffers.uvs.len(),
            buffers.normals.len()
        )));
    }
    if let Some(&out_of_range) = buffers.indices.iter().find(|&&i| i as usize >= vertices) {
        return Err(ExportError::InconsistentBuffers(format!(
            "face index {out_of_range} out of range for {vertices} vertices"
        )));
    }
    let triangles = buffers.triangle_count();
    let grouped: usize = merged.groups.iter().map(|g| g.triangle_count).sum();
    if grouped != triangles {
        return Err(ExportError::InconsistentBuffers(format!(
            "material groups cover {grouped} of {triangles} triangles"
        )));
    }
    Ok(())
}

/// Wavefront OBJ: shared v/vt/vn blocks, then one `g`/`usemtl` section per
/// material group. Indices are 1-based.
fn write_obj(merged: &MergedScene, mtl_name: &str) -> String {
    let buffers = &merged.buffers;
    // Rough per-line sizing keeps reallocation out of the hot loop
    let mut obj = String::with_capacity(buffers.vertex_count() * 96 + buffers.indices.len() * 12);

    let _ = writeln!(obj, "mtllib {mtl_name}");
    for p in &buffers.positions {
        let _ = writeln!(
            obj,
            "v {:.prec$} {:.prec$} {:.prec$}",
            p.x,
            p.y,
            p.z,
            prec = OBJ_PRECISION
        );
    }
    for uv in &buffers.uvs {
        let _ = writeln!(obj, "vt {:.prec$} {:.prec$}", uv.x, uv.y, prec = OBJ_PRECISION);
    }
    for n in &buffers.normals {
        let _ = writeln!(
            obj,
            "vn {:.prec$} {:.prec$} {:.prec$}",
            n.x,
            n.y,
            n.z,
            prec = OBJ_PRECISION
        );
    }

    for group in &merged.groups {
        let _ = writeln!(obj, "g {}", group.name);
        let _ = writeln!(obj, "usemtl {}", group.name);
        let start = group.start_triangle * 3;
        let end = start + group.triangle_count * 3;
        for tri in buffers.indices[start..end].chunks_exact(3) {
            let (a, b, c) = (tri[0] + 1, tri[1] + 1, tri[2] + 1);
            let _ = writeln!(obj, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}");
        }
    }

    obj
}

/// MTL companion: the terrain material carries the satellite texture, the
/// building material is a flat concrete tone.
fn write_mtl(texture_name: &str) -> String {
    let mut mtl = String::new();
    let _ = writeln!(mtl, "newmtl {MATERIAL_TERRAIN}");
    let _ = writeln!(mtl, "Ka 1.000000 1.000000 1.000000");
    let _ = writeln!(mtl, "Kd 1.000000 1.000000 1.000000");
    let _ = writeln!(mtl, "Ks 0.000000 0.000000 0.000000");
    let _ = writeln!(mtl, "illum 1");
    let _ = writeln!(mtl, "map_Kd {texture_name}");
    let _ = writeln!(mtl);
    let _ = writeln!(mtl, "newmtl {MATERIAL_BUILDINGS}");
    let _ = writeln!(mtl, "Ka 1.000000 1.000000 1.000000");
    let _ = writeln!(mtl, "Kd 0.780000 0.760000 0.720000");
    let _ = writeln!(mtl, "Ks 0.000000 0.000000 0.000000");
    let _ = writeln!(mtl, "illum 1");
    mtl
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MaterialGroup, MeshBuffers, MATERIAL_BUILDINGS};
    use glam::{Vec2, Vec3};

    fn one_px_png() -> Vec<u8> {
        let mut bytes = Vec::new();
        let img = image::RgbImage::from_pixel(1, 1, image::Rgb([40, 120, 40]));
        image::DynamicImage::ImageRgb8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();
        bytes
    }

    fn texture() -> TextureImage {
        TextureImage {
            bytes: one_px_png(),
            bbox: BoundingBox::new(47.03, 46.99, 8.04, 7.99).unwrap(),
        }
    }

    fn two_group_scene() -> MergedScene {
        let mut buffers = MeshBuffers::default();
        // One terrain triangle, one building triangle
        for i in 0..6 {
            buffers
                .positions
                .push(Vec3::new(i as f32, (i * i) as f32, -(i as f32)));
            buffers.uvs.push(Vec2::new(0.25, 0.75));
            buffers.normals.push(Vec3::Y);
        }
        buffers.indices.extend_from_slice(&[0, 1, 2, 3, 4, 5]);
        MergedScene {
            buffers,
            groups: vec![
                MaterialGroup {
                    name: MATERIAL_TERRAIN,
                    start_triangle: 0,
                    triangle_count: 1,
                },
                MaterialGroup {
                    name: MATERIAL_BUILDINGS,
                    start_triangle: 1,
                    triangle_count: 1,
                },
            ],
        }
    }

    #[test]
    fn test_export_references_line_up() {
        let export = export_scene(&two_group_scene(), &texture(), Quality::Medium, "scene")
            .unwrap();
        assert_eq!(export.obj_name, "scene.obj");
        assert_eq!(export.mtl_name, "scene.mtl");
        assert_eq!(export.texture_name, "scene.png");
        assert!(export.obj.starts_with("mtllib scene.mtl\n"));
        assert!(export.mtl.contains("map_Kd scene.png"));
    }

    #[test]
    fn test_obj_counts_and_one_based_faces() {
        let export = export_scene(&two_group_scene(), &texture(), Quality::Medium, "scene")
            .unwrap();
        let count = |prefix: &str| {
            export
                .obj
                .lines()
                .filter(|l| l.starts_with(prefix))
                .count()
        };
        assert_eq!(count("v "), 6);
        assert_eq!(count("vt "), 6);
        assert_eq!(count("vn "), 6);
        assert_eq!(count("f "), 2);
        assert_eq!(count("usemtl "), 2);
        // First face uses vertices 1..3, never 0
        assert!(export.obj.contains("f 1/1/1 2/2/2 3/3/3"));
        assert!(!export.obj.contains("f 0/"));
    }

    #[test]
    fn test_material_group_order_terrain_then_buildings() {
        let export = export_scene(&two_group_scene(), &texture(), Quality::Medium, "scene")
            .unwrap();
        let terrain_at = export.obj.find("usemtl terrain").unwrap();
        let buildings_at = export.obj.find("usemtl buildings").unwrap();
        assert!(terrain_at < buildings_at);
    }

    #[test]
    fn test_empty_scene_rejected() {
        let merged = MergedScene {
            buffers: MeshBuffers::default(),
            groups: vec![],
        };
        assert!(matches!(
            export_scene(&merged, &texture(), Quality::Medium, "scene"),
            Err(ExportError::EmptyScene)
        ));
    }

    #[test]
    fn test_inconsistent_buffers_rejected() {
        let mut merged = two_group_scene();
        merged.buffers.uvs.pop();
        assert!(matches!(
            export_scene(&merged, &texture(), Quality::Medium, "scene"),
            Err(ExportError::InconsistentBuffers(_))
        ));

        let mut merged = two_group_scene();
        merged.buffers.indices[0] = 99;
        assert!(matches!(
            export_scene(&merged, &texture(), Quality::Medium, "scene"),
            Err(ExportError::InconsistentBuffers(_))
        ));
    }

    #[test]
    fn test_vertex_budget_enforced() {
        let mut merged = two_group_scene();
        let filler = merged.buffers.positions[0];
        while merged.buffers.vertex_count() <= Quality::Low.tier().max_scene_vertices {
            merged.buffers.positions.push(filler);
            merged.buffers.uvs.push(Vec2::ZERO);
            merged.buffers.normals.push(Vec3::Y);
        }
        assert!(matches!(
            export_scene(&merged, &texture(), Quality::Low, "scene"),
            Err(ExportError::VertexBudgetExceeded { .. })
        ));
    }

    #[test]
    fn test_texture_validation() {
        let tex = texture();
        let covered = BoundingBox::new(47.02, 47.0, 8.03, 8.0).unwrap();
        assert!(tex.validate_for(&covered).is_ok());

        let outside = BoundingBox::new(48.02, 48.0, 8.03, 8.0).unwrap();
        assert!(matches!(
            tex.validate_for(&outside),
            Err(DataError::TextureCoverage)
        ));

        let garbage = TextureImage {
            bytes: vec![1, 2, 3, 4],
            bbox: tex.bbox,
        };
        assert!(matches!(
            garbage.validate_for(&covered),
            Err(DataError::TextureDecode(_))
        ));
    }

    #[test]
    fn test_jpeg_extension_detected() {
        let mut bytes = Vec::new();
        let img = image::RgbImage::from_pixel(1, 1, image::Rgb([0, 0, 0]));
        image::DynamicImage::ImageRgb8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Jpeg,
            )
            .unwrap();
        let tex = TextureImage {
            bytes,
            bbox: texture().bbox,
        };
        assert_eq!(tex.file_extension(), "jpg");
    }
}
