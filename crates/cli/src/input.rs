//! # Input Loading
//!
//! Parses the pre-fetched job inputs the CLI consumes: the bbox string,
//! elevation rasters (Terrain-RGB PNG or raw JSON rows) and the satellite
//! texture.
//!
//! ## Table of Contents
//! 1. Bounding box parsing
//! 2. Elevation loading (Terrain-RGB PNG, JSON rows)
//! 3. Texture loading

use std::path::Path;

use anyhow::{bail, Context};
use geomesh_core::{BoundingBox, ElevationGrid, RowOrientation, TextureImage};

// ============================================================================
// 1. Bounding box parsing
// ============================================================================

/// Parse `north,south,east,west` in WGS84 degrees.
pub fn parse_bbox(s: &str) -> anyhow::Result<BoundingBox> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("bbox '{s}' is not four comma-separated numbers"))?;
    if parts.len() != 4 {
        bail!("bbox '{s}' must be north,south,east,west");
    }
    Ok(BoundingBox::new(parts[0], parts[1], parts[2], parts[3])?)
}

// ============================================================================
// 2. Elevation loading (Terrain-RGB PNG, JSON rows)
// ============================================================================

/// Load an elevation grid from disk.
///
/// `.png` is decoded as a Terrain-RGB tile; `.json` as nested row arrays of
/// meters. Both arrive north-up (row 0 = northern edge), the convention
/// elevation providers use.
pub fn load_elevation(path: &Path) -> anyhow::Result<ElevationGrid> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match extension.as_str() {
        "png" => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("reading elevation raster {}", path.display()))?;
            let image = image::load_from_memory(&bytes)
                .with_context(|| format!("decoding elevation raster {}", path.display()))?;
            Ok(decode_terrain_rgb(&image.to_rgb8())?)
        }
        "json" => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading elevation JSON {}", path.display()))?;
            let rows: Vec<Vec<f32>> =
                serde_json::from_str(&content).context("elevation JSON must be rows of numbers")?;
            Ok(ElevationGrid::from_rows(rows, RowOrientation::NorthUp)?)
        }
        other => bail!("unsupported elevation format '.{other}' (expected .png or .json)"),
    }
}

/// Decode a Mapbox-style Terrain-RGB tile:
/// `elevation = -10000 + (R * 65536 + G * 256 + B) * 0.1`.
pub fn decode_terrain_rgb(image: &image::RgbImage) -> anyhow::Result<ElevationGrid> {
    let (width, height) = image.dimensions();
    let mut values = Vec::with_capacity((width * height) as usize);
    for pixel in image.pixels() {
        let [r, g, b] = pixel.0;
        let packed = (r as u32) * 65536 + (g as u32) * 256 + b as u32;
        values.push(-10_000.0 + packed as f32 * 0.1);
    }
    Ok(ElevationGrid::new(
        height as usize,
        width as usize,
        values,
        RowOrientation::NorthUp,
    )?)
}

// ============================================================================
// 3. Texture loading
// ============================================================================

/// Load the satellite texture. Bytes pass through to the export untouched;
/// decodability is validated inside the pipeline.
pub fn load_texture(path: &Path, bbox: BoundingBox) -> anyhow::Result<TextureImage> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading texture {}", path.display()))?;
    Ok(TextureImage { bytes, bbox })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        let bbox = parse_bbox("47.02, 47.0, 8.03, 8.0").unwrap();
        assert_eq!(bbox.north, 47.02);
        assert_eq!(bbox.west, 8.0);

        assert!(parse_bbox("47.02,47.0,8.03").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
        // Valid syntax, invalid ordering
        assert!(parse_bbox("47.0,47.02,8.03,8.0").is_err());
    }

    /// Inverse of the decode formula, for round-trip checks.
    fn encode_terrain_rgb(elevation_m: f64) -> [u8; 3] {
        let packed = ((elevation_m + 10_000.0) / 0.1).round() as u32;
        [
            (packed / 65536) as u8,
            ((packed % 65536) / 256) as u8,
            (packed % 256) as u8,
        ]
    }

    #[test]
    fn test_terrain_rgb_decode_roundtrip() {
        let elevations = [[-42.5, 0.0], [134.2, 4807.8]];
        let image = image::RgbImage::from_fn(2, 2, |x, y| {
            image::Rgb(encode_terrain_rgb(elevations[y as usize][x as usize]))
        });
        let grid = decode_terrain_rgb(&image).unwrap();
        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.cols(), 2);
        assert_eq!(grid.orientation(), RowOrientation::NorthUp);
        for r in 0..2 {
            for c in 0..2 {
                assert!(
                    (grid.get(r, c) as f64 - elevations[r][c]).abs() < 0.051,
                    "({r},{c}): decoded {} expected {}",
                    grid.get(r, c),
                    elevations[r][c]
                );
            }
        }
    }

    #[test]
    fn test_sea_level_pixel() {
        // 0 m packs to 100000 = (1, 134, 160)
        assert_eq!(encode_terrain_rgb(0.0), [1, 134, 160]);
    }
}
