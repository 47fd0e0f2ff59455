//! # Building Footprints
//!
//! Typed footprint records and GeoJSON ingestion. Footprints stay in
//! geodetic coordinates here; projection happens inside the extruder through
//! the job's shared transformer.
//!
//! ## Table of Contents
//! 1. GeoCoord / PolygonShape / BuildingFootprint
//! 2. GeoJSON import
//! 3. OSM property extraction

use geojson::{Feature, GeoJson, Value};

use crate::error::DataError;

// ============================================================================
// 1. GeoCoord / PolygonShape / BuildingFootprint
// ============================================================================

/// A geodetic point (WGS84 degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCoord {
    pub lat: f64,
    pub lon: f64,
}

/// One polygon: an outer ring plus optional hole rings (courtyards).
#[derive(Debug, Clone)]
pub struct PolygonShape {
    pub outer: Vec<GeoCoord>,
    pub holes: Vec<Vec<GeoCoord>>,
}

/// A building's ground outline with optional OSM height metadata.
///
/// Multi-polygon relations keep every outer ring as an independent shape —
/// merging or truncating to the first ring loses real buildings.
#[derive(Debug, Clone, Default)]
pub struct BuildingFootprint {
    pub shapes: Vec<PolygonShape>,
    /// Explicit `height` tag in meters, when present
    pub height_m: Option<f64>,
    /// `building:levels` tag; fractional level counts occur in OSM
    pub levels: Option<f64>,
    /// `building` tag value (residential, office, ...)
    pub building_type: Option<String>,
}

// ============================================================================
// 2. GeoJSON import
// ============================================================================

/// Parse building footprints from a GeoJSON document. Polygon and
/// MultiPolygon features become footprints; other geometry kinds are skipped
/// with a warning — point and line features are not buildings.
pub fn footprints_from_geojson(content: &str) -> Result<Vec<BuildingFootprint>, DataError> {
    let geojson: GeoJson = content
        .parse()
        .map_err(|e| DataError::FootprintParse(format!("{e}")))?;

    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![Feature {
            bbox: None,
            geometry: Some(g),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    let mut footprints = Vec::new();
    let mut skipped = 0usize;

    for feature in features {
        let Some(geometry) = feature.geometry.as_ref() else {
            skipped += 1;
            continue;
        };
        let shapes = match &geometry.value {
            Value::Polygon(rings) => vec![shape_from_rings(rings)],
            Value::MultiPolygon(polys) => polys.iter().map(|r| shape_from_rings(r)).collect(),
            other => {
                let kind = match other {
                    Value::Point(_) => "Point",
                    Value::MultiPoint(_) => "MultiPoint",
                    Value::LineString(_) => "LineString",
                    Value::MultiLineString(_) => "MultiLineString",
                    Value::GeometryCollection(_) => "GeometryCollection",
                    _ => "unsupported",
                };
                tracing::warn!("Skipping non-polygon footprint geometry: {kind}");
                skipped += 1;
                continue;
            }
        };
        let shapes: Vec<PolygonShape> = shapes
            .into_iter()
            .filter(|s| !s.outer.is_empty())
            .collect();
        if shapes.is_empty() {
            skipped += 1;
            continue;
        }

        footprints.push(BuildingFootprint {
            shapes,
            height_m: extract_number(&feature.properties, "height"),
            levels: extract_number(&feature.properties, "building:levels"),
            building_type: extract_string(&feature.properties, "building"),
        });
    }

    tracing::info!(
        "Imported {} building footprints ({} features skipped)",
        footprints.len(),
        skipped
    );
    Ok(footprints)
}

fn shape_from_rings(rings: &[Vec<Vec<f64>>]) -> PolygonShape {
    let ring_coords = |ring: &Vec<Vec<f64>>| -> Vec<GeoCoord> {
        ring.iter()
            .filter(|c| c.len() >= 2)
            .map(|c| GeoCoord {
                lon: c[0],
                lat: c[1],
            })
            .collect()
    };
    PolygonShape {
        outer: rings.first().map(ring_coords).unwrap_or_default(),
        holes: rings.iter().skip(1).map(ring_coords).collect(),
    }
}

// ============================================================================
// 3. OSM property extraction
// ============================================================================

type Properties = Option<serde_json::Map<String, serde_json::Value>>;

/// Numeric property that may arrive as a number or as a string like
/// `"12"` or `"12 m"` — OSM tagging is free-form.
fn extract_number(properties: &Properties, key: &str) -> Option<f64> {
    let value = properties.as_ref()?.get(key)?;
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => {
            let trimmed = s.trim().trim_end_matches(|c: char| c.is_alphabetic() || c.is_whitespace());
            trimmed.trim().parse().ok()
        }
        _ => None,
    }
}

fn extract_string(properties: &Properties, key: &str) -> Option<String> {
    properties
        .as_ref()?
        .get(key)?
        .as_str()
        .map(|s| s.to_string())
}
