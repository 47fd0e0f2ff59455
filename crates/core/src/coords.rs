//! # Coordinate Transforms
//!
//! Transforms geographic coordinates (WGS84 lat/lon) to the local tangent
//! plane all mesh geometry lives in.
//!
//! ```text
//! Geographic (WGS84)  →  Local (meters, Y-up, right-handed)
//!   lat/lon degrees        x east / z south, centered on the bbox
//! ```
//!
//! The axis convention — north maps to −z so that north appears "up" and
//! east appears "right" in a top-down view — is applied here and nowhere
//! else. Terrain vertices and footprint vertices go through the same
//! [`LocalTransformer`] instance, so the convention cannot be applied twice
//! to one dataset and zero times to the other.
//!
//! ## Table of Contents
//! 1. BoundingBox — geographic selection with defensive validation
//! 2. LocalTransformer — equirectangular-at-center projection

use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Earth radius in meters (WGS84 mean)
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// Allowed bounding-box side length, enforced upstream and re-checked here.
pub const MIN_BBOX_SIDE_M: f64 = 1_000.0;
pub const MAX_BBOX_SIDE_M: f64 = 5_000.0;

// ============================================================================
// 1. BoundingBox — geographic selection with defensive validation
// ============================================================================

/// Geographic bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// North latitude (degrees)
    pub north: f64,
    /// South latitude (degrees)
    pub south: f64,
    /// East longitude (degrees)
    pub east: f64,
    /// West longitude (degrees)
    pub west: f64,
}

impl BoundingBox {
    /// Construct and validate a bounding box.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self, InputError> {
        let bbox = Self {
            north,
            south,
            east,
            west,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Re-check the invariants the upstream boundary is supposed to enforce:
    /// north > south, east > west, side lengths within [1 km, 5 km].
    pub fn validate(&self) -> Result<(), InputError> {
        if self.north <= self.south || self.east <= self.west {
            return Err(InputError::BboxOrdering {
                north: self.north,
                south: self.south,
                east: self.east,
                west: self.west,
            });
        }
        let width = self.width_m();
        let height = self.height_m();
        if width <= f64::EPSILON || height <= f64::EPSILON {
            return Err(InputError::DegenerateBbox {
                width_m: width,
                height_m: height,
            });
        }
        for side in [width, height] {
            if !(MIN_BBOX_SIDE_M..=MAX_BBOX_SIDE_M).contains(&side) {
                return Err(InputError::BboxSideOutOfRange {
                    side_m: side,
                    min_m: MIN_BBOX_SIDE_M,
                    max_m: MAX_BBOX_SIDE_M,
                });
            }
        }
        Ok(())
    }

    /// Center point of the bbox: (latitude, longitude).
    pub fn center(&self) -> (f64, f64) {
        (
            (self.north + self.south) * 0.5,
            (self.east + self.west) * 0.5,
        )
    }

    /// East-west extent in meters (equirectangular approximation at the
    /// center latitude).
    pub fn width_m(&self) -> f64 {
        let (center_lat, _) = self.center();
        (self.east - self.west).to_radians() * EARTH_RADIUS * center_lat.to_radians().cos()
    }

    /// North-south extent in meters.
    pub fn height_m(&self) -> f64 {
        (self.north - self.south).to_radians() * EARTH_RADIUS
    }

    /// Whether this bbox fully covers `other` (with a small tolerance for
    /// provider rounding).
    pub fn covers(&self, other: &BoundingBox) -> bool {
        const EPS_DEG: f64 = 1e-6;
        self.north >= other.north - EPS_DEG
            && self.south <= other.south + EPS_DEG
            && self.east >= other.east - EPS_DEG
            && self.west <= other.west + EPS_DEG
    }
}

// ============================================================================
// 2. LocalTransformer — equirectangular-at-center projection
// ============================================================================

/// Projects WGS84 coordinates to local meters relative to a bbox center.
///
/// Accurate within ~0.5% for the ≤5 km areas this engine accepts. Elevation
/// (y) is never touched by this component.
///
/// One transformer is created per generation job and shared by the terrain
/// builder and the building extruder.
#[derive(Debug, Clone)]
pub struct LocalTransformer {
    center_lat: f64,
    center_lon: f64,
    /// cos(center latitude), precomputed for the longitude scale factor
    cos_center_lat: f64,
}

impl LocalTransformer {
    /// Create a transformer centered on the bbox.
    pub fn new(bbox: &BoundingBox) -> Self {
        let (center_lat, center_lon) = bbox.center();
        Self {
            center_lat,
            center_lon,
            cos_center_lat: center_lat.to_radians().cos(),
        }
    }

    /// Project (lat, lon) to local (x, z) meters.
    ///
    /// x grows eastward; z grows southward (north is −z). This is the single
    /// place the axis convention is applied.
    pub fn to_local(&self, lat: f64, lon: f64) -> (f64, f64) {
        let x = (lon - self.center_lon).to_radians() * EARTH_RADIUS * self.cos_center_lat;
        let north = (lat - self.center_lat).to_radians() * EARTH_RADIUS;
        (x, -north)
    }

    /// Latitude of the projection center (degrees).
    pub fn center_lat(&self) -> f64 {
        self.center_lat
    }

    /// Longitude of the projection center (degrees).
    pub fn center_lon(&self) -> f64 {
        self.center_lon
    }
}
