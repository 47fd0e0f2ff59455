//! # Error Taxonomy
//!
//! Errors are split by recovery policy: input/data/export errors abort the
//! whole generation job, sampling/extrusion errors are local to a single
//! building and recorded as statistics.
//!
//! ## Table of Contents
//! 1. InputError — invalid caller-supplied parameters (fatal)
//! 2. DataError — inconsistent fetched datasets (fatal)
//! 3. SamplingError — elevation unavailable for a point (per-building)
//! 4. ExtrusionError — one footprint could not be extruded (per-building)
//! 5. ExportError — merged scene failed sanity checks (fatal)
//! 6. GenerationError — top-level job error

// ============================================================================
// 1. InputError — invalid caller-supplied parameters (fatal)
// ============================================================================

/// Invalid generation parameters. Validated upstream at the API boundary
/// but re-checked here defensively.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("invalid bounding box ordering: north={north}, south={south}, east={east}, west={west}")]
    BboxOrdering {
        north: f64,
        south: f64,
        east: f64,
        west: f64,
    },

    #[error("degenerate bounding box: width={width_m:.1}m, height={height_m:.1}m")]
    DegenerateBbox { width_m: f64, height_m: f64 },

    #[error("bounding box side {side_m:.0}m outside allowed range [{min_m:.0}m, {max_m:.0}m]")]
    BboxSideOutOfRange { side_m: f64, min_m: f64, max_m: f64 },
}

// ============================================================================
// 2. DataError — inconsistent fetched datasets (fatal)
// ============================================================================

/// The fetched datasets disagree with their declared shape or with each other.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("elevation grid shape mismatch: declared {rows}x{cols} but got {actual} values")]
    GridShapeMismatch {
        rows: usize,
        cols: usize,
        actual: usize,
    },

    #[error("elevation grid too small for meshing: {rows}x{cols} (need at least 2x2)")]
    GridTooSmall { rows: usize, cols: usize },

    #[error("elevation grid rows are ragged: row {row} has {len} values, expected {expected}")]
    RaggedGrid {
        row: usize,
        len: usize,
        expected: usize,
    },

    #[error("texture coverage does not include the terrain bbox")]
    TextureCoverage,

    #[error("texture bytes are not a decodable image: {0}")]
    TextureDecode(String),

    #[error("footprint data could not be parsed: {0}")]
    FootprintParse(String),
}

// ============================================================================
// 3. SamplingError — elevation unavailable for a point (per-building)
// ============================================================================

/// The elevation sampler could not answer a query. Recovered per building:
/// the affected footprint is dropped, the job continues.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum SamplingError {
    #[error("query point is {distance_m:.1}m from the nearest terrain vertex (max {max_m:.1}m)")]
    OutOfBounds { distance_m: f64, max_m: f64 },

    #[error("terrain grid has no vertices")]
    EmptyGrid,
}

// ============================================================================
// 4. ExtrusionError — one footprint could not be extruded (per-building)
// ============================================================================

/// One building footprint could not be turned into a prism. Recovered per
/// building; the output sequence keeps a `None` at the footprint's index.
#[derive(Debug, thiserror::Error)]
pub enum ExtrusionError {
    #[error("footprint has no rings")]
    EmptyFootprint,

    #[error("footprint outer ring encloses near-zero area ({area_m2:.3} m2)")]
    DegenerateFootprint { area_m2: f64 },

    #[error("footprint ring self-intersects")]
    SelfIntersecting,

    #[error("cap triangulation failed: {0}")]
    Triangulation(String),

    #[error("base elevation unavailable: {0}")]
    Elevation(#[from] SamplingError),
}

impl ExtrusionError {
    /// Stable label used for per-reason failure statistics.
    pub fn reason(&self) -> &'static str {
        match self {
            ExtrusionError::EmptyFootprint => "empty_footprint",
            ExtrusionError::DegenerateFootprint { .. } => "degenerate_footprint",
            ExtrusionError::SelfIntersecting => "self_intersecting",
            ExtrusionError::Triangulation(_) => "triangulation",
            ExtrusionError::Elevation(SamplingError::OutOfBounds { .. }) => "out_of_bounds",
            ExtrusionError::Elevation(SamplingError::EmptyGrid) => "empty_grid",
        }
    }
}

// ============================================================================
// 5. ExportError — merged scene failed sanity checks (fatal)
// ============================================================================

/// The merged scene failed coarse sanity bounds. Better to fail loudly than
/// hand the caller a truncated or absurdly large file.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("scene has no geometry to export")]
    EmptyScene,

    #[error("vertex count {count} exceeds the {quality} quality budget of {max}")]
    VertexBudgetExceeded {
        count: usize,
        max: usize,
        quality: &'static str,
    },

    #[error("serialized scene is {bytes} bytes, exceeding the {quality} quality budget of {max}")]
    OutputTooLarge {
        bytes: usize,
        max: usize,
        quality: &'static str,
    },

    #[error("mesh buffers are inconsistent: {0}")]
    InconsistentBuffers(String),
}

// ============================================================================
// 6. GenerationError — top-level job error
// ============================================================================

/// Caller-visible error for a failed generation job. Per-building failures
/// never surface here; they are reported in [`crate::GenerationReport`].
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("generation cancelled")]
    Cancelled,
}
