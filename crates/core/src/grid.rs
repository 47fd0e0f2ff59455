//! # Elevation Grid
//!
//! Row-major elevation raster in meters, with an explicit row orientation
//! and a separable Gaussian denoiser. Terrain-RGB tiles arrive with row 0 at
//! the northern edge; vertex construction consumes row 0 at the southern
//! edge, and [`ElevationGrid::flipped_south_up`] is the single place that
//! conversion happens.
//!
//! ## Table of Contents
//! 1. RowOrientation
//! 2. ElevationGrid — construction and access
//! 3. Gaussian smoothing

use crate::error::DataError;

// ============================================================================
// 1. RowOrientation
// ============================================================================

/// Which geographic edge row 0 of the raster corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrientation {
    /// Row 0 is the northern edge — how elevation providers deliver rasters.
    NorthUp,
    /// Row 0 is the southern edge — the orientation vertex construction uses.
    SouthUp,
}

// ============================================================================
// 2. ElevationGrid — construction and access
// ============================================================================

/// 2D elevation raster, row-major, values in meters.
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    rows: usize,
    cols: usize,
    orientation: RowOrientation,
    values: Vec<f32>,
}

impl ElevationGrid {
    /// Build from a flat row-major buffer with a declared shape.
    pub fn new(
        rows: usize,
        cols: usize,
        values: Vec<f32>,
        orientation: RowOrientation,
    ) -> Result<Self, DataError> {
        if values.len() != rows * cols {
            return Err(DataError::GridShapeMismatch {
                rows,
                cols,
                actual: values.len(),
            });
        }
        if rows < 2 || cols < 2 {
            return Err(DataError::GridTooSmall { rows, cols });
        }
        Ok(Self {
            rows,
            cols,
            orientation,
            values,
        })
    }

    /// Build from nested rows, rejecting ragged input.
    pub fn from_rows(rows: Vec<Vec<f32>>, orientation: RowOrientation) -> Result<Self, DataError> {
        let row_count = rows.len();
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut values = Vec::with_capacity(row_count * cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != cols {
                return Err(DataError::RaggedGrid {
                    row: i,
                    len: row.len(),
                    expected: cols,
                });
            }
            values.extend(row);
        }
        Self::new(row_count, cols, values, orientation)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn orientation(&self) -> RowOrientation {
        self.orientation
    }

    /// Elevation at (row, col). Panics on out-of-range indices, like any
    /// slice access; callers iterate within the declared shape.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.values[row * self.cols + col]
    }

    /// The flat row-major buffer.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Consume the grid and return one with row 0 at the southern edge.
    /// Already-south-up grids pass through unchanged. This is the only
    /// orientation conversion in the pipeline.
    pub fn flipped_south_up(self) -> Self {
        match self.orientation {
            RowOrientation::SouthUp => self,
            RowOrientation::NorthUp => {
                let mut values = Vec::with_capacity(self.values.len());
                for row in (0..self.rows).rev() {
                    let start = row * self.cols;
                    values.extend_from_slice(&self.values[start..start + self.cols]);
                }
                Self {
                    rows: self.rows,
                    cols: self.cols,
                    orientation: RowOrientation::SouthUp,
                    values,
                }
            }
        }
    }

    // ========================================================================
    // 3. Gaussian smoothing
    // ========================================================================

    /// Apply a separable Gaussian blur with kernel width `sigma` (in grid
    /// cells) to suppress raster quantization and compression noise while
    /// keeping macro-scale relief. `sigma <= 0` is a no-op.
    ///
    /// Edges clamp to the border sample, so flat borders stay flat.
    pub fn smooth(&mut self, sigma: f32) {
        if sigma <= 0.0 {
            return;
        }
        let kernel = gaussian_kernel(sigma);
        let radius = (kernel.len() - 1) / 2;

        // Horizontal pass
        let mut pass = vec![0.0f32; self.values.len()];
        for r in 0..self.rows {
            for c in 0..self.cols {
                let mut acc = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let offset = k as isize - radius as isize;
                    let cc = (c as isize + offset).clamp(0, self.cols as isize - 1) as usize;
                    acc += w * self.get(r, cc);
                }
                pass[r * self.cols + c] = acc;
            }
        }

        // Vertical pass
        for c in 0..self.cols {
            for r in 0..self.rows {
                let mut acc = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let offset = k as isize - radius as isize;
                    let rr = (r as isize + offset).clamp(0, self.rows as isize - 1) as usize;
                    acc += w * pass[rr * self.cols + c];
                }
                self.values[r * self.cols + c] = acc;
            }
        }
    }
}

/// Normalized 1D Gaussian kernel with radius ceil(3 sigma).
fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil() as usize;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|k| {
            let d = k as f32 - radius as f32;
            (-d * d / denom).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_is_data_error() {
        let err = ElevationGrid::new(3, 3, vec![0.0; 8], RowOrientation::NorthUp).unwrap_err();
        assert!(matches!(err, DataError::GridShapeMismatch { actual: 8, .. }));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = ElevationGrid::from_rows(
            vec![vec![0.0, 1.0], vec![2.0]],
            RowOrientation::NorthUp,
        )
        .unwrap_err();
        assert!(matches!(err, DataError::RaggedGrid { row: 1, .. }));
    }

    #[test]
    fn test_flip_reverses_rows_once() {
        let grid = ElevationGrid::from_rows(
            vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
            RowOrientation::NorthUp,
        )
        .unwrap();
        let flipped = grid.flipped_south_up();
        assert_eq!(flipped.orientation(), RowOrientation::SouthUp);
        assert_eq!(flipped.values(), &[5.0, 6.0, 3.0, 4.0, 1.0, 2.0]);
        // A second call must be a no-op
        let again = flipped.flipped_south_up();
        assert_eq!(again.values(), &[5.0, 6.0, 3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn test_kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(1.5);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        for k in 0..kernel.len() / 2 {
            assert_eq!(kernel[k], kernel[kernel.len() - 1 - k]);
        }
    }

    #[test]
    fn test_sigma_zero_is_identity() {
        let mut grid = ElevationGrid::from_rows(
            vec![vec![0.0, 10.0], vec![20.0, 30.0]],
            RowOrientation::SouthUp,
        )
        .unwrap();
        let before = grid.values().to_vec();
        grid.smooth(0.0);
        assert_eq!(grid.values(), before.as_slice());
    }

    #[test]
    fn test_smoothing_preserves_constant_field() {
        let mut grid =
            ElevationGrid::new(8, 8, vec![42.0; 64], RowOrientation::SouthUp).unwrap();
        grid.smooth(2.0);
        for &v in grid.values() {
            assert!((v - 42.0).abs() < 1e-4, "constant field changed: {v}");
        }
    }

    #[test]
    fn test_smoothing_reduces_spike() {
        let mut values = vec![0.0f32; 81];
        values[4 * 9 + 4] = 100.0;
        let mut grid = ElevationGrid::new(9, 9, values, RowOrientation::SouthUp).unwrap();
        grid.smooth(1.5);
        let center = grid.get(4, 4);
        assert!(center < 20.0, "spike not attenuated: {center}");
        assert!(center > 0.0);
        // Mass spreads to neighbors instead of vanishing
        assert!(grid.get(4, 5) > 0.0);
    }
}
