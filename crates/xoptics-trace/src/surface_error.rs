//! Surface-height error maps.

use nalgebra::DMatrix;
use xoptics_math::{Point2, Vec2};

use crate::error::{Result, TraceError};

/// Height error and its gradient at a point of the surface frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeightSample {
    /// Height along the surface normal (m).
    pub height: f64,
    /// Partial derivatives of the height along X and Y.
    pub slope: Vec2,
}

/// Height errors sampled on a regular grid of the surface frame.
///
/// Row `j` of the grid is at `y = y_min + j * dy`, column `i` at
/// `x = x_min + i * dx`. Values between nodes are bilinear; outside the grid
/// the error is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightErrorMap {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    heights: DMatrix<f64>,
}

impl HeightErrorMap {
    /// Builds a map covering `[x_min, x_max] × [y_min, y_max]`.
    pub fn new(x_range: (f64, f64), y_range: (f64, f64), heights: DMatrix<f64>) -> Result<Self> {
        let (x_min, x_max) = x_range;
        let (y_min, y_max) = y_range;
        if !(x_min < x_max && y_min < y_max) {
            return Err(TraceError::InvalidSettings(
                "error map bounds must be increasing".into(),
            ));
        }
        if heights.nrows() < 2 || heights.ncols() < 2 {
            return Err(TraceError::InvalidSettings(
                "error map needs at least 2x2 nodes".into(),
            ));
        }
        if heights.iter().any(|h| !h.is_finite()) {
            return Err(TraceError::InvalidSettings("error map heights must be finite".into()));
        }
        Ok(Self {
            x_min,
            x_max,
            y_min,
            y_max,
            heights,
        })
    }

    /// Node spacing along X and Y.
    pub fn spacing(&self) -> Vec2 {
        Vec2::new(
            (self.x_max - self.x_min) / (self.heights.ncols() - 1) as f64,
            (self.y_max - self.y_min) / (self.heights.nrows() - 1) as f64,
        )
    }

    /// The grid of heights.
    pub fn heights(&self) -> &DMatrix<f64> {
        &self.heights
    }

    /// Height and slope at `point`.
    pub fn sample(&self, point: &Point2) -> HeightSample {
        if point.x < self.x_min || point.x > self.x_max || point.y < self.y_min || point.y > self.y_max
        {
            return HeightSample::default();
        }
        let step = self.spacing();
        let (i, u) = cell(point.x - self.x_min, step.x, self.heights.ncols());
        let (j, v) = cell(point.y - self.y_min, step.y, self.heights.nrows());

        let h00 = self.heights[(j, i)];
        let h10 = self.heights[(j, i + 1)];
        let h01 = self.heights[(j + 1, i)];
        let h11 = self.heights[(j + 1, i + 1)];

        let height = (1.0 - u) * (1.0 - v) * h00 + u * (1.0 - v) * h10 + (1.0 - u) * v * h01 + u * v * h11;
        let slope = Vec2::new(
            ((1.0 - v) * (h10 - h00) + v * (h11 - h01)) / step.x,
            ((1.0 - u) * (h01 - h00) + u * (h11 - h10)) / step.y,
        );
        HeightSample { height, slope }
    }
}

/// Cell index and fractional position along one axis.
fn cell(offset: f64, step: f64, nodes: usize) -> (usize, f64) {
    let f = offset / step;
    let index = (f.floor().max(0.0) as usize).min(nodes - 2);
    (index, f - index as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tilted() -> HeightErrorMap {
        // h = 1e-9 x + 2e-9 y on a 3x5 grid over [-1, 1] x [-0.5, 0.5]
        let heights = DMatrix::from_fn(3, 5, |j, i| {
            let x = -1.0 + 0.5 * i as f64;
            let y = -0.5 + 0.5 * j as f64;
            1e-9 * x + 2e-9 * y
        });
        HeightErrorMap::new((-1.0, 1.0), (-0.5, 0.5), heights).unwrap()
    }

    #[test]
    fn test_planar_map_is_exact() {
        let map = tilted();
        let s = map.sample(&Point2::new(0.3, -0.2));
        assert!((s.height - (0.3e-9 - 0.4e-9)).abs() < 1e-20);
        assert!((s.slope.x - 1e-9).abs() < 1e-20);
        assert!((s.slope.y - 2e-9).abs() < 1e-20);
    }

    #[test]
    fn test_upper_corner() {
        let map = tilted();
        let s = map.sample(&Point2::new(1.0, 0.5));
        assert!((s.height - 2e-9).abs() < 1e-20);
    }

    #[test]
    fn test_outside_is_zero() {
        let map = tilted();
        assert_eq!(map.sample(&Point2::new(1.5, 0.0)), HeightSample::default());
    }

    #[test]
    fn test_invalid_maps() {
        assert!(HeightErrorMap::new((1.0, -1.0), (0.0, 1.0), DMatrix::zeros(2, 2)).is_err());
        assert!(HeightErrorMap::new((-1.0, 1.0), (0.0, 1.0), DMatrix::zeros(1, 4)).is_err());
        let mut bad = DMatrix::zeros(2, 2);
        bad[(0, 1)] = f64::NAN;
        assert!(HeightErrorMap::new((-1.0, 1.0), (0.0, 1.0), bad).is_err());
    }
}
