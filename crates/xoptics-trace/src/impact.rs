//! Recorded impacts and the diagrams computed from them.

use serde::{Deserialize, Serialize};
use xoptics_math::{Point3, Vec3};

use crate::ray::Ray;

/// Reference frame in which impacts are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactFrame {
    /// Laboratory frame.
    General,
    /// Laboratory orientation, origin at the surface. Impacts are stored this way.
    #[default]
    LocalAbsolute,
    /// Exit frame orientation, origin at the surface.
    AlignedLocal,
    /// Surface frame, where the shape equation is written.
    Surface,
}

/// Per-column statistics over a set of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagram<const N: usize> {
    /// Number of rows.
    pub count: usize,
    /// Rays that could not contribute a row.
    pub lost: usize,
    /// The rows.
    pub spots: Vec<[f64; N]>,
    /// Column minima.
    pub min: [f64; N],
    /// Column maxima.
    pub max: [f64; N],
    /// Column means.
    pub mean: [f64; N],
    /// Column standard deviations.
    pub sigma: [f64; N],
}

/// Rows of `(x, y, dx, dy, wavelength)` on an observation plane.
pub type SpotDiagram = Diagram<5>;

/// Rows of `(x, y, z, wavelength)` at each ray's closest approach to the axis.
pub type CausticDiagram = Diagram<4>;

impl<const N: usize> Diagram<N> {
    /// Computes the statistics of `spots`. An empty set has all statistics zero.
    pub fn from_rows(spots: Vec<[f64; N]>, lost: usize) -> Self {
        let mut min = [0.0; N];
        let mut max = [0.0; N];
        let mut mean = [0.0; N];
        let mut sigma = [0.0; N];
        if !spots.is_empty() {
            min = [f64::INFINITY; N];
            max = [f64::NEG_INFINITY; N];
            let mut sum_sq = [0.0; N];
            for row in &spots {
                for k in 0..N {
                    min[k] = min[k].min(row[k]);
                    max[k] = max[k].max(row[k]);
                    mean[k] += row[k];
                    sum_sq[k] += row[k] * row[k];
                }
            }
            let n = spots.len() as f64;
            for k in 0..N {
                mean[k] /= n;
                sigma[k] = (sum_sq[k] / n - mean[k] * mean[k]).max(0.0).sqrt();
            }
        }
        Self {
            count: spots.len(),
            lost,
            spots,
            min,
            max,
            mean,
            sigma,
        }
    }
}

/// Spot diagram of `impacts` (aligned local frame) on the plane `z = distance`.
///
/// Rays parallel to the plane are counted as lost.
pub fn spot_diagram(impacts: &[Ray], lost: usize, distance: f64) -> SpotDiagram {
    let mut rows = Vec::with_capacity(impacts.len());
    let mut lost = lost;
    let plane_point = Point3::new(0.0, 0.0, distance);
    for impact in impacts {
        let mut ray = impact.clone();
        if !ray.move_to_plane(&Vec3::z_axis(), &plane_point) {
            lost += 1;
            continue;
        }
        let p = ray.position();
        rows.push([p.x, p.y, ray.direction.x, ray.direction.y, ray.wavelength]);
    }
    Diagram::from_rows(rows, lost)
}

/// Caustic of `impacts` (aligned local frame): for each ray, the point where
/// it passes closest to the Z axis. Rays parallel to the axis are skipped.
pub fn caustic(impacts: &[Ray], lost: usize) -> CausticDiagram {
    let rows = impacts
        .iter()
        .filter_map(|ray| {
            let u = ray.direction;
            let transverse = u.x * u.x + u.y * u.y;
            if transverse < 1e-12 {
                return None;
            }
            let p = ray.position();
            let t = -(p.x * u.x + p.y * u.y) / transverse;
            let q = p + u.as_ref() * t;
            Some([q.x, q.y, q.z, ray.wavelength])
        })
        .collect();
    Diagram::from_rows(rows, lost)
}
