//! Elliptical aperture regions.
//!
//! An ellipse is stored as the symmetric 3x3 matrix `M` of its conic in
//! homogeneous coordinates, normalized so that `p^T M p` is -1 at the
//! center, 0 on the boundary and positive outside. Isometries are applied by
//! conjugation, `M' = T^T M T`, with `T` the inverse of the motion.

use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};
use xoptics_math::{Mat3, Point2, Vec2};

use crate::error::{ApertureError, Result};
use crate::polygon::line_mirror;
use crate::region::Location;

const BORDER_ULPS: f64 = 16.0;
const CIRCLE_ULPS: f64 = 64.0;

/// Geometric description of an ellipse, as returned by [`Ellipse::parameters`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipseParameters {
    /// Semi-axis along the orientation direction (the major one).
    pub a: f64,
    /// The other semi-axis.
    pub b: f64,
    /// Center abscissa.
    pub xcenter: f64,
    /// Center ordinate.
    pub ycenter: f64,
    /// Angle of the `a` axis with the X axis, in `(-pi/2, pi/2]`.
    pub angle: f64,
}

/// An ellipse with a transparency flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Ellipse {
    matrix: Mat3,
    transparent: bool,
}

impl Default for Ellipse {
    /// The unit circle centered on the origin, opaque.
    fn default() -> Self {
        Self {
            matrix: Mat3::from_diagonal(&nalgebra::Vector3::new(1.0, 1.0, -1.0)),
            transparent: false,
        }
    }
}

impl Ellipse {
    /// Ellipse of semi-axes `a` (rotated by `angle` from the X axis) and `b`, centered on
    /// `(xcenter, ycenter)`.
    pub fn new(a: f64, b: f64, xcenter: f64, ycenter: f64, angle: f64, transparent: bool) -> Result<Self> {
        let mut ellipse = Self {
            transparent,
            ..Self::default()
        };
        ellipse.set_parameters(a, b, xcenter, ycenter, angle)?;
        Ok(ellipse)
    }

    /// Circle of the given radius.
    pub fn circle(radius: f64, xcenter: f64, ycenter: f64, transparent: bool) -> Result<Self> {
        let mut ellipse = Self {
            transparent,
            ..Self::default()
        };
        ellipse.set_circle(radius, xcenter, ycenter)?;
        Ok(ellipse)
    }

    /// Redefines the ellipse from its geometric parameters.
    pub fn set_parameters(&mut self, a: f64, b: f64, xcenter: f64, ycenter: f64, angle: f64) -> Result<()> {
        check_positive("semi-axis a", a)?;
        check_positive("semi-axis b", b)?;
        let axes = Mat3::from_diagonal(&nalgebra::Vector3::new(1.0 / (a * a), 1.0 / (b * b), -1.0));
        let transform = inverse_motion(angle, &Vec2::new(xcenter, ycenter));
        self.matrix = transform.transpose() * axes * transform;
        Ok(())
    }

    /// Redefines the ellipse as a circle.
    pub fn set_circle(&mut self, radius: f64, xcenter: f64, ycenter: f64) -> Result<()> {
        self.set_parameters(radius, radius, xcenter, ycenter, 0.0)
    }

    /// The homogeneous conic matrix.
    pub fn matrix(&self) -> &Mat3 {
        &self.matrix
    }

    /// Whether the inside of the ellipse transmits.
    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    /// Sets the transparency flag.
    pub fn set_transparent(&mut self, transparent: bool) {
        self.transparent = transparent;
    }

    /// Classifies a point from the sign of the conic's quadratic form.
    pub fn locate(&self, point: &Point2) -> Location {
        let p = nalgebra::Vector3::new(point.x, point.y, 1.0);
        let mut power = 0.0;
        let mut magnitude = 0.0;
        for i in 0..3 {
            for j in 0..3 {
                let term = self.matrix[(i, j)] * p[i] * p[j];
                power += term;
                magnitude += term.abs();
            }
        }
        if power.abs() <= BORDER_ULPS * f64::EPSILON * magnitude {
            Location::Border
        } else if power < 0.0 {
            Location::Inside
        } else {
            Location::Outside
        }
    }

    /// Applies the rotation by `angle` followed by `translation`.
    pub fn move_by(&mut self, angle: f64, translation: &Vec2) {
        let transform = inverse_motion(angle, translation);
        self.conjugate(&transform);
    }

    /// Mirrors the ellipse across the line through `point` along `direction`.
    pub fn set_symmetric(&mut self, point: &Point2, direction: &Vec2) -> Result<()> {
        let (mirror, translation) = line_mirror(point, direction)?;
        // a mirror is its own inverse
        self.conjugate(&affine(&mirror, &translation));
        Ok(())
    }

    /// Point reflection through `point`.
    pub fn set_symmetric_about(&mut self, point: &Point2) {
        let transform = affine(&(-Matrix2::identity()), &(2.0 * point.coords));
        self.conjugate(&transform);
    }

    fn conjugate(&mut self, transform: &Mat3) {
        self.matrix = transform.transpose() * self.matrix * transform;
    }

    /// Recovers semi-axes, center and orientation from the conic matrix.
    ///
    /// `a` is reported as the major semi-axis. For a circle the orientation
    /// is undefined and reported as 0.
    pub fn parameters(&self) -> Result<EllipseParameters> {
        let quad = self.matrix.fixed_view::<2, 2>(0, 0).into_owned();
        let linear = self.matrix.fixed_view::<2, 1>(0, 2).into_owned();
        let inverse = quad.try_inverse().ok_or_else(|| {
            ApertureError::Geometry("conic has no center (parabolic or degenerate)".into())
        })?;
        let center = -(inverse * linear);
        let scale = -(self.matrix[(2, 2)] + linear.dot(&center));
        if scale <= 0.0 {
            return Err(ApertureError::Geometry("conic is not a real ellipse".into()));
        }

        let n = quad / scale;
        let (p, r, q) = (n[(0, 0)], n[(1, 1)], n[(0, 1)]);
        let dif = ((p - r) * (p - r) + 4.0 * q * q).sqrt();
        let mean = 0.5 * (p + r);
        let (inv_a2, inv_b2) = (mean - 0.5 * dif, mean + 0.5 * dif);
        if inv_a2 <= 0.0 {
            return Err(ApertureError::Geometry("conic is not a real ellipse".into()));
        }

        // rounding in the conjugations leaves circles with a tiny residual anisotropy
        let angle = if dif <= CIRCLE_ULPS * f64::EPSILON * mean.abs() {
            0.0
        } else {
            // direction of the smallest eigenvalue, i.e. of the major axis
            let minor_angle = 0.5 * (2.0 * q).atan2(p - r);
            let mut major = minor_angle + std::f64::consts::FRAC_PI_2;
            if major > std::f64::consts::FRAC_PI_2 {
                major -= std::f64::consts::PI;
            }
            major
        };

        Ok(EllipseParameters {
            a: 1.0 / inv_a2.sqrt(),
            b: 1.0 / inv_b2.sqrt(),
            xcenter: center.x,
            ycenter: center.y,
            angle,
        })
    }
}

/// Homogeneous matrix of `x -> linear * x + translation`.
fn affine(linear: &Matrix2<f64>, translation: &Vec2) -> Mat3 {
    let mut m = Mat3::identity();
    m.fixed_view_mut::<2, 2>(0, 0).copy_from(linear);
    m[(0, 2)] = translation.x;
    m[(1, 2)] = translation.y;
    m
}

/// Inverse of the motion "rotate by `angle`, then translate", which maps
/// moved points back to their original position.
fn inverse_motion(angle: f64, translation: &Vec2) -> Mat3 {
    let (s, c) = angle.sin_cos();
    let back_rotation = Matrix2::new(c, s, -s, c);
    affine(&back_rotation, &(-(back_rotation * translation)))
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ApertureError::InvalidParameter(format!(
            "{name} must be positive, got {value}"
        )))
    }
}
