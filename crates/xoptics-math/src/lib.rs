#![warn(missing_docs)]

//! Math types for the xoptics ray-tracing engine.
//!
//! Thin wrappers around nalgebra providing the types used by the optical
//! surface code: points, vectors, directions, homogeneous rigid transforms,
//! tolerance constants, and a few cancellation-safe scalar helpers.

pub mod roots;

use nalgebra::{Matrix3, Matrix4, Unit, Vector2, Vector3, Vector4};

pub use roots::{solve_cubic, solve_quadratic};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in a 2D surface plane.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// A homogeneous 4x4 matrix, used for quadric forms and transforms.
pub type Mat4 = Matrix4<f64>;

/// A 3x3 matrix, used for rotations and 2D conics.
pub type Mat3 = Matrix3<f64>;

/// A 4x4 homogeneous transformation matrix.
///
/// Reference frames of the optical chain are rigid motions, so most
/// transforms built here have an orthonormal linear part.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Pure linear transform from a 3x3 matrix.
    pub fn from_linear(linear: &Matrix3<f64>) -> Self {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(linear);
        Self { matrix: m }
    }

    /// Rigid transform from a rotation and a translation (`x -> R x + t`).
    pub fn from_parts(rotation: &Matrix3<f64>, translation: &Vec3) -> Self {
        let mut t = Self::from_linear(rotation);
        t.matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
        t
    }

    /// Rotation about the X axis by `angle` radians.
    pub fn rotation_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(1, 1)] = c;
        m[(1, 2)] = -s;
        m[(2, 1)] = s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Y axis by `angle` radians.
    pub fn rotation_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 2)] = s;
        m[(2, 0)] = -s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Compose: `self` then `other` (self * other).
    ///
    /// Applying the result to a point applies `other` first.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Prepend a translation: the result maps `x` to `self(x) + v`.
    pub fn pretranslate(&self, v: &Vec3) -> Self {
        let mut m = self.matrix;
        m[(0, 3)] += v.x;
        m[(1, 3)] += v.y;
        m[(2, 3)] += v.z;
        Self { matrix: m }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// The upper-left 3x3 (linear) part.
    pub fn linear(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// The translation column.
    pub fn translation_vector(&self) -> Vec3 {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Inverse of a rigid transform, computed as `(R^T, -R^T t)`.
    ///
    /// Only meaningful when the linear part is orthonormal.
    pub fn rigid_inverse(&self) -> Self {
        let rt = self.linear().transpose();
        let t = -(rt * self.translation_vector());
        Self::from_parts(&rt, &t)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance in meters.
    pub linear: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
}

impl Tolerance {
    /// Default optical tolerances (1e-12 m linear, 1e-12 rad angular).
    pub const DEFAULT: Self = Self {
        linear: 1e-12,
        angular: 1e-12,
    };

    /// Check if two unit directions are perpendicular within the angular tolerance.
    pub fn is_perpendicular(&self, a: &Dir3, b: &Dir3) -> bool {
        a.dot(b).abs() < self.angular
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Below this magnitude the series expansions are used instead of the closed forms.
const SERIES_THRESHOLD: f64 = 0.01;

/// `(1 - sqrt(1 - x)) / x` as a Taylor polynomial, valid for small `|x|`.
fn deficit_series(x: f64) -> f64 {
    0.5 + x
        * (0.125
            + x * (0.0625
                + x * (0.0390625 + x * (0.02734375 + x * (0.0205078125 + x * 0.01611328125)))))
}

/// Computes `1 - sqrt(1 - x)` without catastrophic cancellation near `x = 0`.
///
/// Weakly curved surfaces produce very small `x` when solving for the
/// intercept distance; the direct formula then loses all significant digits.
pub fn one_minus_sqrt_one_minus_x(x: f64) -> f64 {
    if x.abs() > SERIES_THRESHOLD {
        1.0 - (1.0 - x).sqrt()
    } else {
        x * deficit_series(x)
    }
}

/// Computes `(1 - sqrt(1 - x)) / x`, continuous at `x = 0` where it equals 1/2.
pub fn sqrt_deficit_ratio(x: f64) -> f64 {
    if x.abs() > SERIES_THRESHOLD {
        (1.0 - (1.0 - x).sqrt()) / x
    } else {
        deficit_series(x)
    }
}
