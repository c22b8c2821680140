//! Polarized ray representation.

use nalgebra::Complex;
use xoptics_math::{Dir3, Point3, Tolerance, Transform, Vec3};

/// A polarized ray.
///
/// The current position is `origin + distance * direction`; intercepts leave
/// the ray [rebased](Ray::rebase) so that its origin is the impact point.
/// Amplitudes are expressed on the `(s, p)` basis where `p = direction × s`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ray {
    /// Origin point.
    pub origin: Point3,
    /// Unit propagation direction.
    pub direction: Dir3,
    /// Path parameter of the current position from the origin.
    pub distance: f64,
    /// Whether the ray still propagates.
    pub alive: bool,
    /// Wavelength in meters.
    pub wavelength: f64,
    /// Complex amplitude along the s vector.
    pub amplitude_s: Complex<f64>,
    /// Complex amplitude along the p vector.
    pub amplitude_p: Complex<f64>,
    /// Unit s polarization vector, perpendicular to `direction`.
    pub s_vector: Vec3,
}

impl Ray {
    /// Creates a live, s-polarized ray of unit amplitude.
    ///
    /// The direction is normalized. The s vector is the X axis projected
    /// perpendicular to the direction, or the Y axis for rays along X.
    pub fn new(origin: Point3, direction: Vec3, wavelength: f64) -> Self {
        let direction = Dir3::new_normalize(direction);
        Self {
            origin,
            direction,
            distance: 0.0,
            alive: true,
            wavelength,
            amplitude_s: Complex::new(1.0, 0.0),
            amplitude_p: Complex::new(0.0, 0.0),
            s_vector: default_s_vector(&direction),
        }
    }

    /// Point at path parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + t * self.direction.as_ref()
    }

    /// Current position.
    #[inline]
    pub fn position(&self) -> Point3 {
        self.at(self.distance)
    }

    /// Sets the path parameter of the current position.
    pub fn move_to(&mut self, distance: f64) -> &mut Self {
        self.distance = distance;
        self
    }

    /// Moves the origin to the current position and resets the distance.
    pub fn rebase(&mut self) -> &mut Self {
        self.origin = self.position();
        self.distance = 0.0;
        self
    }

    /// Moves to the intersection with the plane through `point` with normal
    /// `normal`. Returns `false`, leaving the ray unchanged, if the ray is
    /// parallel to the plane.
    pub fn move_to_plane(&mut self, normal: &Dir3, point: &Point3) -> bool {
        if Tolerance::DEFAULT.is_perpendicular(&self.direction, normal) {
            return false;
        }
        let t = (point - self.origin).dot(normal) / self.direction.dot(normal);
        self.distance = t;
        true
    }

    /// Translates the origin by `v`.
    pub fn translate(&mut self, v: &Vec3) -> &mut Self {
        self.origin += v;
        self
    }

    /// Marks the ray dead.
    pub fn kill(&mut self) {
        self.alive = false;
    }

    /// The p polarization vector, `direction × s`.
    pub fn p_vector(&self) -> Vec3 {
        self.direction.cross(&self.s_vector)
    }

    /// Total intensity `|A_s|² + |A_p|²`.
    pub fn intensity(&self) -> f64 {
        self.amplitude_s.norm_sqr() + self.amplitude_p.norm_sqr()
    }

    /// Multiplies both amplitudes by a real factor.
    pub fn scale_amplitudes(&mut self, factor: f64) {
        self.amplitude_s *= factor;
        self.amplitude_p *= factor;
    }

    /// Orthogonal projection of `point` on the ray line.
    pub fn projection(&self, point: &Point3) -> Point3 {
        let t = (point - self.origin).dot(&self.direction);
        self.at(t)
    }

    /// The ray expressed through a rigid transform.
    pub fn transformed(&self, transform: &Transform) -> Self {
        Self {
            origin: transform.apply_point(&self.origin),
            direction: Dir3::new_normalize(transform.apply_vec(self.direction.as_ref())),
            s_vector: transform.apply_vec(&self.s_vector),
            ..self.clone()
        }
    }
}

fn default_s_vector(direction: &Dir3) -> Vec3 {
    let d = direction.as_ref();
    let x = Vec3::x();
    let s = x - d * d.dot(&x);
    if s.norm() > 1e-9 {
        s.normalize()
    } else {
        let y = Vec3::y();
        (y - d * d.dot(&y)).normalize()
    }
}
