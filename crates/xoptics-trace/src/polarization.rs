//! Polarization basis bookkeeping at reflections.

use xoptics_math::{Dir3, Vec3};

use crate::ray::Ray;

/// Below this norm `d × n` is treated as zero (normal incidence).
const NORMAL_INCIDENCE: f64 = 1e-12;

/// Reflects `ray` into `outgoing` on a surface of unit normal `normal`,
/// carrying its polarization.
///
/// The amplitudes are first re-expressed on the basis `(s', d × s')` where
/// `s' = (d × n) / |d × n|` is perpendicular to the plane of incidence. This
/// is a rotation about `d`, so the intensity is unchanged. After reflection
/// the p amplitude follows `d_out × s'`.
pub fn reflect(ray: &mut Ray, normal: &Vec3, outgoing: Dir3) {
    let d = ray.direction.into_inner();
    let cross = d.cross(normal);
    let norm = cross.norm();
    let s_new = if norm > NORMAL_INCIDENCE {
        cross / norm
    } else {
        ray.s_vector
    };

    let s_old = ray.s_vector;
    let p_old = d.cross(&s_old);
    let cos = s_old.dot(&s_new);
    let sin = p_old.dot(&s_new);
    let (a_s, a_p) = (ray.amplitude_s, ray.amplitude_p);
    ray.amplitude_s = a_s * cos + a_p * sin;
    ray.amplitude_p = a_p * cos - a_s * sin;

    ray.direction = outgoing;
    ray.s_vector = s_new;
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Complex;
    use xoptics_math::Point3;

    fn mirror(d: &Vec3, n: &Vec3) -> Dir3 {
        Dir3::new_normalize(d - n * (2.0 * d.dot(n)))
    }

    #[test]
    fn test_basis_rotation_preserves_intensity() {
        let mut ray = Ray::new(Point3::origin(), Vec3::z(), 1e-10);
        ray.amplitude_s = Complex::new(0.6, 0.1);
        ray.amplitude_p = Complex::new(-0.2, 0.7);
        let before = ray.intensity();

        let theta: f64 = 0.01;
        let normal = Vec3::new(0.3 * theta.cos(), theta.cos(), -theta.sin()).normalize();
        let out = mirror(&Vec3::z(), &normal);
        reflect(&mut ray, &normal, out);

        assert!((ray.intensity() - before).abs() < 1e-14);
        assert!(ray.s_vector.dot(ray.direction.as_ref()).abs() < 1e-14);
        assert!(ray.s_vector.dot(&normal).abs() < 1e-14);
        assert!((ray.s_vector.norm() - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_s_polarized_stays_s_in_vertical_deflection() {
        // deflection in the YZ plane: s = X is already perpendicular to the plane of incidence
        let mut ray = Ray::new(Point3::origin(), Vec3::z(), 1e-10);
        let theta: f64 = 0.02;
        let normal = Vec3::new(0.0, theta.cos(), -theta.sin());
        let out = mirror(&Vec3::z(), &normal);
        reflect(&mut ray, &normal, out);
        assert!((ray.amplitude_s.norm() - 1.0).abs() < 1e-14);
        assert!(ray.amplitude_p.norm() < 1e-14);
    }

    #[test]
    fn test_horizontal_deflection_swaps_roles() {
        // deflection in the XZ plane: the X-polarized field becomes p
        let mut ray = Ray::new(Point3::origin(), Vec3::z(), 1e-10);
        let theta: f64 = 0.02;
        let normal = Vec3::new(theta.cos(), 0.0, -theta.sin());
        let out = mirror(&Vec3::z(), &normal);
        reflect(&mut ray, &normal, out);
        assert!(ray.amplitude_s.norm() < 1e-14);
        assert!((ray.amplitude_p.norm() - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_normal_incidence_keeps_basis() {
        let mut ray = Ray::new(Point3::origin(), Vec3::z(), 1e-10);
        let normal = -Vec3::z();
        reflect(&mut ray, &normal, Dir3::new_normalize(-Vec3::z()));
        assert!((ray.s_vector - Vec3::x()).norm() < 1e-15);
        assert_eq!(ray.amplitude_s, Complex::new(1.0, 0.0));
    }
}
