//! Toroidal surfaces.
//!
//! The toroid tangent to the XY plane at the origin is described with an
//! auxiliary height `h` as the intersection of two quadrics of the 5D
//! homogeneous space `(x, y, z, h, 1)`:
//!
//! ```text
//! minor: minor_curvature (y² + h²) - 2h = 0
//! major: major_curvature (x² + z² - h²) - 2z + 2h = 0
//! ```
//!
//! The first gives `h` as the sag of the minor circle at `y`; the second
//! sweeps the circle of radius `1/major_curvature - h` in the XZ plane.
//! Along a ray the unknowns reduce to `(t, h)` and the intercept is a
//! two-conic intersection.

use nalgebra::{SMatrix, SVector};
use tracing::{instrument, trace};
use xoptics_math::Vec3;

use super::conic::intersect_conics;
use super::{Shape, ShapeKind};
use crate::error::{Result, TraceError};
use crate::frame::SurfaceFrames;
use crate::params::{Parameter, ParameterSet, UnitKind};
use crate::ray::Ray;

type Mat5 = SMatrix<f64, 5, 5>;
type Vec5 = SVector<f64, 5>;
type RayEmbedding = SMatrix<f64, 5, 3>;

/// A toroid solver.
#[derive(Debug, Clone, PartialEq)]
pub struct Toroid {
    minor_curvature: f64,
    major_curvature: f64,
    local_minor: Mat5,
    local_major: Mat5,
    aligned_minor: Mat5,
    aligned_major: Mat5,
}

impl Toroid {
    /// A toroid with the given sagittal (minor) and tangential (major) curvatures.
    pub fn new(minor_curvature: f64, major_curvature: f64) -> Self {
        let (local_minor, local_major) = local_forms(minor_curvature, major_curvature);
        Self {
            minor_curvature,
            major_curvature,
            local_minor,
            local_major,
            aligned_minor: local_minor,
            aligned_major: local_major,
        }
    }

    /// Curvature of the generating circle.
    pub fn minor_curvature(&self) -> f64 {
        self.minor_curvature
    }

    /// Curvature of the sweep circle through the origin.
    pub fn major_curvature(&self) -> f64 {
        self.major_curvature
    }
}

fn local_forms(minor: f64, major: f64) -> (Mat5, Mat5) {
    let mut m1 = Mat5::zeros();
    m1[(1, 1)] = minor;
    m1[(3, 3)] = minor;
    m1[(3, 4)] = -1.0;
    m1[(4, 3)] = -1.0;

    let mut m2 = Mat5::zeros();
    m2[(0, 0)] = major;
    m2[(2, 2)] = major;
    m2[(3, 3)] = -major;
    m2[(2, 4)] = -1.0;
    m2[(4, 2)] = -1.0;
    m2[(3, 4)] = 1.0;
    m2[(4, 3)] = 1.0;
    (m1, m2)
}

impl Shape for Toroid {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Toroid
    }

    fn define_parameters(&self, params: &mut ParameterSet) {
        params.define(
            "minor_curvature",
            Parameter::shape(self.minor_curvature, UnitKind::InverseDistance),
        );
        params.define(
            "major_curvature",
            Parameter::shape(self.major_curvature, UnitKind::InverseDistance),
        );
    }

    #[instrument(skip_all)]
    fn rebuild(&mut self, params: &ParameterSet) -> Result<()> {
        let minor = params
            .value("minor_curvature")
            .map_err(|_| TraceError::parameter("minor_curvature", "parameter not found"))?;
        let major = params
            .value("major_curvature")
            .map_err(|_| TraceError::parameter("major_curvature", "parameter not found"))?;
        let (m1, m2) = local_forms(minor, major);
        self.minor_curvature = minor;
        self.major_curvature = major;
        self.local_minor = m1;
        self.local_major = m2;
        Ok(())
    }

    fn align(&mut self, frames: &SurfaceFrames, _wavelength: f64) -> Result<()> {
        // the auxiliary h coordinate is untouched by the rigid motion
        let inverse = &frames.surface_inverse;
        let mut t = Mat5::identity();
        t.fixed_view_mut::<3, 3>(0, 0).copy_from(&inverse.linear());
        t.fixed_view_mut::<3, 1>(0, 4).copy_from(&inverse.translation_vector());
        self.aligned_minor = t.transpose() * self.local_minor * t;
        self.aligned_major = t.transpose() * self.local_major * t;
        Ok(())
    }

    fn intercept(&self, ray: &mut Ray) -> Result<Option<Vec3>> {
        let start = -ray.direction.dot(&ray.origin.coords);
        ray.move_to(start).rebase();

        let u = ray.direction.into_inner();
        let x = ray.origin.coords;
        // (t, h, 1) -> (x + t u, h, 1)
        let mut embed = RayEmbedding::zeros();
        embed.fixed_view_mut::<3, 1>(0, 0).copy_from(&u);
        embed.fixed_view_mut::<3, 1>(0, 2).copy_from(&x);
        embed[(3, 1)] = 1.0;
        embed[(4, 2)] = 1.0;

        let c1 = embed.transpose() * self.aligned_minor * embed;
        let c2 = embed.transpose() * self.aligned_major * embed;
        let solutions = intersect_conics(&c1, &c2)?;

        let Some(best) = solutions
            .iter()
            .min_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))
        else {
            trace!("toroid missed");
            ray.kill();
            return Ok(None);
        };

        let point: Vec5 = embed * nalgebra::Vector3::new(best.x, best.y, 1.0);
        let n1 = self.aligned_minor * point;
        let n2 = self.aligned_major * point;
        let combined = n2 * n1[3] - n1 * n2[3];
        let normal = Vec3::new(combined[0], combined[1], combined[2]);
        let norm = normal.norm();
        if norm == 0.0 {
            return Err(TraceError::Geometry("toroid normal is undefined at the intercept".into()));
        }

        ray.move_to(best.x).rebase();
        Ok(Some(normal / norm))
    }

    fn clone_box(&self) -> Box<dyn Shape> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Alignment;
    use xoptics_math::{Point3, Transform};

    /// Height of the toroid surface, from its geometric construction.
    fn sag(x: f64, y: f64, minor: f64, major: f64) -> f64 {
        let (r, big_r) = (1.0 / minor, 1.0 / major);
        let h = y * y / (r + (r * r - y * y).sqrt());
        (x * x + 2.0 * big_r * h - h * h) / (big_r + ((big_r - h).powi(2) - x * x).sqrt())
    }

    fn aligned(minor: f64, major: f64) -> Toroid {
        let mut toroid = Toroid::new(minor, major);
        toroid.align(&SurfaceFrames::default(), 1e-10).unwrap();
        toroid
    }

    fn shoot(toroid: &Toroid, origin: Point3, direction: Vec3) -> (Ray, Option<Vec3>) {
        let mut ray = Ray::new(origin, direction, 1e-10);
        let normal = toroid.intercept(&mut ray).unwrap();
        (ray, normal)
    }

    #[test]
    fn test_apex() {
        let toroid = aligned(20.0, 0.01);
        let (ray, normal) = shoot(&toroid, Point3::new(0.0, 0.0, -1.0), Vec3::z());
        assert!(ray.origin.coords.norm() < 1e-15);
        assert!((normal.unwrap() - Vec3::z()).norm() < 1e-12);
    }

    #[test]
    fn test_flat_minor_matches_circle() {
        // zero minor curvature leaves a cylinder of radius 1/major along Y
        let major = 0.5;
        let toroid = aligned(0.0, major);
        for x0 in [0.0, 0.3, 1.2] {
            let (ray, normal) = shoot(&toroid, Point3::new(x0, 0.4, -3.0), Vec3::z());
            let r = 1.0 / major;
            let expected = r - (r * r - x0 * x0).sqrt();
            assert!(ray.alive);
            assert!((ray.origin.z - expected).abs() < 1e-12);
            let radial = (Point3::new(0.0, 0.4, r) - ray.origin).normalize();
            assert!((normal.unwrap() - radial).norm() < 1e-12);
        }
    }

    #[test]
    fn test_axial_rays_match_geometry() {
        let (minor, major) = (2.0, 0.5);
        let toroid = aligned(minor, major);
        for (x, y) in [(0.01, 0.02), (0.2, -0.1), (-0.3, 0.25)] {
            let (ray, _) = shoot(&toroid, Point3::new(x, y, -1.0), Vec3::z());
            assert!((ray.origin.z - sag(x, y, minor, major)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_tilted_rays_at_mirror_scale() {
        // 5 cm sagittal radius, 100 m tangential radius
        let (minor, major) = (20.0, 0.01);
        let toroid = aligned(minor, major);
        let rays = [
            (Point3::new(0.003, -0.01, -1.0), Vec3::new(0.01, 0.02, 1.0)),
            (Point3::new(0.05, 0.01, -2.0), Vec3::new(-0.02, 0.005, 1.0)),
            (Point3::new(-0.02, 0.0, -0.5), Vec3::new(0.0, -0.03, 1.0)),
        ];
        for (origin, direction) in rays {
            let (ray, normal) = shoot(&toroid, origin, direction);
            assert!(ray.alive);
            let p = ray.origin;
            assert!((p.z - sag(p.x, p.y, minor, major)).abs() < 1e-12);

            // normal against the finite-difference gradient of the sag
            let e = 1e-7;
            let zx = (sag(p.x + e, p.y, minor, major) - sag(p.x - e, p.y, minor, major)) / (2.0 * e);
            let zy = (sag(p.x, p.y + e, minor, major) - sag(p.x, p.y - e, minor, major)) / (2.0 * e);
            let expected = Vec3::new(-zx, -zy, 1.0).normalize();
            assert!((normal.unwrap() - expected).norm() < 1e-6);
        }
    }

    #[test]
    fn test_miss_outside_minor_circle() {
        let toroid = aligned(20.0, 0.01);
        let (ray, normal) = shoot(&toroid, Point3::new(0.0, 0.08, -1.0), Vec3::z());
        assert!(normal.is_none());
        assert!(!ray.alive);
    }

    #[test]
    fn test_decentered_alignment() {
        let mut toroid = Toroid::new(2.0, 0.5);
        let alignment = Alignment {
            dx: 0.1,
            dy: -0.05,
            ..Default::default()
        };
        let frames = SurfaceFrames::compute(&Transform::identity(), &alignment, false);
        toroid.align(&frames, 1e-10).unwrap();
        // the apex moved with the decentering
        let (ray, normal) = shoot(&toroid, Point3::new(0.1, -0.05, -1.0), Vec3::z());
        assert!((ray.origin - Point3::new(0.1, -0.05, 0.0)).norm() < 1e-12);
        assert!((normal.unwrap() - Vec3::z()).norm() < 1e-12);
    }

    #[test]
    fn test_rebuild_from_parameters() {
        let mut toroid = Toroid::new(1.0, 0.1);
        let mut params = ParameterSet::new();
        toroid.define_parameters(&mut params);
        params.set("major_curvature", 0.2).unwrap();
        toroid.rebuild(&params).unwrap();
        assert_eq!(toroid.major_curvature(), 0.2);
        assert_eq!(toroid.minor_curvature(), 1.0);
        assert!(toroid.rebuild(&ParameterSet::new()).is_err());
    }
}
