//! Flat surfaces.

use xoptics_math::{Dir3, Point3, Vec3};

use super::{Shape, ShapeKind};
use crate::error::Result;
use crate::frame::SurfaceFrames;
use crate::params::ParameterSet;
use crate::ray::Ray;

/// The plane `z = 0` of the surface frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    normal: Dir3,
    point: Point3,
}

impl Plane {
    /// A plane not yet aligned (the XY plane of the local frame).
    pub fn new() -> Self {
        Self::default()
    }

    /// Aligned unit normal.
    pub fn normal(&self) -> &Dir3 {
        &self.normal
    }

    /// Aligned point of the plane.
    pub fn point(&self) -> &Point3 {
        &self.point
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self {
            normal: Vec3::z_axis(),
            point: Point3::origin(),
        }
    }
}

impl Shape for Plane {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Plane
    }

    fn define_parameters(&self, _params: &mut ParameterSet) {}

    fn rebuild(&mut self, _params: &ParameterSet) -> Result<()> {
        Ok(())
    }

    fn align(&mut self, frames: &SurfaceFrames, _wavelength: f64) -> Result<()> {
        self.normal = Dir3::new_normalize(frames.surface_direct.apply_vec(&Vec3::z()));
        self.point = frames.surface_direct.apply_point(&Point3::origin());
        Ok(())
    }

    fn intercept(&self, ray: &mut Ray) -> Result<Option<Vec3>> {
        if !ray.move_to_plane(&self.normal, &self.point) {
            ray.kill();
            return Ok(None);
        }
        ray.rebase();
        Ok(Some(self.normal.into_inner()))
    }

    fn clone_box(&self) -> Box<dyn Shape> {
        Box::new(self.clone())
    }
}
