//! Surface shapes and their ray intercept solvers.
//!
//! A shape is defined in its own surface frame by a few named parameters.
//! Alignment maps that definition into the local absolute frame of the
//! surface, where [`Shape::intercept`] finds the first intersection of a ray
//! and the surface normal there.
//!
//! - [`Plane`]: flat surfaces
//! - [`Quadric`]: spheres, cylinders, cones and off-axis conics ([`QuadricKind`])
//! - [`Toroid`]: toroidal surfaces, solved as the intersection of two quadrics

mod conic;
mod plane;
mod quadric;
mod toroid;

pub use conic::intersect_conics;
pub use plane::Plane;
pub use quadric::{Quadric, QuadricKind};
pub use toroid::Toroid;

use std::fmt;

use serde::{Deserialize, Serialize};
use xoptics_math::Vec3;

use crate::error::Result;
use crate::frame::SurfaceFrames;
use crate::params::ParameterSet;
use crate::ray::Ray;

/// Shape kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    /// Flat surface.
    Plane,
    /// Sphere.
    Sphere,
    /// Cylinder with a tilted axis.
    Cylinder,
    /// Cone.
    Cone,
    /// Cylinder of conic section, used off-axis.
    ConicBaseCylinder,
    /// Off-axis quadric of revolution.
    RevolutionQuadric,
    /// Toroid.
    Toroid,
}

/// An intercept solver for one kind of surface.
pub trait Shape: fmt::Debug + Send + Sync {
    /// The kind of shape.
    fn kind(&self) -> ShapeKind;

    /// Adds the shape's parameters, with its current values, to `params`.
    fn define_parameters(&self, params: &mut ParameterSet);

    /// Rebuilds the local form from parameter values.
    ///
    /// On error the shape is left unchanged.
    fn rebuild(&mut self, params: &ParameterSet) -> Result<()>;

    /// Maps the local form into the local absolute frame of the surface.
    fn align(&mut self, frames: &SurfaceFrames, wavelength: f64) -> Result<()>;

    /// Moves `ray` to its intercept with the surface and rebases it there.
    ///
    /// The ray must be expressed in the local absolute frame. Returns the unit
    /// normal at the intercept, or `None` after marking the ray dead when the
    /// ray misses the surface.
    fn intercept(&self, ray: &mut Ray) -> Result<Option<Vec3>>;

    /// Clones the shape into a box.
    fn clone_box(&self) -> Box<dyn Shape>;
}

impl Clone for Box<dyn Shape> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
