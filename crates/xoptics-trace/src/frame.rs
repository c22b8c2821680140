//! Reference frames of a surface in the optical chain.
//!
//! Each surface sees three frames:
//!
//! - the *local absolute* frame: laboratory orientation, origin at the
//!   surface. Rays are stored in this frame.
//! - the *exit* frame: the alignment axis leaving the surface, chained from
//!   the previous surface's exit frame.
//! - the *surface* frame: where the shape equation is written. Its Z axis is
//!   the surface normal at the apex; for reflective surfaces X is the
//!   tangential axis.

use xoptics_math::{Mat3, Transform, Vec3};

use crate::error::Result;
use crate::params::ParameterSet;

/// Alignment parameters of one surface, read from its [`ParameterSet`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Alignment {
    /// Distance from the previous surface along the incoming axis.
    pub distance: f64,
    /// Grazing angle.
    pub theta: f64,
    /// Azimuth of the deviation plane around the incoming axis.
    pub phi: f64,
    /// Rotation of the surface about its own normal.
    pub psi: f64,
    /// Grazing angle error.
    pub dtheta: f64,
    /// Azimuth error.
    pub dphi: f64,
    /// In-plane rotation error.
    pub dpsi: f64,
    /// Surface decentering along X.
    pub dx: f64,
    /// Surface decentering along Y.
    pub dy: f64,
    /// Surface decentering along Z.
    pub dz: f64,
}

impl Alignment {
    /// Reads the alignment entries of a parameter set.
    pub fn from_parameters(params: &ParameterSet) -> Result<Self> {
        Ok(Self {
            distance: params.value("distance")?,
            theta: params.value("theta")?,
            phi: params.value("phi")?,
            psi: params.value("psi")?,
            dtheta: params.value("Dtheta")?,
            dphi: params.value("Dphi")?,
            dpsi: params.value("Dpsi")?,
            dx: params.value("DX")?,
            dy: params.value("DY")?,
            dz: params.value("DZ")?,
        })
    }
}

/// Frame transforms computed at alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceFrames {
    /// Offset from the previous surface to this one, in the laboratory frame.
    pub translation_from_previous: Vec3,
    /// Exit frame in the laboratory frame.
    pub exit_frame: Transform,
    /// Surface frame to local absolute frame.
    pub surface_direct: Transform,
    /// Local absolute frame to surface frame.
    pub surface_inverse: Transform,
}

impl Default for SurfaceFrames {
    fn default() -> Self {
        Self {
            translation_from_previous: Vec3::zeros(),
            exit_frame: Transform::identity(),
            surface_direct: Transform::identity(),
            surface_inverse: Transform::identity(),
        }
    }
}

impl SurfaceFrames {
    /// Computes the frames of a surface whose input frame is `input` (the
    /// previous exit frame, identity for the first surface).
    pub fn compute(input: &Transform, alignment: &Alignment, reflective: bool) -> Self {
        let input_rotation = input.linear();
        let translation_from_previous = input_rotation.column(2) * alignment.distance;

        let mut exit = Transform::from_linear(&input_rotation).then(&Transform::rotation_z(alignment.phi));
        if reflective {
            exit = exit.then(&Transform::rotation_x(-2.0 * alignment.theta));
        }
        let exit_frame = Transform::from_parts(
            &exit.linear(),
            &(input.translation_vector() + translation_from_previous),
        );

        let mut direct = Transform::from_linear(&input_rotation)
            .then(&Transform::rotation_z(alignment.phi + alignment.dphi))
            .then(&Transform::rotation_x(-(alignment.theta + alignment.dtheta)));
        if reflective {
            direct = direct.then(&Transform::from_linear(&flip()));
        }
        let surface_direct = direct
            .then(&Transform::rotation_z(alignment.psi + alignment.dpsi))
            .pretranslate(&Vec3::new(alignment.dx, alignment.dy, alignment.dz));
        let surface_inverse = surface_direct.rigid_inverse();

        Self {
            translation_from_previous,
            exit_frame,
            surface_direct,
            surface_inverse,
        }
    }

    /// Rotation of the exit frame.
    pub fn exit_rotation(&self) -> Mat3 {
        self.exit_frame.linear()
    }

    /// Inverse rotation of the exit frame (local absolute to aligned local).
    pub fn frame_inverse(&self) -> Mat3 {
        self.exit_frame.linear().transpose()
    }
}

/// Cyclic permutation sending X to Z, Y to X and Z to Y.
fn flip() -> Mat3 {
    Mat3::new(
        0.0, 1.0, 0.0, //
        0.0, 0.0, 1.0, //
        1.0, 0.0, 0.0,
    )
}
