//! Quadric surfaces.
//!
//! A quadric is the zero set of `Xᵀ M X` for homogeneous points `X = (x, y, z, 1)`
//! and a symmetric 4x4 matrix `M`. All quadrics here pass through the origin
//! of their surface frame with normal +Z there, so the constant term of `M`
//! is zero and a zero curvature leaves the plane `-2z = 0`.

use tracing::{instrument, trace};
use xoptics_math::{one_minus_sqrt_one_minus_x, sqrt_deficit_ratio, Mat4, Transform, Vec3};

use super::{Shape, ShapeKind};
use crate::error::{Result, TraceError};
use crate::frame::SurfaceFrames;
use crate::params::{Parameter, ParameterSet, UnitKind};
use crate::ray::Ray;

/// Threshold on `|q| = |a c / b²|` below which the root is computed from the
/// series form, which stays finite when `a` vanishes.
const SERIES_SWITCH: f64 = 0.01;

/// The quadric families and their defining parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuadricKind {
    /// Sphere tangent to the XY plane at the origin.
    Sphere {
        /// Inverse radius (m⁻¹).
        curvature: f64,
    },
    /// Circular cylinder tangent to the XY plane at the origin.
    Cylinder {
        /// Inverse radius (m⁻¹).
        curvature: f64,
        /// Angle between the X axis and the direction of curvature.
        axis_angle: f64,
    },
    /// Cone with the X axis as a generatrix and its apex at `(apex_distance, 0, 0)`.
    Cone {
        /// Curvature of the directrix circle through the origin (m⁻¹).
        curvature: f64,
        /// Tilt of the directrix plane about Y, from the YZ plane.
        directrix_angle: f64,
        /// Signed distance from the origin to the apex along X (m).
        apex_distance: f64,
    },
    /// Cylinder of conic section, with foci at `(cos θ0, -sin θ0) / invp` and
    /// `(cos θ0, sin θ0) / invq` in the XZ plane.
    ///
    /// The section is an ellipse when `invp * invq < 0`, a hyperbola when it
    /// is positive and a parabola when either is zero.
    ConicBaseCylinder {
        /// Signed inverse distance of the entrance focus (m⁻¹).
        invp: f64,
        /// Signed inverse distance of the exit focus (m⁻¹).
        invq: f64,
        /// Grazing angle at the origin.
        theta0: f64,
    },
    /// Quadric of revolution about the axis through the same two foci.
    RevolutionQuadric {
        /// Signed inverse distance of the entrance focus (m⁻¹).
        invp: f64,
        /// Signed inverse distance of the exit focus (m⁻¹).
        invq: f64,
        /// Grazing angle at the origin.
        theta0: f64,
    },
}

impl QuadricKind {
    /// The shape kind tag.
    pub fn shape_kind(&self) -> ShapeKind {
        match self {
            QuadricKind::Sphere { .. } => ShapeKind::Sphere,
            QuadricKind::Cylinder { .. } => ShapeKind::Cylinder,
            QuadricKind::Cone { .. } => ShapeKind::Cone,
            QuadricKind::ConicBaseCylinder { .. } => ShapeKind::ConicBaseCylinder,
            QuadricKind::RevolutionQuadric { .. } => ShapeKind::RevolutionQuadric,
        }
    }

    /// Named parameters with their units, in declaration order.
    pub fn parameters(&self) -> Vec<(&'static str, f64, UnitKind)> {
        match *self {
            QuadricKind::Sphere { curvature } => {
                vec![("curvature", curvature, UnitKind::InverseDistance)]
            }
            QuadricKind::Cylinder {
                curvature,
                axis_angle,
            } => vec![
                ("curvature", curvature, UnitKind::InverseDistance),
                ("axis_angle", axis_angle, UnitKind::Angle),
            ],
            QuadricKind::Cone {
                curvature,
                directrix_angle,
                apex_distance,
            } => vec![
                ("curvature", curvature, UnitKind::InverseDistance),
                ("directrix_angle", directrix_angle, UnitKind::Angle),
                ("apex_distance", apex_distance, UnitKind::Distance),
            ],
            QuadricKind::ConicBaseCylinder { invp, invq, theta0 }
            | QuadricKind::RevolutionQuadric { invp, invq, theta0 } => vec![
                ("invp", invp, UnitKind::InverseDistance),
                ("invq", invq, UnitKind::InverseDistance),
                ("theta0", theta0, UnitKind::Angle),
            ],
        }
    }

    /// The same family with values read from `params`.
    pub fn with_parameters(&self, params: &ParameterSet) -> Result<Self> {
        let get = |name: &str| {
            params
                .value(name)
                .map_err(|_| TraceError::parameter(name, "parameter not found"))
        };
        Ok(match self {
            QuadricKind::Sphere { .. } => QuadricKind::Sphere {
                curvature: get("curvature")?,
            },
            QuadricKind::Cylinder { .. } => QuadricKind::Cylinder {
                curvature: get("curvature")?,
                axis_angle: get("axis_angle")?,
            },
            QuadricKind::Cone { .. } => QuadricKind::Cone {
                curvature: get("curvature")?,
                directrix_angle: get("directrix_angle")?,
                apex_distance: get("apex_distance")?,
            },
            QuadricKind::ConicBaseCylinder { .. } => QuadricKind::ConicBaseCylinder {
                invp: get("invp")?,
                invq: get("invq")?,
                theta0: get("theta0")?,
            },
            QuadricKind::RevolutionQuadric { .. } => QuadricKind::RevolutionQuadric {
                invp: get("invp")?,
                invq: get("invq")?,
                theta0: get("theta0")?,
            },
        })
    }

    /// The quadric matrix in the surface frame.
    pub fn local_matrix(&self) -> Result<Mat4> {
        match *self {
            QuadricKind::Sphere { curvature } => {
                let mut m = plane_form();
                for i in 0..3 {
                    m[(i, i)] = curvature;
                }
                Ok(m)
            }
            QuadricKind::Cylinder {
                curvature,
                axis_angle,
            } => {
                let (s, c) = axis_angle.sin_cos();
                let mut m = plane_form();
                m[(0, 0)] = c * c * curvature;
                m[(0, 1)] = c * s * curvature;
                m[(1, 0)] = c * s * curvature;
                m[(1, 1)] = s * s * curvature;
                m[(2, 2)] = curvature;
                Ok(m)
            }
            QuadricKind::Cone {
                curvature,
                directrix_angle,
                apex_distance,
            } => {
                if curvature == 0.0 {
                    return Ok(plane_form());
                }
                if apex_distance == 0.0 {
                    return Err(TraceError::parameter(
                        "apex_distance",
                        "a curved cone needs a non-zero apex distance",
                    ));
                }
                let k = apex_distance * curvature;
                let cos = directrix_angle.cos();
                let mut m = Mat4::zeros();
                m[(1, 1)] = k;
                m[(2, 2)] = k / (cos * cos) + 2.0 * directrix_angle.tan();
                m[(0, 2)] = 1.0;
                m[(2, 0)] = 1.0;
                m[(2, 3)] = -apex_distance;
                m[(3, 2)] = -apex_distance;
                Ok(m)
            }
            QuadricKind::ConicBaseCylinder { invp, invq, theta0 } => {
                off_axis_conic(invp, invq, theta0, false)
            }
            QuadricKind::RevolutionQuadric { invp, invq, theta0 } => {
                off_axis_conic(invp, invq, theta0, true)
            }
        }
    }
}

/// The plane `z = 0` written as the quadric `-2z = 0`.
fn plane_form() -> Mat4 {
    let mut m = Mat4::zeros();
    m[(2, 3)] = -1.0;
    m[(3, 2)] = -1.0;
    m
}

/// Off-axis conic through the origin with the foci of [`QuadricKind::ConicBaseCylinder`].
///
/// The conic is built in its axis frame and rotated by `phi` about Y. The
/// cylinder form normalizes the sign of `phi` by the sign of `invp * invq`.
fn off_axis_conic(invp: f64, invq: f64, theta0: f64, revolution: bool) -> Result<Mat4> {
    if (invp - invq).abs() < f64::EPSILON {
        return Err(TraceError::parameter("invq", "invp must not be equal to invq"));
    }
    let sin = theta0.sin();
    if sin == 0.0 {
        return Ok(plane_form());
    }
    let dpq = invp - invq;
    let phi = if revolution {
        ((invp + invq) * sin).atan2(dpq * theta0.cos())
    } else {
        let sgnpq = 1f64.copysign(invp * invq);
        ((invp + invq) * sgnpq * sin).atan2(dpq * sgnpq * theta0.cos())
    };

    let mut q = Mat4::zeros();
    q[(0, 0)] = 4.0 * invp * invq * sin * sin / dpq;
    q[(2, 2)] = -dpq;
    if revolution {
        q[(1, 1)] = -dpq;
    }
    q[(0, 3)] = -2.0 * sin * phi.sin();
    q[(3, 0)] = q[(0, 3)];
    q[(2, 3)] = -2.0 * sin * phi.cos();
    q[(3, 2)] = q[(2, 3)];

    let r = Transform::rotation_y(phi).matrix;
    Ok(r.transpose() * q * r)
}

/// A quadric surface solver.
#[derive(Debug, Clone, PartialEq)]
pub struct Quadric {
    kind: QuadricKind,
    local: Mat4,
    aligned: Mat4,
}

impl Quadric {
    /// A quadric of the given family.
    pub fn new(kind: QuadricKind) -> Result<Self> {
        let local = kind.local_matrix()?;
        Ok(Self {
            kind,
            local,
            aligned: local,
        })
    }

    /// Sphere of the given curvature.
    pub fn sphere(curvature: f64) -> Result<Self> {
        Self::new(QuadricKind::Sphere { curvature })
    }

    /// Cylinder of the given curvature and axis angle.
    pub fn cylinder(curvature: f64, axis_angle: f64) -> Result<Self> {
        Self::new(QuadricKind::Cylinder {
            curvature,
            axis_angle,
        })
    }

    /// Cone.
    pub fn cone(curvature: f64, directrix_angle: f64, apex_distance: f64) -> Result<Self> {
        Self::new(QuadricKind::Cone {
            curvature,
            directrix_angle,
            apex_distance,
        })
    }

    /// Conic-base cylinder.
    pub fn conic_base_cylinder(invp: f64, invq: f64, theta0: f64) -> Result<Self> {
        Self::new(QuadricKind::ConicBaseCylinder { invp, invq, theta0 })
    }

    /// Revolution quadric.
    pub fn revolution_quadric(invp: f64, invq: f64, theta0: f64) -> Result<Self> {
        Self::new(QuadricKind::RevolutionQuadric { invp, invq, theta0 })
    }

    /// The family and its current parameters.
    pub fn quadric_kind(&self) -> &QuadricKind {
        &self.kind
    }

    /// Matrix in the surface frame.
    pub fn local_matrix(&self) -> &Mat4 {
        &self.local
    }

    /// Matrix in the local absolute frame.
    pub fn aligned_matrix(&self) -> &Mat4 {
        &self.aligned
    }
}

impl Shape for Quadric {
    fn kind(&self) -> ShapeKind {
        self.kind.shape_kind()
    }

    fn define_parameters(&self, params: &mut ParameterSet) {
        for (name, value, unit) in self.kind.parameters() {
            params.define(name, Parameter::shape(value, unit));
        }
    }

    #[instrument(skip_all, fields(kind = ?self.kind.shape_kind()))]
    fn rebuild(&mut self, params: &ParameterSet) -> Result<()> {
        let kind = self.kind.with_parameters(params)?;
        let local = kind.local_matrix()?;
        self.kind = kind;
        self.local = local;
        Ok(())
    }

    fn align(&mut self, frames: &SurfaceFrames, _wavelength: f64) -> Result<()> {
        let inv = frames.surface_inverse.matrix;
        self.aligned = inv.transpose() * self.local * inv;
        Ok(())
    }

    fn intercept(&self, ray: &mut Ray) -> Result<Option<Vec3>> {
        let start = -ray.direction.dot(&ray.origin.coords);
        ray.move_to(start).rebase();

        let x = ray.origin.to_homogeneous();
        let u = ray.direction.to_homogeneous();
        let mx = self.aligned * x;
        let mu = self.aligned * u;
        let a = u.dot(&mu);
        let b = u.dot(&mx);
        let c = x.dot(&mx);

        let t = if b == 0.0 {
            if c == 0.0 {
                0.0
            } else if a * c < 0.0 {
                // symmetric roots; keep the one ahead of the ray
                (-c / a).sqrt()
            } else {
                ray.kill();
                return Ok(None);
            }
        } else {
            let q = a * c / (b * b);
            if q > 1.0 {
                trace!(q, "quadric missed");
                ray.kill();
                return Ok(None);
            }
            if q.abs() > SERIES_SWITCH {
                -(b / a) * one_minus_sqrt_one_minus_x(q)
            } else {
                -(c / b) * sqrt_deficit_ratio(q)
            }
        };

        let gradient = mx + mu * t;
        let normal = -Vec3::new(gradient.x, gradient.y, gradient.z);
        let norm = normal.norm();
        if norm == 0.0 {
            return Err(TraceError::Geometry("quadric normal is undefined at the intercept".into()));
        }
        ray.move_to(t).rebase();
        Ok(Some(normal / norm))
    }

    fn clone_box(&self) -> Box<dyn Shape> {
        Box::new(self.clone())
    }
}
