//! Optical surfaces: alignment, ray propagation and impact recording.
//!
//! A [`Surface`] owns a [`Shape`] solver, the alignment and shape
//! parameters driving it, an [`ApertureStop`] and an optional
//! [`HeightErrorMap`]. Rays arrive expressed in the local absolute frame of
//! the previous surface; the surface shifts them into its own, intercepts,
//! applies the stop and the reflection, and records impacts.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};
use xoptics_aperture::ApertureStop;
use xoptics_math::{Dir3, Point2, Transform, Vec2, Vec3};

use crate::context::{ErrorStrategy, TraceContext};
use crate::error::{Result, TraceError};
use crate::frame::{Alignment, SurfaceFrames};
use crate::impact::{self, CausticDiagram, ImpactFrame, SpotDiagram};
use crate::params::{ParameterGroup, ParameterSet};
use crate::polarization;
use crate::ray::Ray;
use crate::shape::Shape;
use crate::surface_error::HeightErrorMap;

/// Which state of the ray a surface records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// Record nothing.
    #[default]
    None,
    /// Record the ray at the intercept, before the stop and the reflection.
    Input,
    /// Record the ray leaving the surface.
    Output,
}

/// One optical surface of a chain.
#[derive(Debug, Clone)]
pub struct Surface {
    name: String,
    reflective: bool,
    recording: RecordMode,
    params: ParameterSet,
    shape: Box<dyn Shape>,
    frames: SurfaceFrames,
    aligned: bool,
    impacts: Vec<Ray>,
    lost: usize,
    aperture: ApertureStop,
    aperture_active: bool,
    error_map: Option<HeightErrorMap>,
    spot_cache: Option<(f64, SpotDiagram)>,
}

impl Surface {
    /// A mirror.
    pub fn reflective(name: impl Into<String>, shape: impl Shape + 'static) -> Self {
        Self::with_shape(name.into(), Box::new(shape), true)
    }

    /// A surface rays go through undeviated (film, slit, screen).
    pub fn transmissive(name: impl Into<String>, shape: impl Shape + 'static) -> Self {
        Self::with_shape(name.into(), Box::new(shape), false)
    }

    /// A surface from an already boxed shape.
    pub fn with_shape(name: String, shape: Box<dyn Shape>, reflective: bool) -> Self {
        let mut params = ParameterSet::with_alignment();
        shape.define_parameters(&mut params);
        Self {
            name,
            reflective,
            recording: RecordMode::None,
            params,
            shape,
            frames: SurfaceFrames::default(),
            aligned: false,
            impacts: Vec::new(),
            lost: 0,
            aperture: ApertureStop::new(),
            aperture_active: true,
            error_map: None,
            spot_cache: None,
        }
    }

    /// Surface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the surface reflects rays.
    pub fn is_reflective(&self) -> bool {
        self.reflective
    }

    /// The shape solver.
    pub fn shape(&self) -> &dyn Shape {
        self.shape.as_ref()
    }

    /// Recording mode.
    pub fn recording(&self) -> RecordMode {
        self.recording
    }

    /// Sets the recording mode.
    pub fn set_recording(&mut self, mode: RecordMode) {
        self.recording = mode;
    }

    // -- parameters --

    /// All parameters of the surface.
    pub fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    /// The value of a parameter.
    pub fn parameter(&self, name: &str) -> Result<f64> {
        self.params.value(name)
    }

    /// Sets one parameter.
    ///
    /// The value is staged on a copy of the parameters and the shape is
    /// rebuilt from it; nothing changes unless both steps succeed. The
    /// surface must be aligned again before tracing.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> Result<()> {
        self.set_parameters([(name, value)])
    }

    /// Sets several parameters at once, with a single shape rebuild.
    pub fn set_parameters<'a>(
        &mut self,
        values: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Result<()> {
        let mut staged = self.params.clone();
        let mut shape_changed = false;
        for (name, value) in values {
            staged.set(name, value)?;
            shape_changed |= staged
                .get(name)
                .is_some_and(|p| p.group == ParameterGroup::Shape);
        }
        if shape_changed {
            let mut shape = self.shape.clone();
            shape.rebuild(&staged)?;
            self.shape = shape;
        }
        self.params = staged;
        self.aligned = false;
        Ok(())
    }

    // -- aperture and errors --

    /// The aperture stop, in the surface frame.
    pub fn aperture(&self) -> &ApertureStop {
        &self.aperture
    }

    /// Mutable access to the aperture stop.
    pub fn aperture_mut(&mut self) -> &mut ApertureStop {
        &mut self.aperture
    }

    /// Enables or disables this surface's stop.
    pub fn set_aperture_active(&mut self, active: bool) {
        self.aperture_active = active;
    }

    /// Whether this surface's stop is applied.
    pub fn is_aperture_active(&self) -> bool {
        self.aperture_active
    }

    /// Installs or removes the surface-height error map.
    pub fn set_error_map(&mut self, map: Option<HeightErrorMap>) {
        self.error_map = map;
    }

    /// The surface-height error map.
    pub fn error_map(&self) -> Option<&HeightErrorMap> {
        self.error_map.as_ref()
    }

    // -- alignment --

    /// Whether the frames are current.
    pub fn is_aligned(&self) -> bool {
        self.aligned
    }

    /// Frames computed by the last alignment.
    pub fn frames(&self) -> &SurfaceFrames {
        &self.frames
    }

    /// Computes the frames from the alignment parameters and aligns the shape.
    ///
    /// `previous_exit` is the exit frame of the previous surface; `None`
    /// places the surface after the laboratory origin.
    #[instrument(skip_all, fields(surface = %self.name))]
    pub fn align(&mut self, previous_exit: Option<&Transform>, wavelength: f64) -> Result<()> {
        let alignment = Alignment::from_parameters(&self.params)?;
        let input = previous_exit.cloned().unwrap_or_else(Transform::identity);
        let frames = SurfaceFrames::compute(&input, &alignment, self.reflective);
        self.shape
            .align(&frames, wavelength)
            .map_err(|e| e.at_surface(self.name.as_str()))?;
        self.frames = frames;
        self.aligned = true;
        trace!(distance = alignment.distance, theta = alignment.theta, "surface aligned");
        Ok(())
    }

    // -- propagation --

    /// Processes one ray arriving from the previous surface.
    ///
    /// Dead rays are carried through so that impact indices stay aligned
    /// across the chain; a ray dead after this surface counts as lost.
    pub fn process(&mut self, ray: &mut Ray, ctx: &TraceContext) -> Result<()> {
        if !self.aligned {
            return Err(TraceError::NotAligned(self.name.clone()));
        }
        let was_alive = ray.alive;
        let outcome = if self.reflective {
            self.reflect(ray, ctx)
        } else {
            self.transmit(ray, ctx)
        };
        outcome.map_err(|e| e.at_surface(self.name.as_str()))?;
        if !ray.alive {
            self.lost += 1;
            if was_alive {
                debug!(surface = %self.name, "ray lost");
            }
        }
        Ok(())
    }

    /// Shifts the ray into this surface's frame and intercepts it.
    ///
    /// Returns the normal, or `None` when the ray is dead (on arrival or
    /// after missing). Dead rays are recorded if recording is on.
    fn enter(&mut self, ray: &mut Ray) -> Result<Option<Vec3>> {
        ray.translate(&-self.frames.translation_from_previous);
        if !ray.alive {
            self.record_dead(ray);
            return Ok(None);
        }
        match self.shape.intercept(ray)? {
            Some(normal) => Ok(Some(normal)),
            None => {
                self.record_dead(ray);
                Ok(None)
            }
        }
    }

    fn transmit(&mut self, ray: &mut Ray, ctx: &TraceContext) -> Result<()> {
        if self.enter(ray)?.is_none() {
            return Ok(());
        }
        if self.recording == RecordMode::Input {
            self.record(ray);
        }
        self.apply_aperture(ray, ctx);
        if self.recording == RecordMode::Output {
            self.record(ray);
        }
        Ok(())
    }

    fn reflect(&mut self, ray: &mut Ray, ctx: &TraceContext) -> Result<()> {
        let Some(mut normal) = self.enter(ray)? else {
            return Ok(());
        };
        if self.recording == RecordMode::Input {
            self.record(ray);
        }

        if ctx.surface_errors {
            if let Some(map) = &self.error_map {
                let sample = map.sample(&self.local_position(ray));
                let height = sample.height * ctx.error_scale;
                let slope = sample.slope * ctx.error_scale;
                let toward_z = self.frames.surface_direct.apply_vec(&Vec3::z());
                let oriented = if normal.dot(&toward_z) < 0.0 { -normal } else { normal };
                let shift = matches!(
                    ctx.error_strategy,
                    ErrorStrategy::SimpleShift | ErrorStrategy::SurfOffset
                );
                let tilt = matches!(
                    ctx.error_strategy,
                    ErrorStrategy::LocalSlope | ErrorStrategy::SurfOffset
                );

                if shift && height != 0.0 {
                    let offset = oriented * height;
                    ray.translate(&-offset);
                    match self.shape.intercept(ray)? {
                        Some(n) => {
                            normal = n;
                            ray.translate(&offset);
                        }
                        None if ctx.error_strategy == ErrorStrategy::SurfOffset => {
                            warn!(surface = %self.name, height, "re-intercept on offset surface failed");
                            return Err(TraceError::Intercept(format!(
                                "ray misses the surface offset by {height:e}"
                            )));
                        }
                        None => {
                            ray.translate(&offset);
                            // an input record was already taken on entry
                            if self.recording == RecordMode::Output {
                                self.record(ray);
                            }
                            return Ok(());
                        }
                    }
                }

                if tilt && slope != Vec2::zeros() {
                    let tx = self.frames.surface_direct.apply_vec(&Vec3::x());
                    let ty = self.frames.surface_direct.apply_vec(&Vec3::y());
                    let toward = if normal.dot(&toward_z) < 0.0 { -1.0 } else { 1.0 };
                    let tilted = (normal * toward - tx * slope.x - ty * slope.y).normalize();
                    normal = tilted * toward;
                }
            }
        }

        self.apply_aperture(ray, ctx);

        let d = ray.direction.into_inner();
        let outgoing = Dir3::new_normalize(d - normal * (2.0 * d.dot(&normal)));
        polarization::reflect(ray, &normal, outgoing);

        if self.recording == RecordMode::Output {
            self.record(ray);
        }
        Ok(())
    }

    /// Position of the ray in the plane of the surface frame.
    fn local_position(&self, ray: &Ray) -> Point2 {
        let p = self.frames.surface_inverse.apply_point(&ray.position());
        Point2::new(p.x, p.y)
    }

    fn apply_aperture(&self, ray: &mut Ray, ctx: &TraceContext) {
        if !(ctx.aperture_limit && self.aperture_active) || self.aperture.is_empty() {
            return;
        }
        let factor = self.aperture.transmission_at(&self.local_position(ray));
        if factor != 1.0 {
            trace!(surface = %self.name, factor, "aperture");
            ray.scale_amplitudes(factor);
        }
    }

    fn record(&mut self, ray: &Ray) {
        self.impacts.push(ray.clone());
        self.spot_cache = None;
    }

    fn record_dead(&mut self, ray: &Ray) {
        if self.recording != RecordMode::None {
            self.record(ray);
        }
    }

    // -- impacts --

    /// Number of rays dead after this surface since the last clear.
    pub fn lost_count(&self) -> usize {
        self.lost
    }

    /// Number of recorded impacts, dead ones included.
    pub fn impact_count(&self) -> usize {
        self.impacts.len()
    }

    /// Recorded impacts as stored (local absolute frame), dead ones included.
    pub fn raw_impacts(&self) -> &[Ray] {
        &self.impacts
    }

    /// Drops all impacts and resets the lost counter.
    pub fn clear_impacts(&mut self) {
        self.impacts.clear();
        self.lost = 0;
        self.spot_cache = None;
    }

    /// Reserves room for `additional` impacts.
    pub fn reserve_impacts(&mut self, additional: usize) {
        self.impacts.reserve(additional);
    }

    /// Live impacts expressed in `frame`, and the number of dead ones.
    pub fn impacts_in(&self, frame: ImpactFrame) -> (Vec<Ray>, usize) {
        let to_frame = match frame {
            ImpactFrame::LocalAbsolute => None,
            ImpactFrame::AlignedLocal => Some(Transform::from_linear(&self.frames.frame_inverse())),
            ImpactFrame::Surface => Some(self.frames.surface_inverse.clone()),
            ImpactFrame::General => {
                let t = self.frames.exit_frame.translation_vector();
                Some(Transform::translation(t.x, t.y, t.z))
            }
        };
        let mut lost = 0;
        let rays = self
            .impacts
            .iter()
            .filter(|ray| {
                if !ray.alive {
                    lost += 1;
                }
                ray.alive
            })
            .map(|ray| match &to_frame {
                Some(transform) => ray.transformed(transform),
                None => ray.clone(),
            })
            .collect();
        (rays, lost)
    }

    /// Spot diagram of the impacts on the plane at `distance` along the exit axis.
    ///
    /// The result is cached until the impacts change.
    pub fn spot_diagram(&mut self, distance: f64) -> &SpotDiagram {
        let cached = match self.spot_cache.take() {
            Some((d, spot)) if d == distance => spot,
            _ => {
                let (rays, lost) = self.impacts_in(ImpactFrame::AlignedLocal);
                impact::spot_diagram(&rays, lost, distance)
            }
        };
        &self.spot_cache.insert((distance, cached)).1
    }

    /// Caustic of the impacts around the exit axis.
    pub fn caustic(&self) -> CausticDiagram {
        let (rays, lost) = self.impacts_in(ImpactFrame::AlignedLocal);
        impact::caustic(&rays, lost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{Plane, Quadric};
    use xoptics_math::Point3;

    fn film() -> Surface {
        let mut s = Surface::transmissive("film", Plane::new());
        s.set_recording(RecordMode::Output);
        s
    }

    #[test]
    fn test_parameters_are_declared() {
        let s = Surface::reflective("M1", Quadric::sphere(0.1).unwrap());
        assert_eq!(s.parameter("theta").unwrap(), 0.0);
        assert_eq!(s.parameter("curvature").unwrap(), 0.1);
        assert!(matches!(
            s.parameter("radius"),
            Err(TraceError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_state() {
        let mut s = Surface::reflective("M1", Quadric::cone(0.5, 0.1, 2.0).unwrap());
        s.align(None, 1e-10).unwrap();
        assert!(s.set_parameter("apex_distance", 0.0).is_err());
        assert_eq!(s.parameter("apex_distance").unwrap(), 2.0);
        // a rejected change does not invalidate the alignment
        assert!(s.is_aligned());
    }

    #[test]
    fn test_setting_parameter_requires_realignment() {
        let mut s = film();
        s.align(None, 1e-10).unwrap();
        s.set_parameter("distance", 1.0).unwrap();
        assert!(!s.is_aligned());
        let mut ray = Ray::new(Point3::origin(), Vec3::z(), 1e-10);
        let err = s.process(&mut ray, &TraceContext::default()).unwrap_err();
        assert!(matches!(err, TraceError::NotAligned(_)));
    }

    #[test]
    fn test_transmit_moves_ray_to_film() {
        let mut s = film();
        s.set_parameter("distance", 2.0).unwrap();
        s.align(None, 1e-10).unwrap();
        let mut ray = Ray::new(Point3::new(0.1, 0.0, 0.0), Vec3::new(0.01, 0.0, 1.0), 1e-10);
        s.process(&mut ray, &TraceContext::default()).unwrap();
        assert!(ray.alive);
        // local frame: the film is at the origin
        assert!(ray.origin.z.abs() < 1e-12);
        assert!((ray.origin.x - 0.12).abs() < 1e-12);
        assert_eq!(s.impact_count(), 1);
    }

    #[test]
    fn test_dead_rays_are_recorded_and_counted() {
        let mut s = film();
        s.align(None, 1e-10).unwrap();
        let mut ray = Ray::new(Point3::origin(), Vec3::z(), 1e-10);
        ray.kill();
        s.process(&mut ray, &TraceContext::default()).unwrap();
        assert_eq!(s.impact_count(), 1);
        assert_eq!(s.lost_count(), 1);
        let (live, lost) = s.impacts_in(ImpactFrame::LocalAbsolute);
        assert!(live.is_empty());
        assert_eq!(lost, 1);

        s.clear_impacts();
        assert_eq!(s.impact_count(), 0);
        assert_eq!(s.lost_count(), 0);
    }

    #[test]
    fn test_aperture_scales_amplitudes() {
        let mut s = film();
        s.aperture_mut().add_circle(0.01, 0.0, 0.0, true).unwrap();
        s.align(None, 1e-10).unwrap();
        let ctx = TraceContext::default();

        let mut inside = Ray::new(Point3::new(0.005, 0.0, -1.0), Vec3::z(), 1e-10);
        s.process(&mut inside, &ctx).unwrap();
        assert_eq!(inside.intensity(), 1.0);

        let mut outside = Ray::new(Point3::new(0.02, 0.0, -1.0), Vec3::z(), 1e-10);
        s.process(&mut outside, &ctx).unwrap();
        assert_eq!(outside.intensity(), 0.0);
        assert!(outside.alive);

        let no_limit = TraceContext {
            aperture_limit: false,
            ..TraceContext::default()
        };
        let mut free = Ray::new(Point3::new(0.02, 0.0, -1.0), Vec3::z(), 1e-10);
        s.process(&mut free, &no_limit).unwrap();
        assert_eq!(free.intensity(), 1.0);
    }

    #[test]
    fn test_plane_mirror_deviates_by_twice_theta() {
        let theta = 0.02;
        let mut m = Surface::reflective("M1", Plane::new());
        m.set_parameters([("distance", 5.0), ("theta", theta)]).unwrap();
        m.align(None, 1e-10).unwrap();
        let mut ray = Ray::new(Point3::origin(), Vec3::z(), 1e-10);
        m.process(&mut ray, &TraceContext::default()).unwrap();
        let expected = Vec3::new(0.0, (2.0 * theta).sin(), (2.0 * theta).cos());
        assert!((ray.direction.into_inner() - expected).norm() < 1e-14);
        assert!(ray.origin.coords.norm() < 1e-12);
        // X-polarized light stays s-polarized in a vertical deflection
        assert!((ray.amplitude_s.norm() - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_impact_frames() {
        let theta = 0.05;
        let mut m = Surface::reflective("M1", Plane::new());
        m.set_parameters([("distance", 3.0), ("theta", theta)]).unwrap();
        m.set_recording(RecordMode::Output);
        m.align(None, 1e-10).unwrap();
        let mut ray = Ray::new(Point3::new(0.0, 0.0, 0.0), Vec3::z(), 1e-10);
        m.process(&mut ray, &TraceContext::default()).unwrap();

        let (aligned, _) = m.impacts_in(ImpactFrame::AlignedLocal);
        assert!((aligned[0].direction.into_inner() - Vec3::z()).norm() < 1e-14);
        let (general, _) = m.impacts_in(ImpactFrame::General);
        assert!((general[0].origin - Point3::new(0.0, 0.0, 3.0)).norm() < 1e-12);
        let (surface, _) = m.impacts_in(ImpactFrame::Surface);
        // the reflected ray leaves the surface plane symmetrically
        assert!((surface[0].direction.z - theta.sin()).abs() < 1e-12);
    }

    #[test]
    fn test_spot_cache_invalidated_by_new_impacts() {
        let mut s = film();
        s.align(None, 1e-10).unwrap();
        let ctx = TraceContext::default();
        let mut ray = Ray::new(Point3::new(0.1, 0.0, -1.0), Vec3::z(), 1e-10);
        s.process(&mut ray, &ctx).unwrap();
        assert_eq!(s.spot_diagram(0.0).count, 1);
        let mut ray = Ray::new(Point3::new(-0.1, 0.0, -1.0), Vec3::z(), 1e-10);
        s.process(&mut ray, &ctx).unwrap();
        let spot = s.spot_diagram(0.0);
        assert_eq!(spot.count, 2);
        assert!(spot.mean[0].abs() < 1e-12);
    }
}
