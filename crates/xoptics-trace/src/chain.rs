//! Ordered chains of surfaces.

use tracing::{debug, instrument};
use xoptics_math::Transform;

use crate::context::TraceContext;
use crate::error::{Result, TraceError};
use crate::ray::Ray;
use crate::surface::Surface;

/// The surfaces of an optical system, in the order rays meet them.
///
/// Cloning a chain gives a fully independent copy (shapes, frames and impact
/// buffers), which is how rays are traced on several threads.
#[derive(Debug, Clone, Default)]
pub struct OpticalChain {
    surfaces: Vec<Surface>,
}

impl OpticalChain {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a surface and returns its index.
    pub fn push(&mut self, surface: Surface) -> usize {
        self.surfaces.push(surface);
        self.surfaces.len() - 1
    }

    /// Number of surfaces.
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Whether the chain has no surface.
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// All surfaces.
    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    /// Surface at `index`.
    pub fn surface(&self, index: usize) -> Result<&Surface> {
        let len = self.surfaces.len();
        self.surfaces
            .get(index)
            .ok_or(TraceError::IndexOutOfRange { index, len })
    }

    /// Mutable surface at `index`.
    pub fn surface_mut(&mut self, index: usize) -> Result<&mut Surface> {
        let len = self.surfaces.len();
        self.surfaces
            .get_mut(index)
            .ok_or(TraceError::IndexOutOfRange { index, len })
    }

    /// Index of the first surface called `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.surfaces.iter().position(|s| s.name() == name)
    }

    /// Exit frame of the last surface, or identity for an empty chain.
    pub fn exit_frame(&self) -> Transform {
        self.surfaces
            .last()
            .map(|s| s.frames().exit_frame.clone())
            .unwrap_or_else(Transform::identity)
    }

    /// Aligns every surface.
    pub fn align(&mut self, wavelength: f64) -> Result<()> {
        self.align_from(0, wavelength)
    }

    /// Aligns the surfaces from `start` on, chaining each exit frame into
    /// the next surface. `start` may equal the length, which does nothing.
    #[instrument(skip(self))]
    pub fn align_from(&mut self, start: usize, wavelength: f64) -> Result<()> {
        self.check_start(start)?;
        let mut previous = match start {
            0 => None,
            _ => Some(self.surfaces[start - 1].frames().exit_frame.clone()),
        };
        for surface in &mut self.surfaces[start..] {
            surface.align(previous.as_ref(), wavelength)?;
            previous = Some(surface.frames().exit_frame.clone());
        }
        debug!(surfaces = self.surfaces.len() - start, "chain aligned");
        Ok(())
    }

    /// Whether every surface is aligned.
    pub fn is_aligned(&self) -> bool {
        self.surfaces.iter().all(Surface::is_aligned)
    }

    /// Propagates a ray, expressed in the laboratory frame, through the whole chain.
    pub fn propagate(&mut self, ray: &mut Ray, ctx: &TraceContext) -> Result<()> {
        self.propagate_from(0, ray, ctx)
    }

    /// Propagates a ray from surface `start` to the end of the chain.
    ///
    /// The ray must be expressed in the local absolute frame of surface
    /// `start - 1`. Dead rays still visit every surface. Starting past the
    /// last surface leaves the ray untouched.
    pub fn propagate_from(&mut self, start: usize, ray: &mut Ray, ctx: &TraceContext) -> Result<()> {
        self.check_start(start)?;
        for surface in &mut self.surfaces[start..] {
            surface.process(ray, ctx)?;
        }
        Ok(())
    }

    /// Clears the impacts of every surface.
    pub fn clear_impacts(&mut self) {
        self.surfaces.iter_mut().for_each(Surface::clear_impacts);
    }

    /// Clears the impacts of the surfaces from `start` on.
    pub fn clear_impacts_from(&mut self, start: usize) -> Result<()> {
        self.check_start(start)?;
        self.surfaces[start..].iter_mut().for_each(Surface::clear_impacts);
        Ok(())
    }

    /// Reserves room for `additional` impacts on every surface.
    pub fn reserve_impacts(&mut self, additional: usize) {
        for surface in &mut self.surfaces {
            surface.reserve_impacts(additional);
        }
    }

    /// Reserves room for `additional` impacts on the surfaces from `start` on.
    pub fn reserve_impacts_from(&mut self, start: usize, additional: usize) -> Result<()> {
        self.check_start(start)?;
        for surface in &mut self.surfaces[start..] {
            surface.reserve_impacts(additional);
        }
        Ok(())
    }

    /// A start index is valid up to and including the length.
    fn check_start(&self, index: usize) -> Result<()> {
        if index <= self.surfaces.len() {
            Ok(())
        } else {
            Err(TraceError::IndexOutOfRange {
                index,
                len: self.surfaces.len(),
            })
        }
    }
}

impl FromIterator<Surface> for OpticalChain {
    fn from_iter<I: IntoIterator<Item = Surface>>(iter: I) -> Self {
        Self {
            surfaces: iter.into_iter().collect(),
        }
    }
}
