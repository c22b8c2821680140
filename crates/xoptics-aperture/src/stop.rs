//! Aperture stops: ordered stacks of regions.
//!
//! The stack order matters. Regions added later sit on top of earlier ones,
//! and the first region (from the top) that strictly contains a point decides
//! its transmission. Points outside every region get the complement of the
//! bottom region's transparency, so an opaque first region defines a clear
//! background and a transparent one an opaque background.

use tracing::debug;
use xoptics_math::{Point2, Vec2};

use crate::ellipse::Ellipse;
use crate::error::{ApertureError, Result};
use crate::polygon::Polygon;
use crate::region::{Location, Region};

/// An ordered stack of exclusively owned regions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApertureStop {
    regions: Vec<Region>,
}

impl ApertureStop {
    /// Empty stop, transmitting everywhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the stop has no region.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// The regions, bottom first.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Region at `index`.
    pub fn region(&self, index: usize) -> Result<&Region> {
        let len = self.regions.len();
        self.regions
            .get(index)
            .ok_or(ApertureError::IndexOutOfRange { index, len })
    }

    /// Mutable region at `index`.
    pub fn region_mut(&mut self, index: usize) -> Result<&mut Region> {
        let len = self.regions.len();
        self.regions
            .get_mut(index)
            .ok_or(ApertureError::IndexOutOfRange { index, len })
    }

    /// Pushes a region on top of the stack and returns its index.
    pub fn add(&mut self, region: impl Into<Region>) -> usize {
        self.regions.push(region.into());
        debug!(count = self.regions.len(), "aperture region added");
        self.regions.len() - 1
    }

    /// Inserts a region at `index`, shifting the regions above it.
    ///
    /// `index` may equal the current length, which appends.
    pub fn insert(&mut self, index: usize, region: impl Into<Region>) -> Result<()> {
        if index > self.regions.len() {
            return Err(ApertureError::IndexOutOfRange {
                index,
                len: self.regions.len(),
            });
        }
        self.regions.insert(index, region.into());
        Ok(())
    }

    /// Replaces the region at `index` and returns the previous one.
    pub fn replace(&mut self, index: usize, region: impl Into<Region>) -> Result<Region> {
        let slot = self.region_mut(index)?;
        Ok(std::mem::replace(slot, region.into()))
    }

    /// Removes the region at `index` and returns it.
    pub fn remove(&mut self, index: usize) -> Result<Region> {
        self.region(index)?;
        Ok(self.regions.remove(index))
    }

    /// Removes every region.
    pub fn clear(&mut self) {
        self.regions.clear();
    }

    /// Adds a polygon from its vertices.
    pub fn add_polygon(&mut self, vertices: Vec<Point2>, transparent: bool) -> Result<usize> {
        Ok(self.add(Polygon::new(vertices, transparent)?))
    }

    /// Adds a rectangle of the given size, centered on `(xcenter, ycenter)` and
    /// rotated by `angle` about its center.
    pub fn add_rectangle(
        &mut self,
        xsize: f64,
        ysize: f64,
        xcenter: f64,
        ycenter: f64,
        angle: f64,
        transparent: bool,
    ) -> Result<usize> {
        Ok(self.add(rotated_rectangle(xsize, ysize, xcenter, ycenter, angle, transparent)?))
    }

    /// Adds an ellipse.
    pub fn add_ellipse(
        &mut self,
        a: f64,
        b: f64,
        xcenter: f64,
        ycenter: f64,
        angle: f64,
        transparent: bool,
    ) -> Result<usize> {
        Ok(self.add(Ellipse::new(a, b, xcenter, ycenter, angle, transparent)?))
    }

    /// Adds a circle.
    pub fn add_circle(&mut self, radius: f64, xcenter: f64, ycenter: f64, transparent: bool) -> Result<usize> {
        Ok(self.add(Ellipse::circle(radius, xcenter, ycenter, transparent)?))
    }

    /// Inserts a rectangle at `index`.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_rectangle(
        &mut self,
        index: usize,
        xsize: f64,
        ysize: f64,
        xcenter: f64,
        ycenter: f64,
        angle: f64,
        transparent: bool,
    ) -> Result<()> {
        self.insert(index, rotated_rectangle(xsize, ysize, xcenter, ycenter, angle, transparent)?)
    }

    /// Replaces the region at `index` with a circle.
    pub fn replace_with_circle(
        &mut self,
        index: usize,
        radius: f64,
        xcenter: f64,
        ycenter: f64,
        transparent: bool,
    ) -> Result<Region> {
        self.replace(index, Ellipse::circle(radius, xcenter, ycenter, transparent)?)
    }

    /// Transmission factor (0 or 1) at a point of the stop plane.
    pub fn transmission_at(&self, point: &Point2) -> f64 {
        let Some(bottom) = self.regions.first() else {
            return 1.0;
        };
        let covering = self
            .regions
            .iter()
            .rev()
            .find(|r| r.locate(point) == Location::Inside);
        let transparent = match covering {
            Some(region) => region.is_transparent(),
            None => !bottom.is_transparent(),
        };
        if transparent {
            1.0
        } else {
            0.0
        }
    }
}

fn rotated_rectangle(
    xsize: f64,
    ysize: f64,
    xcenter: f64,
    ycenter: f64,
    angle: f64,
    transparent: bool,
) -> Result<Polygon> {
    let mut rect = Polygon::rectangle(xsize, ysize, 0.0, 0.0, transparent)?;
    rect.move_by(angle, &Vec2::new(xcenter, ycenter));
    Ok(rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    #[test]
    fn test_empty_stop_transmits() {
        let stop = ApertureStop::new();
        assert_eq!(stop.transmission_at(&p(123.0, -4.0)), 1.0);
    }

    #[test]
    fn test_single_transparent_region() {
        let mut stop = ApertureStop::new();
        stop.add_circle(1.0, 0.0, 0.0, true).unwrap();
        assert_eq!(stop.transmission_at(&p(0.5, 0.0)), 1.0);
        // background is opaque
        assert_eq!(stop.transmission_at(&p(2.0, 0.0)), 0.0);
    }

    #[test]
    fn test_single_opaque_region() {
        let mut stop = ApertureStop::new();
        stop.add_circle(1.0, 0.0, 0.0, false).unwrap();
        assert_eq!(stop.transmission_at(&p(0.5, 0.0)), 0.0);
        assert_eq!(stop.transmission_at(&p(2.0, 0.0)), 1.0);
    }

    #[test]
    fn test_nested_circles_top_region_wins() {
        let mut stop = ApertureStop::new();
        stop.add_circle(10.0, 0.0, 0.0, false).unwrap();
        stop.add_circle(5.0, 0.0, 0.0, true).unwrap();
        assert_eq!(stop.transmission_at(&p(0.0, 0.0)), 1.0);
        assert_eq!(stop.transmission_at(&p(7.0, 0.0)), 0.0);
        assert_eq!(stop.transmission_at(&p(15.0, 0.0)), 1.0);
    }

    #[test]
    fn test_border_point_is_not_inside() {
        let mut stop = ApertureStop::new();
        stop.add_rectangle(2.0, 2.0, 0.0, 0.0, 0.0, true).unwrap();
        // on the border: no region strictly contains it, background opaque
        assert_eq!(stop.transmission_at(&p(1.0, 0.0)), 0.0);
    }

    #[test]
    fn test_rotated_rectangle() {
        let mut stop = ApertureStop::new();
        stop.add_rectangle(4.0, 0.2, 1.0, 1.0, FRAC_PI_4, true).unwrap();
        assert_eq!(stop.transmission_at(&p(2.0, 2.0)), 1.0);
        assert_eq!(stop.transmission_at(&p(2.0, 0.0)), 0.0);
    }

    #[test]
    fn test_crud() {
        let mut stop = ApertureStop::new();
        assert_eq!(stop.add_circle(1.0, 0.0, 0.0, true).unwrap(), 0);
        assert_eq!(stop.add_ellipse(2.0, 1.0, 0.0, 0.0, 0.0, false).unwrap(), 1);
        stop.insert_rectangle(1, 1.0, 1.0, 3.0, 3.0, 0.0, true).unwrap();
        assert_eq!(stop.len(), 3);
        assert!(stop.region(1).unwrap().as_polygon().is_some());
        assert!(stop.region(2).unwrap().as_ellipse().is_some());

        let old = stop.replace_with_circle(2, 4.0, 0.0, 0.0, true).unwrap();
        assert!(!old.is_transparent());
        assert!(stop.region(2).unwrap().is_transparent());

        let removed = stop.remove(0).unwrap();
        assert!(removed.as_ellipse().is_some());
        assert_eq!(stop.len(), 2);
        assert!(stop.regions()[0].as_polygon().is_some());
    }

    #[test]
    fn test_out_of_range_indices_are_rejected() {
        let mut stop = ApertureStop::new();
        stop.add_circle(1.0, 0.0, 0.0, true).unwrap();
        let circle = Ellipse::circle(1.0, 0.0, 0.0, true).unwrap();
        assert_eq!(
            stop.remove(1).unwrap_err(),
            ApertureError::IndexOutOfRange { index: 1, len: 1 }
        );
        assert!(stop.replace(3, circle.clone()).is_err());
        assert!(stop.insert(2, circle.clone()).is_err());
        assert!(stop.insert(1, circle).is_ok());
        assert!(stop.region(5).is_err());
        assert_eq!(stop.len(), 2);
    }

    #[test]
    fn test_invalid_region_is_not_added() {
        let mut stop = ApertureStop::new();
        assert!(stop.add_polygon(vec![p(0.0, 0.0), p(1.0, 1.0)], true).is_err());
        assert!(stop.add_circle(0.0, 0.0, 0.0, true).is_err());
        assert!(stop.is_empty());
    }
}
