//! The closed set of region kinds an aperture stop is built from.

use serde::{Deserialize, Serialize};
use xoptics_math::{Point2, Vec2};

use crate::ellipse::Ellipse;
use crate::error::Result;
use crate::polygon::Polygon;

/// Position of a point relative to a region boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    /// Strictly inside.
    Inside,
    /// Strictly outside.
    Outside,
    /// On the boundary, within rounding.
    Border,
}

/// Region kind tag, as reported by [`Region::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionKind {
    /// A polygon.
    Polygon,
    /// An ellipse.
    Ellipse,
}

/// A closed 2D boundary with a transparency flag.
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    /// Polygonal region.
    Polygon(Polygon),
    /// Elliptical region.
    Ellipse(Ellipse),
}

impl Region {
    /// The region kind.
    pub fn kind(&self) -> RegionKind {
        match self {
            Region::Polygon(_) => RegionKind::Polygon,
            Region::Ellipse(_) => RegionKind::Ellipse,
        }
    }

    /// Classifies a point against the region boundary.
    pub fn locate(&self, point: &Point2) -> Location {
        match self {
            Region::Polygon(p) => p.locate(point),
            Region::Ellipse(e) => e.locate(point),
        }
    }

    /// Whether the inside of the region transmits.
    pub fn is_transparent(&self) -> bool {
        match self {
            Region::Polygon(p) => p.is_transparent(),
            Region::Ellipse(e) => e.is_transparent(),
        }
    }

    /// Sets the transparency flag.
    pub fn set_transparent(&mut self, transparent: bool) {
        match self {
            Region::Polygon(p) => p.set_transparent(transparent),
            Region::Ellipse(e) => e.set_transparent(transparent),
        }
    }

    /// Applies the rotation by `angle` followed by `translation`.
    pub fn move_by(&mut self, angle: f64, translation: &Vec2) {
        match self {
            Region::Polygon(p) => p.move_by(angle, translation),
            Region::Ellipse(e) => e.move_by(angle, translation),
        }
    }

    /// Mirrors the region across the line through `point` along `direction`.
    pub fn set_symmetric(&mut self, point: &Point2, direction: &Vec2) -> Result<()> {
        match self {
            Region::Polygon(p) => p.set_symmetric(point, direction),
            Region::Ellipse(e) => e.set_symmetric(point, direction),
        }
    }

    /// Point reflection through `point`.
    pub fn set_symmetric_about(&mut self, point: &Point2) {
        match self {
            Region::Polygon(p) => p.set_symmetric_about(point),
            Region::Ellipse(e) => e.set_symmetric_about(point),
        }
    }

    /// The polygon, if this region is one.
    pub fn as_polygon(&self) -> Option<&Polygon> {
        match self {
            Region::Polygon(p) => Some(p),
            Region::Ellipse(_) => None,
        }
    }

    /// The ellipse, if this region is one.
    pub fn as_ellipse(&self) -> Option<&Ellipse> {
        match self {
            Region::Ellipse(e) => Some(e),
            Region::Polygon(_) => None,
        }
    }
}

impl From<Polygon> for Region {
    fn from(polygon: Polygon) -> Self {
        Region::Polygon(polygon)
    }
}

impl From<Ellipse> for Region {
    fn from(ellipse: Ellipse) -> Self {
        Region::Ellipse(ellipse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch() {
        let mut region = Region::from(Ellipse::circle(1.0, 0.0, 0.0, false).unwrap());
        assert_eq!(region.kind(), RegionKind::Ellipse);
        assert!(!region.is_transparent());
        region.set_transparent(true);
        assert!(region.is_transparent());
        region.move_by(0.0, &Vec2::new(5.0, 0.0));
        assert_eq!(region.locate(&Point2::new(5.0, 0.0)), Location::Inside);
        assert!(region.as_polygon().is_none());
        assert!(region.as_ellipse().is_some());
    }

    #[test]
    fn test_polygon_region_mirror() {
        let mut region = Region::from(Polygon::rectangle(1.0, 1.0, 2.0, 0.0, true).unwrap());
        region.set_symmetric(&Point2::origin(), &Vec2::new(0.0, 1.0)).unwrap();
        assert_eq!(region.locate(&Point2::new(-2.0, 0.0)), Location::Inside);
        region.set_symmetric_about(&Point2::origin());
        assert_eq!(region.locate(&Point2::new(2.0, 0.0)), Location::Inside);
    }
}
