#![warn(missing_docs)]

//! Aperture stop regions for the xoptics ray-tracing engine.
//!
//! Apertures are described in the 2D plane of a surface frame as an ordered
//! stack of [`Region`]s, each a [`Polygon`] or an [`Ellipse`] carrying a
//! transparency flag. The [`ApertureStop`] turns the stack into a scalar
//! transmission at any point of the plane.
//!
//! # Example
//!
//! ```
//! use xoptics_aperture::ApertureStop;
//! use xoptics_math::Point2;
//!
//! let mut stop = ApertureStop::new();
//! stop.add_circle(10.0, 0.0, 0.0, false)?; // opaque disk, clear background
//! stop.add_circle(5.0, 0.0, 0.0, true)?;   // transparent hole on top of it
//!
//! assert_eq!(stop.transmission_at(&Point2::new(0.0, 0.0)), 1.0);
//! assert_eq!(stop.transmission_at(&Point2::new(7.0, 0.0)), 0.0);
//! # Ok::<(), xoptics_aperture::ApertureError>(())
//! ```

pub mod ellipse;
pub mod error;
pub mod polygon;
pub mod region;
pub mod stop;

pub use ellipse::{Ellipse, EllipseParameters};
pub use error::{ApertureError, Result};
pub use polygon::Polygon;
pub use region::{Location, Region, RegionKind};
pub use stop::ApertureStop;
