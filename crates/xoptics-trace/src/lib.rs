#![warn(missing_docs)]

//! Surface intercept, alignment and propagation for the xoptics ray-tracing engine.
//!
//! An optical system is an [`OpticalChain`] of [`Surface`]s. Each surface
//! holds a [`Shape`] solver (plane, quadric family or toroid), alignment
//! parameters that place it relative to the previous surface, an aperture
//! stop and an optional surface-height error map. Once aligned, the chain
//! propagates polarized [`Ray`]s one at a time and records impacts on the
//! surfaces that ask for them.
//!
//! # Example
//!
//! ```
//! use xoptics_math::{Point3, Vec3};
//! use xoptics_trace::{
//!     ImpactFrame, OpticalChain, Plane, RecordMode, Ray, Surface, TraceContext,
//! };
//!
//! let mut mirror = Surface::reflective("M1", Plane::new());
//! mirror.set_parameters([("distance", 10.0), ("theta", 0.01)])?;
//!
//! let mut film = Surface::transmissive("film", Plane::new());
//! film.set_parameter("distance", 5.0)?;
//! film.set_recording(RecordMode::Output);
//!
//! let mut chain: OpticalChain = [mirror, film].into_iter().collect();
//! chain.align(1e-10)?;
//!
//! let mut ray = Ray::new(Point3::new(1e-3, 0.0, 0.0), Vec3::z(), 1e-10);
//! chain.propagate(&mut ray, &TraceContext::default())?;
//!
//! let (impacts, lost) = chain.surface(1)?.impacts_in(ImpactFrame::AlignedLocal);
//! assert_eq!(lost, 0);
//! assert!((impacts[0].position().x - 1e-3).abs() < 1e-12);
//! # Ok::<(), xoptics_trace::TraceError>(())
//! ```

pub mod chain;
pub mod context;
pub mod error;
pub mod frame;
pub mod impact;
pub mod params;
pub mod polarization;
pub mod ray;
pub mod shape;
pub mod surface;
pub mod surface_error;

pub use chain::OpticalChain;
pub use context::{ErrorStrategy, TraceContext};
pub use error::{Result, TraceError};
pub use frame::{Alignment, SurfaceFrames};
pub use impact::{CausticDiagram, Diagram, ImpactFrame, SpotDiagram};
pub use params::{Parameter, ParameterGroup, ParameterSet, UnitKind};
pub use ray::Ray;
pub use shape::{Plane, Quadric, QuadricKind, Shape, ShapeKind, Toroid};
pub use surface::{RecordMode, Surface};
pub use surface_error::{HeightErrorMap, HeightSample};
