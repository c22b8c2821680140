//! Error types for surface alignment and ray propagation.

use thiserror::Error;
use xoptics_aperture::ApertureError;

/// Errors raised while configuring, aligning or tracing through surfaces.
///
/// A ray missing a surface is not an error: the ray is marked dead and
/// counted as lost. Errors are reserved for invalid configurations and
/// geometric situations the solvers cannot resolve.
#[derive(Error, Debug)]
pub enum TraceError {
    /// A parameter value is invalid for the shape it drives.
    #[error("invalid parameter `{name}`: {reason}")]
    Parameter {
        /// Parameter name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// No parameter with this name exists on the surface.
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),

    /// An intersection computation reached an impossible state.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// A re-intercept required by a surface error model failed.
    #[error("intercept failed: {0}")]
    Intercept(String),

    /// Propagation failed at a named surface.
    #[error("ray propagation failed at surface `{surface}`: {source}")]
    Propagation {
        /// Name of the surface being processed.
        surface: String,
        /// The underlying failure.
        #[source]
        source: Box<TraceError>,
    },

    /// Aperture region error.
    #[error(transparent)]
    Aperture(#[from] ApertureError),

    /// Trace settings failed validation.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// A surface was traced before being aligned.
    #[error("surface `{0}` is not aligned")]
    NotAligned(String),

    /// A surface index is outside the chain.
    #[error("surface index {index} out of range (chain has {len})")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of surfaces.
        len: usize,
    },

    /// Settings could not be parsed.
    #[error("settings parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TraceError {
    /// Shorthand for [`TraceError::Parameter`].
    pub fn parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        TraceError::Parameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Wraps this error with the name of the surface it occurred at.
    pub fn at_surface(self, surface: impl Into<String>) -> Self {
        TraceError::Propagation {
            surface: surface.into(),
            source: Box::new(self),
        }
    }
}

/// Result type for trace operations.
pub type Result<T> = std::result::Result<T, TraceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_propagation_keeps_source() {
        let err = TraceError::Intercept("missed".into()).at_surface("M1");
        assert_eq!(
            err.to_string(),
            "ray propagation failed at surface `M1`: intercept failed: missed"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_aperture_error_converts() {
        let err: TraceError = ApertureError::IndexOutOfRange { index: 3, len: 1 }.into();
        assert!(matches!(err, TraceError::Aperture(_)));
    }
}
