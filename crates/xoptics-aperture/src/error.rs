//! Error types for aperture regions.

use thiserror::Error;

/// Errors that can occur while building or editing aperture regions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApertureError {
    /// The region boundary is degenerate or topologically invalid.
    #[error("invalid region geometry: {0}")]
    Geometry(String),

    /// A region or vertex index is outside the valid range.
    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The current number of elements.
        len: usize,
    },

    /// A construction parameter is out of its domain.
    #[error("invalid region parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for aperture operations.
pub type Result<T> = std::result::Result<T, ApertureError>;
