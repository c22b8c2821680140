//! Per-run trace settings.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceError};

/// How a surface-height error map perturbs a reflection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStrategy {
    /// Shift the surface by the local height along its normal and re-intercept.
    #[default]
    SimpleShift,
    /// Tilt the normal by the local slopes.
    LocalSlope,
    /// Shift and tilt, with a single re-intercept that must succeed.
    SurfOffset,
}

/// Settings shared by every surface during one propagation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceContext {
    /// Apply aperture stops.
    pub aperture_limit: bool,
    /// Apply surface-height error maps on reflective surfaces.
    pub surface_errors: bool,
    /// Error application method.
    pub error_strategy: ErrorStrategy,
    /// Multiplier applied to sampled heights and slopes (1.0 = as measured).
    pub error_scale: f64,
}

impl Default for TraceContext {
    fn default() -> Self {
        Self {
            aperture_limit: true,
            surface_errors: false,
            error_strategy: ErrorStrategy::SimpleShift,
            error_scale: 1.0,
        }
    }
}

impl TraceContext {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if !self.error_scale.is_finite() || self.error_scale < 0.0 {
            return Err(TraceError::InvalidSettings(
                "error_scale must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Parses settings from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let ctx: Self = serde_json::from_str(json)?;
        ctx.validate()?;
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let ctx = TraceContext::default();
        assert!(ctx.validate().is_ok());
        assert!(ctx.aperture_limit);
        assert!(!ctx.surface_errors);
    }

    #[test]
    fn test_from_json_partial() {
        let ctx = TraceContext::from_json_str(
            r#"{ "surface_errors": true, "error_strategy": "surf_offset" }"#,
        )
        .unwrap();
        assert!(ctx.surface_errors);
        assert!(ctx.aperture_limit);
        assert_eq!(ctx.error_strategy, ErrorStrategy::SurfOffset);
        assert_eq!(ctx.error_scale, 1.0);
    }

    #[test]
    fn test_invalid_scale_rejected() {
        let err = TraceContext::from_json_str(r#"{ "error_scale": -2.0 }"#).unwrap_err();
        assert!(matches!(err, TraceError::InvalidSettings(_)));
        assert!(matches!(
            TraceContext::from_json_str("{ not json").unwrap_err(),
            TraceError::Json(_)
        ));
    }
}
