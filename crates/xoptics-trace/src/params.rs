//! Named, typed surface parameters.
//!
//! Every surface owns a [`ParameterSet`] holding its alignment parameters
//! (see [`ALIGNMENT_PARAMETERS`]) and the parameters its shape declares.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceError};

/// Physical dimension of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Pure number.
    Dimensionless,
    /// Meters.
    Distance,
    /// Inverse meters (curvatures).
    InverseDistance,
    /// Radians.
    Angle,
}

/// Parameter category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterGroup {
    /// Positioning of the surface along the chain.
    Alignment,
    /// Figure of the surface.
    Shape,
}

/// A parameter value with its unit and group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Value in SI units.
    pub value: f64,
    /// Physical dimension.
    pub unit: UnitKind,
    /// Category.
    pub group: ParameterGroup,
}

impl Parameter {
    /// An alignment parameter.
    pub fn alignment(value: f64, unit: UnitKind) -> Self {
        Self {
            value,
            unit,
            group: ParameterGroup::Alignment,
        }
    }

    /// A shape parameter.
    pub fn shape(value: f64, unit: UnitKind) -> Self {
        Self {
            value,
            unit,
            group: ParameterGroup::Shape,
        }
    }
}

/// Alignment parameters every surface carries, with their units.
///
/// `distance` is measured from the previous surface along the incoming
/// axis; `theta`, `phi`, `psi` are the grazing, azimuth and in-plane angles;
/// the `D` prefixed entries are misalignments applied to the surface only.
pub const ALIGNMENT_PARAMETERS: [(&str, UnitKind); 10] = [
    ("distance", UnitKind::Distance),
    ("theta", UnitKind::Angle),
    ("phi", UnitKind::Angle),
    ("psi", UnitKind::Angle),
    ("Dtheta", UnitKind::Angle),
    ("Dphi", UnitKind::Angle),
    ("Dpsi", UnitKind::Angle),
    ("DX", UnitKind::Distance),
    ("DY", UnitKind::Distance),
    ("DZ", UnitKind::Distance),
];

/// An ordered dictionary of named parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    entries: BTreeMap<String, Parameter>,
}

impl ParameterSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding the alignment parameters, all zero.
    pub fn with_alignment() -> Self {
        let mut set = Self::new();
        for (name, unit) in ALIGNMENT_PARAMETERS {
            set.define(name, Parameter::alignment(0.0, unit));
        }
        set
    }

    /// Declares `name`, replacing any previous definition.
    pub fn define(&mut self, name: impl Into<String>, parameter: Parameter) {
        self.entries.insert(name.into(), parameter);
    }

    /// Whether `name` is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// The full parameter record.
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.entries.get(name)
    }

    /// The value of a defined parameter.
    pub fn value(&self, name: &str) -> Result<f64> {
        self.entries
            .get(name)
            .map(|p| p.value)
            .ok_or_else(|| TraceError::UnknownParameter(name.to_string()))
    }

    /// Updates the value of a defined parameter.
    ///
    /// Unknown names and non-finite values are rejected.
    pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(TraceError::parameter(name, format!("value {value} is not finite")));
        }
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| TraceError::UnknownParameter(name.to_string()))?;
        entry.value = value;
        Ok(())
    }

    /// Iterates over `(name, parameter)` in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parameters of one group.
    pub fn group(&self, group: ParameterGroup) -> impl Iterator<Item = (&str, &Parameter)> {
        self.iter().filter(move |(_, p)| p.group == group)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_defaults() {
        let set = ParameterSet::with_alignment();
        assert_eq!(set.len(), ALIGNMENT_PARAMETERS.len());
        assert_eq!(set.value("theta").unwrap(), 0.0);
        assert_eq!(set.get("DX").unwrap().unit, UnitKind::Distance);
        assert_eq!(set.group(ParameterGroup::Shape).count(), 0);
    }

    #[test]
    fn test_set_unknown_and_non_finite() {
        let mut set = ParameterSet::with_alignment();
        assert!(matches!(
            set.set("radius", 1.0),
            Err(TraceError::UnknownParameter(name)) if name == "radius"
        ));
        assert!(matches!(set.set("theta", f64::NAN), Err(TraceError::Parameter { .. })));
        set.set("theta", 0.01).unwrap();
        assert_eq!(set.value("theta").unwrap(), 0.01);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut set = ParameterSet::new();
        set.define("curvature", Parameter::shape(0.5, UnitKind::InverseDistance));
        let json = serde_json::to_string(&set).unwrap();
        assert!(json.contains("inverse_distance"));
        let back: ParameterSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
