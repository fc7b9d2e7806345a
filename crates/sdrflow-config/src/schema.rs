//! Control-parameter schema and query parsing.
//!
//! A schema names every control a pipeline accepts and its kind. Clients
//! send updates as a query string (`freq=103500000&mono=1`); the schema
//! turns that into typed [`ControlUpdates`] for
//! [`Graph::post_updates`](sdrflow_core::Graph::post_updates).

use std::collections::BTreeMap;

use sdrflow_core::{ControlKind, ControlUpdates, ControlValue, Validator, clamp};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Kind and optional numeric range of one control.
///
/// ```toml
/// [controls.bw]
/// kind = "double"
/// min = 1000.0
/// max = 10000000.0
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlSpec {
    /// Value kind accepted for this control.
    pub kind: ControlKind,

    /// Inclusive lower bound (numeric kinds only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Inclusive upper bound (numeric kinds only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ControlSpec {
    /// Spec of the given kind without a range.
    pub fn new(kind: ControlKind) -> Self {
        Self {
            kind,
            min: None,
            max: None,
        }
    }

    /// Adds an inclusive range.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    fn is_numeric(&self) -> bool {
        matches!(self.kind, ControlKind::UInt | ControlKind::Double)
    }

    fn has_range(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// Parses `raw` as this spec's kind.
    ///
    /// Bools are exactly `0` or `1`. Uints reject negatives and fractions.
    pub fn parse_value(&self, name: &str, raw: &str) -> Result<ControlValue, ConfigError> {
        let invalid = || ConfigError::invalid_value(name, self.kind, raw);
        match self.kind {
            ControlKind::Bool => match raw {
                "0" => Ok(ControlValue::Bool(false)),
                "1" => Ok(ControlValue::Bool(true)),
                _ => Err(invalid()),
            },
            ControlKind::UInt => raw
                .parse::<u32>()
                .map(ControlValue::UInt)
                .map_err(|_| invalid()),
            ControlKind::Double => match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(ControlValue::Double(v)),
                _ => Err(invalid()),
            },
            ControlKind::Text => Ok(ControlValue::Text(raw.to_string())),
        }
    }
}

/// Numeric control types that can be clamped to a schema range.
pub trait RangeBound: PartialOrd + Copy + Send + Sync + 'static {
    /// The type's own limits.
    const LIMITS: (Self, Self);

    /// Converts a schema bound, saturating at the type's limits.
    fn from_bound(bound: f64) -> Self;
}

impl RangeBound for f64 {
    const LIMITS: (Self, Self) = (f64::MIN, f64::MAX);

    fn from_bound(bound: f64) -> Self {
        bound
    }
}

impl RangeBound for f32 {
    const LIMITS: (Self, Self) = (f32::MIN, f32::MAX);

    fn from_bound(bound: f64) -> Self {
        bound as f32
    }
}

impl RangeBound for u32 {
    const LIMITS: (Self, Self) = (u32::MIN, u32::MAX);

    fn from_bound(bound: f64) -> Self {
        // Float-to-int `as` saturates.
        bound as u32
    }
}

/// Named control specs.
///
/// Serializes as a TOML table keyed by control name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlSchema {
    specs: BTreeMap<String, ControlSpec>,
}

impl ControlSchema {
    /// Empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// The tuner parameter set understood by the radio pipelines.
    pub fn radio_defaults() -> Self {
        Self::new()
            .with("freq", ControlSpec::new(ControlKind::Double))
            .with("modem", ControlSpec::new(ControlKind::Text))
            .with("bw", ControlSpec::new(ControlKind::Double))
            .with("mono", ControlSpec::new(ControlKind::Bool))
            .with("program", ControlSpec::new(ControlKind::UInt))
            .with("lna_state", ControlSpec::new(ControlKind::UInt))
            .with("mode", ControlSpec::new(ControlKind::UInt))
    }

    /// Adds or replaces a spec.
    pub fn with(mut self, name: impl Into<String>, spec: ControlSpec) -> Self {
        self.insert(name, spec);
        self
    }

    /// Adds or replaces a spec.
    pub fn insert(&mut self, name: impl Into<String>, spec: ControlSpec) {
        self.specs.insert(name.into(), spec);
    }

    /// Looks up a spec.
    pub fn get(&self, name: &str) -> Option<&ControlSpec> {
        self.specs.get(name)
    }

    /// Iterates specs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ControlSpec)> {
        self.specs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of controls.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Returns `true` if no control is declared.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Checks ranges: numeric kinds only, `min <= max`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, spec) in &self.specs {
            if !spec.has_range() {
                continue;
            }
            if !spec.is_numeric() {
                return Err(ConfigError::RangeOnNonNumeric {
                    name: name.clone(),
                    kind: spec.kind,
                });
            }
            if let (Some(min), Some(max)) = (spec.min, spec.max) {
                if min > max {
                    return Err(ConfigError::InvalidRange {
                        name: name.clone(),
                        min,
                        max,
                    });
                }
            }
        }
        Ok(())
    }

    /// Parses a `name=value&name=value` query into typed updates.
    ///
    /// An empty query yields no updates. A repeated name keeps the last
    /// value.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MalformedPair`] for a segment that is not exactly
    ///   `name=value`
    /// - [`ConfigError::UnknownParameter`] for a name outside the schema
    /// - [`ConfigError::InvalidValue`] for a value of the wrong kind
    ///
    /// # Example
    ///
    /// ```rust
    /// use sdrflow_config::ControlSchema;
    /// use sdrflow_core::ControlValue;
    ///
    /// let updates = ControlSchema::radio_defaults()
    ///     .parse_query("freq=103500000&mono=1")
    ///     .unwrap();
    /// assert_eq!(updates["freq"], ControlValue::Double(103_500_000.0));
    /// assert_eq!(updates["mono"], ControlValue::Bool(true));
    /// ```
    pub fn parse_query(&self, query: &str) -> Result<ControlUpdates, ConfigError> {
        let mut updates = ControlUpdates::new();
        if query.is_empty() {
            return Ok(updates);
        }

        for pair in query.split('&') {
            let mut parts = pair.split('=');
            let (Some(name), Some(raw), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(ConfigError::MalformedPair(pair.to_string()));
            };
            let spec = self
                .get(name)
                .ok_or_else(|| ConfigError::UnknownParameter(name.to_string()))?;
            updates.insert(name.to_string(), spec.parse_value(name, raw)?);
        }

        debug!(count = updates.len(), "parsed control query");
        Ok(updates)
    }

    /// Clamping validator for a numeric control with a range.
    ///
    /// Returns `None` when the control is unknown, non-numeric, or unbounded.
    /// A one-sided range clamps against the type's own limit on the open side.
    pub fn validator<T: RangeBound>(&self, name: &str) -> Option<Validator<T>> {
        let spec = self.get(name).filter(|s| s.is_numeric() && s.has_range())?;
        let (lo, hi) = T::LIMITS;
        let min = spec.min.map_or(lo, T::from_bound);
        let max = spec.max.map_or(hi, T::from_bound);
        Some(clamp(min, max))
    }
}

impl<S: Into<String>> FromIterator<(S, ControlSpec)> for ControlSchema {
    fn from_iter<I: IntoIterator<Item = (S, ControlSpec)>>(iter: I) -> Self {
        Self {
            specs: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
