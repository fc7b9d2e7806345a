//! Control values posted from outside the graph.
//!
//! External callers address running nodes by binding name and send a
//! [`ControlValue`]. Each control port converts the value to its own data
//! type through [`ControlData`] on the subgraph thread that owns it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// The kind of a [`ControlValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// Boolean switch.
    Bool,
    /// Unsigned integer.
    UInt,
    /// Double-precision float.
    Double,
    /// Free-form string.
    Text,
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlKind::Bool => "bool",
            ControlKind::UInt => "uint",
            ControlKind::Double => "double",
            ControlKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// A dynamically typed control value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    /// Boolean switch.
    Bool(bool),
    /// Unsigned integer.
    UInt(u32),
    /// Double-precision float.
    Double(f64),
    /// Free-form string.
    Text(String),
}

impl ControlValue {
    /// Returns the kind of this value.
    pub fn kind(&self) -> ControlKind {
        match self {
            ControlValue::Bool(_) => ControlKind::Bool,
            ControlValue::UInt(_) => ControlKind::UInt,
            ControlValue::Double(_) => ControlKind::Double,
            ControlValue::Text(_) => ControlKind::Text,
        }
    }

    fn mismatch(&self, expected: ControlKind) -> ControlError {
        ControlError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlValue::Bool(v) => write!(f, "{}", u8::from(*v)),
            ControlValue::UInt(v) => write!(f, "{v}"),
            ControlValue::Double(v) => write!(f, "{v}"),
            ControlValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ControlValue {
    fn from(v: bool) -> Self {
        ControlValue::Bool(v)
    }
}

impl From<u32> for ControlValue {
    fn from(v: u32) -> Self {
        ControlValue::UInt(v)
    }
}

impl From<f64> for ControlValue {
    fn from(v: f64) -> Self {
        ControlValue::Double(v)
    }
}

impl From<f32> for ControlValue {
    fn from(v: f32) -> Self {
        ControlValue::Double(f64::from(v))
    }
}

impl From<String> for ControlValue {
    fn from(v: String) -> Self {
        ControlValue::Text(v)
    }
}

impl From<&str> for ControlValue {
    fn from(v: &str) -> Self {
        ControlValue::Text(v.to_string())
    }
}

/// Data types a control port may hold.
///
/// Unsigned integers widen to floats; every other kind mismatch is an error.
pub trait ControlData: Clone + Send + 'static {
    /// Kind of value this type is converted from.
    const KIND: ControlKind;

    /// Converts a posted value into this type.
    fn from_value(value: &ControlValue) -> Result<Self, ControlError>;

    /// Converts this value back into a [`ControlValue`].
    fn into_value(self) -> ControlValue;
}

impl ControlData for bool {
    const KIND: ControlKind = ControlKind::Bool;

    fn from_value(value: &ControlValue) -> Result<Self, ControlError> {
        match value {
            ControlValue::Bool(v) => Ok(*v),
            other => Err(other.mismatch(Self::KIND)),
        }
    }

    fn into_value(self) -> ControlValue {
        ControlValue::Bool(self)
    }
}

impl ControlData for u32 {
    const KIND: ControlKind = ControlKind::UInt;

    fn from_value(value: &ControlValue) -> Result<Self, ControlError> {
        match value {
            ControlValue::UInt(v) => Ok(*v),
            other => Err(other.mismatch(Self::KIND)),
        }
    }

    fn into_value(self) -> ControlValue {
        ControlValue::UInt(self)
    }
}

impl ControlData for f64 {
    const KIND: ControlKind = ControlKind::Double;

    fn from_value(value: &ControlValue) -> Result<Self, ControlError> {
        match value {
            ControlValue::Double(v) => Ok(*v),
            ControlValue::UInt(v) => Ok(f64::from(*v)),
            other => Err(other.mismatch(Self::KIND)),
        }
    }

    fn into_value(self) -> ControlValue {
        ControlValue::Double(self)
    }
}

impl ControlData for f32 {
    const KIND: ControlKind = ControlKind::Double;

    fn from_value(value: &ControlValue) -> Result<Self, ControlError> {
        match value {
            ControlValue::Double(v) => Ok(*v as f32),
            ControlValue::UInt(v) => Ok(*v as f32),
            other => Err(other.mismatch(Self::KIND)),
        }
    }

    fn into_value(self) -> ControlValue {
        ControlValue::Double(f64::from(self))
    }
}

impl ControlData for String {
    const KIND: ControlKind = ControlKind::Text;

    fn from_value(value: &ControlValue) -> Result<Self, ControlError> {
        match value {
            ControlValue::Text(v) => Ok(v.clone()),
            other => Err(other.mismatch(Self::KIND)),
        }
    }

    fn into_value(self) -> ControlValue {
        ControlValue::Text(self)
    }
}

/// Maps a posted value before it is stored in a control.
pub type Validator<T> = Arc<dyn Fn(T) -> T + Send + Sync>;

/// Returns a validator that clamps values into `[min, max]`.
///
/// # Example
///
/// ```rust
/// use sdrflow_core::value::clamp;
///
/// let bw = clamp(10_000.0, 250_000.0);
/// assert_eq!(bw(1_000_000.0), 250_000.0);
/// assert_eq!(bw(5.0), 10_000.0);
/// assert_eq!(bw(200_000.0), 200_000.0);
/// ```
pub fn clamp<T>(min: T, max: T) -> Validator<T>
where
    T: PartialOrd + Copy + Send + Sync + 'static,
{
    Arc::new(move |v: T| {
        if v < min {
            min
        } else if v > max {
            max
        } else {
            v
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint_widens_to_double() {
        assert_eq!(f64::from_value(&ControlValue::UInt(7)), Ok(7.0));
        assert_eq!(f32::from_value(&ControlValue::UInt(2)), Ok(2.0));
    }

    #[test]
    fn double_does_not_narrow_to_uint() {
        let err = u32::from_value(&ControlValue::Double(1.5)).unwrap_err();
        assert_eq!(
            err,
            ControlError::TypeMismatch {
                expected: ControlKind::UInt,
                found: ControlKind::Double,
            }
        );
    }

    #[test]
    fn text_and_bool_round_trip() {
        let v = String::from("fm").into_value();
        assert_eq!(String::from_value(&v).unwrap(), "fm");
        assert!(bool::from_value(&true.into_value()).unwrap());
    }

    #[test]
    fn display_matches_query_style() {
        assert_eq!(ControlValue::Bool(true).to_string(), "1");
        assert_eq!(ControlValue::Double(103.5).to_string(), "103.5");
        assert_eq!(ControlValue::from("am").to_string(), "am");
    }

    #[test]
    fn untagged_serde_picks_narrowest_kind() {
        let v: ControlValue = serde_json::from_str("42").unwrap();
        assert_eq!(v, ControlValue::UInt(42));
        let v: ControlValue = serde_json::from_str("42.5").unwrap();
        assert_eq!(v, ControlValue::Double(42.5));
        let v: ControlValue = serde_json::from_str("\"wbfm\"").unwrap();
        assert_eq!(v.kind(), ControlKind::Text);
    }

    #[test]
    fn clamp_is_inclusive() {
        let c = clamp(0u32, 10);
        assert_eq!(c(0), 0);
        assert_eq!(c(10), 10);
        assert_eq!(c(11), 10);
    }
}
