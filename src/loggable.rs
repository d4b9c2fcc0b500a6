//! Loggable objects - parameters and metrics reported to the experiment logger
//!
//! Every participant of an experiment (model, data loader, evaluator,
//! processors) implements [`Loggable`] so the runner can harvest its
//! configuration and forward it to the tracking backend.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Scalar parameter value.
///
/// Only numbers, booleans and strings are loggable as parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Str(String),
}

/// Parameter mapping, ordered by key.
pub type Params = BTreeMap<String, ParamValue>;

/// Metric mapping, ordered by key.
pub type Metrics = BTreeMap<String, f64>;

impl ParamValue {
    /// Get the string value, if this is a string parameter.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as `f64`, if numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<usize> for ParamValue {
    #[allow(clippy::cast_possible_wrap)]
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// An object that can report its parameters and metrics for experiment logging.
pub trait Loggable {
    /// Name logged under the object's role (e.g. `Model`, `DataLoader`).
    ///
    /// Implementors without an explicit name usually return
    /// [`short_type_name::<Self>()`](short_type_name).
    fn name(&self) -> &str;

    /// Parameters to store in the experiment logging system.
    ///
    /// Use [`scalar_params`] to harvest the scalar fields of a serializable
    /// configuration struct.
    fn params(&self) -> Params;

    /// Metrics to store in the experiment logging system (may be empty).
    fn metrics(&self) -> Metrics;
}

/// Unqualified type name of `T`, without module path or generic arguments.
///
/// ```rust
/// struct IrisSvm;
/// assert_eq!(exp_runner::loggable::short_type_name::<IrisSvm>(), "IrisSvm");
/// ```
#[must_use]
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Harvest the scalar top-level fields of a serializable value.
///
/// Numbers, booleans and strings are kept. Collections, nested structs and
/// `null` values are excluded; the excluded keys are reported at `debug`
/// level so the loss is visible when tracing is enabled.
#[must_use]
pub fn scalar_params<T: Serialize + ?Sized>(value: &T) -> Params {
    let json = match serde_json::to_value(value) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "failed to serialize value for parameter harvesting");
            return Params::new();
        }
    };

    let serde_json::Value::Object(fields) = json else {
        debug!("parameter harvesting skipped: value is not a struct or map");
        return Params::new();
    };

    let mut params = Params::new();
    let mut dropped = Vec::new();
    for (key, field) in fields {
        match field {
            serde_json::Value::Bool(b) => {
                params.insert(key, ParamValue::Bool(b));
            }
            serde_json::Value::Number(n) => {
                let value = n
                    .as_i64()
                    .map_or_else(|| ParamValue::Float(n.as_f64().unwrap_or(f64::NAN)), ParamValue::Int);
                params.insert(key, value);
            }
            serde_json::Value::String(s) => {
                params.insert(key, ParamValue::Str(s));
            }
            _ => dropped.push(key),
        }
    }

    if !dropped.is_empty() {
        debug!(?dropped, "non-scalar fields excluded from logged params");
    }

    params
}
