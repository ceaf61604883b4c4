//! Runtime values produced by model expressions.
//!
//! Values are untagged on the wire so that result artifacts stay compact:
//! numbers serialize as JSON numbers, booleans as booleans, and the
//! unresolved sentinel `Undefined` as `null`.

use serde::{Deserialize, Serialize};

/// A value held by a parameter, variable, or event argument.
///
/// `Undefined` marks a variable slot that has not been (or could not be)
/// computed. It is distinct from every valid value, so a computed zero is
/// never confused with a failed computation.
///
/// # Examples
///
/// ```
/// use econsim::Value;
///
/// let revenue = Value::Number(5000.0);
/// let paused = Value::Bool(false);
///
/// assert_eq!(revenue.as_number(), Some(5000.0));
/// assert_eq!(paused.as_bool(), Some(false));
/// assert!(Value::Undefined.is_undefined());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Text(String),
    #[default]
    Undefined,
    Structured(serde_json::Value),
}

impl Value {
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric view used for aggregation: booleans count as 0/1.
    #[must_use]
    pub const fn numeric(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Bool(true) => Some(1.0),
            Self::Bool(false) => Some(0.0),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Bool(_) => "bool",
            Self::Text(_) => "text",
            Self::Undefined => "undefined",
            Self::Structured(_) => "structured",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Undefined => write!(f, "undefined"),
            Self::Structured(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Structured(v)
    }
}
