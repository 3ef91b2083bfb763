#![forbid(unsafe_code)]

//! Dynamically typed field values and reference-type casting.
//!
//! [`Value`] is what accessors read from widgets, what references publish,
//! and what expressions produce. [`Value::Undefined`] is the explicit
//! "absent" sentinel: a reference that resolves to no element reads as
//! `Undefined` rather than failing.
//!
//! # Truthiness
//!
//! `Undefined`, `Null`, `false`, `0`, `NaN`, and the empty string are falsy.
//! Everything else, including empty lists and maps, is truthy.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A field or expression value.
///
/// Equality treats two `NaN` numbers as equal, so a reference that keeps
/// reading `NaN` is not seen as changing.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent data (unresolved reference, unset result).
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Whether this is the absent sentinel.
    #[inline]
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Truthiness as used by actions and negation.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Text(s) => !s.is_empty(),
            Self::List(_) | Self::Map(_) => true,
        }
    }

    /// Whether the value counts as "not filled in": undefined, null, empty
    /// text, or an empty list.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => true,
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Text form written into widget `value` properties.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Undefined | Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Text(s) => s.clone(),
            Self::List(items) => items
                .iter()
                .map(Self::to_text)
                .collect::<Vec<_>>()
                .join(","),
            Self::Map(_) => self.to_json().to_string(),
        }
    }

    /// Numeric coercion: booleans map to 0/1, blank text to 0, unparsable
    /// input to NaN.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Self::List(_) | Self::Map(_) => f64::NAN,
        }
    }

    /// Element count for lists; `None` for everything else.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::List(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Cast to a declared reference type. `Undefined` is never cast, so the
    /// absent sentinel survives every conversion. [`RefType::Auto`] and
    /// [`RefType::Any`] leave the value untouched.
    #[must_use]
    pub fn cast(self, ty: RefType) -> Self {
        if self.is_undefined() {
            return self;
        }
        match ty {
            RefType::Auto | RefType::Any => self,
            RefType::Boolean => Self::Bool(self.is_truthy()),
            RefType::BoolString => Self::Bool(self.to_text() == "true"),
            RefType::String => Self::Text(self.to_text()),
            RefType::Number => Self::Number(self.to_number()),
            RefType::Json => match self {
                Self::Text(text) => match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(json) => Self::from(json),
                    Err(error) => {
                        tracing::warn!(
                            message = "dependson.value.json_cast",
                            %error,
                            text = %text
                        );
                        Self::Undefined
                    }
                },
                other => other,
            },
        }
    }

    /// Convert into a JSON value (`Undefined` becomes `null`).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Undefined | Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            _ => false,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            other => f.write_str(&other.to_text()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

// ---------------------------------------------------------------------------
// RefType
// ---------------------------------------------------------------------------

/// Declared type of a reference, controlling how its raw widget value is
/// cast before expressions see it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefType {
    /// Use the resolved accessor's preferable type.
    #[default]
    Auto,
    /// Pass the raw value through.
    Any,
    Boolean,
    /// `true` iff the text form equals `"true"`.
    BoolString,
    String,
    Number,
    /// Parse the text form as JSON.
    Json,
}

impl RefType {
    /// Attribute spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Any => "any",
            Self::Boolean => "boolean",
            Self::BoolString => "boolstring",
            Self::String => "string",
            Self::Number => "number",
            Self::Json => "json",
        }
    }
}

/// Unrecognised reference type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown reference type {0:?}")]
pub struct UnknownRefType(pub String);

impl FromStr for RefType {
    type Err = UnknownRefType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "any" => Ok(Self::Any),
            "boolean" => Ok(Self::Boolean),
            "boolstring" => Ok(Self::BoolString),
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "json" => Ok(Self::Json),
            _ => Err(UnknownRefType(s.to_string())),
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
