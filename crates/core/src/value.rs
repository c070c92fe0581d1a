//! Value types for NousData
//!
//! This module defines:
//! - Value: the primitive held by one field of a stored record
//! - FieldType: the declared type of an entity field
//!
//! ## Field Value Model
//!
//! The Value enum has exactly 6 variants:
//! - Null, Bool, Int, Float, Text, Date
//!
//! ### Type Rules
//!
//! - Equality never crosses types: `Int(1) != Float(1.0)`
//! - Ordering (used by filters) compares Int and Float numerically
//! - Float equality follows IEEE-754: `NaN != NaN`, `-0.0 == 0.0`
//! - Dates are calendar dates rendered as `YYYY-MM-DD`
//!
//! Text-based backends (CSV, delimited text) store every value as a string;
//! [`Value::coerce`] turns those back into the declared field type.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Canonical textual format for dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Declared type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// true / false
    Bool,
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// UTF-8 string
    Text,
    /// Calendar date
    Date,
}

impl FieldType {
    /// Stable lowercase name, used as a type tag by the XML backend
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::Date => "date",
        }
    }

    /// Parse a name produced by [`FieldType::as_str`]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(FieldType::Bool),
            "int" => Some(FieldType::Int),
            "float" => Some(FieldType::Float),
            "text" => Some(FieldType::Text),
            "date" => Some(FieldType::Date),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A primitive field value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point (IEEE-754)
    Float(f64),
    /// UTF-8 string
    Text(String),
    /// Calendar date
    Date(NaiveDate),
}

// Custom PartialEq implementation for IEEE-754 float semantics
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
        }
    }

    /// Field type of this value, `None` for Null
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(FieldType::Bool),
            Value::Int(_) => Some(FieldType::Int),
            Value::Float(_) => Some(FieldType::Float),
            Value::Text(_) => Some(FieldType::Text),
            Value::Date(_) => Some(FieldType::Date),
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as bool if this is a Bool value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Int value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float value
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Numeric view over Int and Float
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as &str if this is a Text value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get as a date if this is a Date value
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// True when a value of this variant may be stored in a field of type `ty`.
    ///
    /// Null fits every type; Int widens into Float.
    pub fn fits(&self, ty: FieldType) -> bool {
        match (self, ty) {
            (Value::Null, _) => true,
            (Value::Int(_), FieldType::Float) => true,
            (v, ty) => v.field_type() == Some(ty),
        }
    }

    /// Convert this value into the declared field type.
    ///
    /// Used when loading from backends that lose type information (CSV,
    /// delimited text, SQLite integer booleans) and by field conversion
    /// migrations. Null stays Null.
    pub fn coerce(self, ty: FieldType) -> Result<Value, String> {
        let fail = |v: &Value| format!("cannot convert {} value '{}' to {}", v.type_name(), v, ty);
        match (self, ty) {
            (Value::Null, _) => Ok(Value::Null),
            (v @ Value::Bool(_), FieldType::Bool)
            | (v @ Value::Int(_), FieldType::Int)
            | (v @ Value::Float(_), FieldType::Float)
            | (v @ Value::Text(_), FieldType::Text)
            | (v @ Value::Date(_), FieldType::Date) => Ok(v),

            (Value::Int(i), FieldType::Float) => Ok(Value::Float(i as f64)),
            (Value::Float(f), FieldType::Int) if f.fract() == 0.0 && f.is_finite() => {
                Ok(Value::Int(f as i64))
            }
            (Value::Int(0), FieldType::Bool) => Ok(Value::Bool(false)),
            (Value::Int(1), FieldType::Bool) => Ok(Value::Bool(true)),
            (Value::Bool(b), FieldType::Int) => Ok(Value::Int(b as i64)),

            (Value::Text(s), FieldType::Int) => {
                s.trim().parse::<i64>().map(Value::Int).map_err(|_| fail(&Value::Text(s)))
            }
            (Value::Text(s), FieldType::Float) => {
                s.trim().parse::<f64>().map(Value::Float).map_err(|_| fail(&Value::Text(s)))
            }
            (Value::Text(s), FieldType::Bool) => {
                let parsed = match s.trim() {
                    "true" | "1" => Some(true),
                    "false" | "0" => Some(false),
                    _ => None,
                };
                parsed.map(Value::Bool).ok_or_else(|| fail(&Value::Text(s)))
            }
            (Value::Text(s), FieldType::Date) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .map(Value::Date)
                .map_err(|_| fail(&Value::Text(s))),

            (v, FieldType::Text) => Ok(Value::Text(v.to_string())),
            (v, _) => Err(fail(&v)),
        }
    }

    /// Ordering used by filters.
    ///
    /// Int and Float compare numerically; other variants only compare with
    /// themselves. Null equals Null and is unordered against anything else.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }

    /// Convert to a JSON scalar. Dates become ISO strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(d.format(DATE_FORMAT).to_string()),
        }
    }

    /// Convert from a JSON scalar. Strings stay Text until coerced by a schema.
    pub fn from_json(value: serde_json::Value) -> Result<Value, String> {
        match value {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else {
                    n.as_f64()
                        .map(Value::Float)
                        .ok_or_else(|| format!("number out of range: {}", n))
                }
            }
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            serde_json::Value::Array(_) => Err("arrays are not field values".to_string()),
            serde_json::Value::Object(_) => Err("objects are not field values".to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// From implementations for ergonomic API usage
// ============================================================================

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(s.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
