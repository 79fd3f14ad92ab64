//! Dynamic SQL values.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// A dynamically-typed SQL value.
///
/// Used for parameter binding, for row cells returned by a store connection,
/// and for the scalar properties of mapped entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 64-bit floating point
    Double(f64),

    /// Text string
    Text(String),

    /// Binary data
    Bytes(Vec<u8>),

    /// JSON value
    Json(serde_json::Value),
}

/// Hashable identity of a [`Value`], used when grouping rows by key columns.
///
/// Integer widths and booleans collapse onto one representation so that a key
/// read back as `Int(1)` matches one bound as `BigInt(1)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Integer(i64),
    Float(u64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Double(_) => "DOUBLE",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Json(_) => "JSON",
        }
    }

    /// Try to convert this value to a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::BigInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Try to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Bool(v) => Some(if *v { 1 } else { 0 }),
            _ => None,
        }
    }

    /// Try to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Int(v) => Some(f64::from(*v)),
            Value::BigInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a byte slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Grouping identity of this value.
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Bool(v) => ValueKey::Integer(i64::from(*v)),
            Value::Int(v) => ValueKey::Integer(i64::from(*v)),
            Value::BigInt(v) => ValueKey::Integer(*v),
            Value::Double(v) => ValueKey::Float(v.to_bits()),
            Value::Text(s) => ValueKey::Text(s.clone()),
            Value::Bytes(b) => ValueKey::Bytes(b.clone()),
            Value::Json(j) => ValueKey::Text(j.to_string()),
        }
    }

    /// Render this value as raw SQL text.
    ///
    /// Used for literal (`${...}`) substitution. Text is inserted verbatim,
    /// without quoting or escaping. Bytes become an `X'..'` blob literal.
    pub fn to_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::BigInt(n) => n.to_string(),
            Value::Double(n) => n.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => {
                let mut literal = String::with_capacity(b.len() * 2 + 3);
                literal.push_str("X'");
                for byte in b {
                    let _ = write!(literal, "{byte:02X}");
                }
                literal.push('\'');
                literal
            }
            Value::Json(j) => j.to_string(),
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::BigInt(n) => serde_json::Value::from(*n),
            Value::Double(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => {
                serde_json::Value::Array(b.iter().map(|byte| serde_json::Value::from(*byte)).collect())
            }
            Value::Json(j) => j.clone(),
        }
    }

    /// Convert a JSON scalar into a value.
    ///
    /// Arrays and objects are kept as [`Value::Json`].
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::BigInt(i)
                } else {
                    n.as_f64().map_or(Value::Null, Value::Double)
                }
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Json(other.clone()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "[BLOB: {} bytes]", b.len()),
            other => write!(f, "{}", other.to_literal()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => Int,
    i64 => BigInt,
    f64 => Double,
    String => Text,
    Vec<u8> => Bytes,
    serde_json::Value => Json,
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::BigInt(v.into())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
