//! Typed bind parameters

use serde::Serialize;
use serde_json::{Number, Value};

use crudgate_common::error::{Error, Result};

/// A bind parameter handed to the database driver
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Unsigned integers above `i64::MAX`
    UInt(u64),
    Float(f64),
    Text(String),
    /// Nested objects and arrays, bound as JSON documents
    Json(Value),
}

impl SqlValue {
    /// Convert a request value as given
    ///
    /// # Errors
    /// Returns `Error::InvalidOperand` for numbers with no exact representation.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(SqlValue::Null),
            Value::Bool(b) => Ok(SqlValue::Bool(*b)),
            Value::Number(n) => from_number(n),
            Value::String(s) => Ok(SqlValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Ok(SqlValue::Json(value.clone())),
        }
    }

    /// Convert an operand that must be numeric
    ///
    /// Integers become `Int`, everything else numeric becomes `Float`; strings
    /// are never coerced.
    ///
    /// # Errors
    /// Returns `Error::InvalidOperand` for non-numeric operands and for
    /// integers that do not fit in an `i64`.
    pub fn numeric(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => match from_number(n)? {
                SqlValue::UInt(u) => Err(Error::InvalidOperand(format!("integer {} out of range", u))),
                other => Ok(other),
            },
            other => Err(Error::InvalidOperand(format!(
                "expected a number, got {}",
                other
            ))),
        }
    }
}

fn from_number(n: &Number) -> Result<SqlValue> {
    if let Some(i) = n.as_i64() {
        return Ok(SqlValue::Int(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(SqlValue::UInt(u));
    }
    n.as_f64()
        .map(SqlValue::Float)
        .ok_or_else(|| Error::InvalidOperand(format!("unrepresentable number {}", n)))
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Int(i)
    }
}

impl From<f64> for SqlValue {
    fn from(f: f64) -> Self {
        SqlValue::Float(f)
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        SqlValue::Bool(b)
    }
}
