//! Update operators and their SET fragments

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crudgate_common::error::{Error, Result};

use crate::dialect::ParamBinder;
use crate::value::SqlValue;

/// Mongo-style update operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOperator {
    Set,
    Inc,
    Mul,
    Min,
    Max,
    CurrentDate,
}

impl UpdateOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOperator::Set => "$set",
            UpdateOperator::Inc => "$inc",
            UpdateOperator::Mul => "$mul",
            UpdateOperator::Min => "$min",
            UpdateOperator::Max => "$max",
            UpdateOperator::CurrentDate => "$currentDate",
        }
    }

    /// Render the `field=expr` fragment for one updated column
    ///
    /// # Errors
    /// `InvalidOperand` when the operand has the wrong shape for the operator.
    pub fn fragment(&self, field: &str, operand: &Value, binder: &mut ParamBinder) -> Result<String> {
        let fragment = match self {
            UpdateOperator::Set => {
                let p = binder.bind(SqlValue::from_json(operand)?);
                format!("{}={}", field, p)
            }
            UpdateOperator::Inc => {
                let p = binder.bind(numeric_operand(self, field, operand)?);
                format!("{0}={0}+{1}", field, p)
            }
            UpdateOperator::Mul => {
                let p = binder.bind(numeric_operand(self, field, operand)?);
                format!("{0}={0}*{1}", field, p)
            }
            UpdateOperator::Min => {
                let p = binder.bind(numeric_operand(self, field, operand)?);
                format!("{0}=LEAST({0},{1})", field, p)
            }
            UpdateOperator::Max => {
                let p = binder.bind(numeric_operand(self, field, operand)?);
                format!("{0}=GREATEST({0},{1})", field, p)
            }
            UpdateOperator::CurrentDate => {
                let keyword = current_date_keyword(field, operand, binder)?;
                // the slot is consumed even though nothing is bound
                binder.skip();
                format!("{}={}", field, keyword)
            }
        };
        Ok(fragment)
    }
}

impl fmt::Display for UpdateOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateOperator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "$set" => Ok(UpdateOperator::Set),
            "$inc" => Ok(UpdateOperator::Inc),
            "$mul" => Ok(UpdateOperator::Mul),
            "$min" => Ok(UpdateOperator::Min),
            "$max" => Ok(UpdateOperator::Max),
            "$currentDate" => Ok(UpdateOperator::CurrentDate),
            other => Err(Error::UnsupportedOperator(other.to_string())),
        }
    }
}

fn numeric_operand(op: &UpdateOperator, field: &str, operand: &Value) -> Result<SqlValue> {
    SqlValue::numeric(operand).map_err(|_| {
        Error::InvalidOperand(format!("{} on {} requires a number, got {}", op, field, operand))
    })
}

fn current_date_keyword(field: &str, operand: &Value, binder: &ParamBinder) -> Result<&'static str> {
    let kind = operand
        .as_object()
        .and_then(|options| options.get("$type"))
        .and_then(Value::as_str);

    match kind {
        Some("timestamp") => Ok(binder.dialect().current_timestamp()),
        Some("date") => Ok(binder.dialect().current_date()),
        _ => Err(Error::InvalidOperand(format!(
            "$currentDate on {} requires {{\"$type\": \"timestamp\" | \"date\"}}, got {}",
            field, operand
        ))),
    }
}
