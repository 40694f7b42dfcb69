//! Typed comparators for `match` rules

use serde_json::Value;
use std::cmp::Ordering;
use tracing::debug;

use crudgate_common::error::{Error, Result};
use crudgate_common::path;
use crudgate_common::RequestArgs;

use crate::rule::{EvalOp, MatchRule, MatchType};

/// Check a match rule against the request arguments
///
/// # Errors
/// Returns `Error::RuleMismatch` on a failed comparison, a missing field, a
/// wrongly typed operand or an operator the type does not support.
pub fn match_rule(rule: &MatchRule, args: &RequestArgs) -> Result<()> {
    let Ok(actual) = path::load_value(&rule.field, args) else {
        debug!(field = %rule.field, "match field not present");
        return Err(Error::RuleMismatch);
    };
    let expected = resolve_operand(&rule.value, args);

    let matched = match rule.match_type {
        MatchType::String => match_string(rule.eval, &actual, &expected),
        MatchType::Number => match_number(rule.eval, &actual, &expected),
        MatchType::Bool => match_bool(rule.eval, &actual, &expected),
        MatchType::Unknown => None,
    };

    if matched == Some(true) {
        Ok(())
    } else {
        Err(Error::RuleMismatch)
    }
}

/// Only explicit `{{ path }}` templates are resolved; plain strings are literals.
fn resolve_operand(value: &Value, args: &RequestArgs) -> Value {
    match value {
        Value::String(s) if s.trim_start().starts_with("{{") => {
            path::load_value(s, args).unwrap_or_else(|_| value.clone())
        }
        _ => value.clone(),
    }
}

fn match_string(op: EvalOp, actual: &Value, expected: &Value) -> Option<bool> {
    let actual = actual.as_str()?;
    match op {
        EvalOp::Eq => Some(actual == expected.as_str()?),
        EvalOp::Ne => Some(actual != expected.as_str()?),
        EvalOp::In | EvalOp::NotIn => {
            let found = expected
                .as_array()?
                .iter()
                .any(|candidate| candidate.as_str() == Some(actual));
            Some(found == (op == EvalOp::In))
        }
        _ => None,
    }
}

fn match_number(op: EvalOp, actual: &Value, expected: &Value) -> Option<bool> {
    if !actual.is_number() {
        return None;
    }
    match op {
        EvalOp::In | EvalOp::NotIn => {
            let found = expected
                .as_array()?
                .iter()
                .any(|candidate| compare_numbers(actual, candidate) == Some(Ordering::Equal));
            Some(found == (op == EvalOp::In))
        }
        EvalOp::Eq => Some(compare_numbers(actual, expected)? == Ordering::Equal),
        EvalOp::Ne => Some(compare_numbers(actual, expected)? != Ordering::Equal),
        EvalOp::Gt => Some(compare_numbers(actual, expected)? == Ordering::Greater),
        EvalOp::Gte => Some(compare_numbers(actual, expected)? != Ordering::Less),
        EvalOp::Lt => Some(compare_numbers(actual, expected)? == Ordering::Less),
        EvalOp::Lte => Some(compare_numbers(actual, expected)? != Ordering::Greater),
    }
}

/// Integers compare exactly; `f64` is used only when a side is fractional
fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
    match (as_integer(a), as_integer(b)) {
        (Some(a), Some(b)) => Some(a.cmp(&b)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn as_integer(value: &Value) -> Option<i128> {
    value
        .as_i64()
        .map(i128::from)
        .or_else(|| value.as_u64().map(i128::from))
}

fn match_bool(op: EvalOp, actual: &Value, expected: &Value) -> Option<bool> {
    let actual = actual.as_bool()?;
    let expected = expected.as_bool()?;
    match op {
        EvalOp::Eq => Some(actual == expected),
        EvalOp::Ne => Some(actual != expected),
        _ => None,
    }
}
