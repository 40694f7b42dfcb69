//! Dotted-path access into request state
//!
//! Paths such as `args.user.id` are resolved from the root of a JSON object.
//! A path may be wrapped in `{{ }}`; array segments take numeric indices.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

fn segments(key: &str) -> Result<Vec<&str>> {
    let trimmed = key.trim();
    let inner = trimmed
        .strip_prefix("{{")
        .and_then(|k| k.strip_suffix("}}"))
        .map_or(trimmed, str::trim);

    if inner.is_empty() {
        return Err(Error::InvalidPath("empty key".to_string()));
    }

    let parts: Vec<&str> = inner.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(Error::InvalidPath(key.to_string()));
    }
    Ok(parts)
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Load the value stored at `key`
///
/// # Errors
/// Returns `Error::InvalidPath` if any segment is missing.
pub fn load_value(key: &str, state: &Map<String, Value>) -> Result<Value> {
    let parts = segments(key)?;
    let (first, rest) = parts
        .split_first()
        .ok_or_else(|| Error::InvalidPath(key.to_string()))?;

    let mut current = state
        .get(*first)
        .ok_or_else(|| Error::InvalidPath(key.to_string()))?;
    for segment in rest {
        current = child(current, segment).ok_or_else(|| Error::InvalidPath(key.to_string()))?;
    }
    Ok(current.clone())
}

/// Store `value` at `key`, creating intermediate objects as needed
///
/// # Errors
/// Returns `Error::InvalidPath` if an intermediate segment holds a non-object.
pub fn store_value(key: &str, value: Value, state: &mut Map<String, Value>) -> Result<()> {
    let parts = segments(key)?;
    let (last, parents) = parts
        .split_last()
        .ok_or_else(|| Error::InvalidPath(key.to_string()))?;

    let mut current = state;
    for segment in parents {
        let entry = current
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = entry
            .as_object_mut()
            .ok_or_else(|| Error::InvalidPath(key.to_string()))?;
    }
    current.insert((*last).to_string(), value);
    Ok(())
}

/// Delete the value stored at `key`
///
/// A missing leaf is not an error.
///
/// # Errors
/// Returns `Error::InvalidPath` if an intermediate segment is missing or not an object.
pub fn delete_value(key: &str, state: &mut Map<String, Value>) -> Result<()> {
    let parts = segments(key)?;
    let (last, parents) = parts
        .split_last()
        .ok_or_else(|| Error::InvalidPath(key.to_string()))?;

    let mut current = state;
    for segment in parents {
        current = current
            .get_mut(*segment)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| Error::InvalidPath(key.to_string()))?;
    }
    current.shift_remove(*last);
    Ok(())
}

/// Deep-copy `value`, replacing every string that resolves against `state`
pub fn adjust(value: &Value, state: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => load_value(s, state).unwrap_or_else(|_| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(|v| adjust(v, state)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), adjust(v, state)))
                .collect(),
        ),
        _ => value.clone(),
    }
}
