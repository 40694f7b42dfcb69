//! Identifier validation
//!
//! Column and table names are interpolated into statement text, so every
//! dot-separated segment must be a plain `[A-Za-z_][A-Za-z0-9_]*` word.

use crudgate_common::error::{Error, Result};

pub fn check_identifier(name: &str) -> Result<&str> {
    if !name.is_empty() && name.split('.').all(is_plain_word) {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

fn is_plain_word(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
