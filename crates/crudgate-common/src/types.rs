//! Shared request and response types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::path;

/// Identity carried by tokens minted for gateway-internal calls
pub const INTERNAL_USER_ID: &str = "internal-sc-user";

/// Role carried by tokens minted for gateway-internal calls
pub const INTERNAL_ROLE: &str = "sc-internal";

/// Request arguments, including the `args` payload and staged response fields
pub type RequestArgs = Map<String, Value>;

/// Verified caller claims (`id`, `role`, ...)
pub type AuthClaims = Map<String, Value>;

/// Kind of deferred response mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostProcessKind {
    Force,
    Remove,
}

/// A single deferred edit of the response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProcessAction {
    pub action: PostProcessKind,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PostProcessAction {
    pub fn force(field: &str, value: Value) -> Self {
        Self {
            action: PostProcessKind::Force,
            field: field.to_string(),
            value: Some(value),
        }
    }

    pub fn remove(field: &str) -> Self {
        Self {
            action: PostProcessKind::Remove,
            field: field.to_string(),
            value: None,
        }
    }
}

/// Ordered list of deferred response edits produced by rule evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostProcess {
    #[serde(rename = "postProcessAction", default)]
    pub actions: Vec<PostProcessAction>,
}

impl PostProcess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(action: PostProcessAction) -> Self {
        Self {
            actions: vec![action],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn extend(&mut self, other: PostProcess) {
        self.actions.extend(other.actions);
    }

    /// Apply the actions, in order, to a CRUD result
    ///
    /// Array results have the actions applied to every object element.
    ///
    /// # Errors
    /// Returns `Error::InvalidFieldTarget` for fields outside `res`, or
    /// `Error::InvalidPath` if a path cannot be written.
    pub fn apply(&self, result: &mut Value) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        match result {
            Value::Array(docs) => {
                for doc in docs.iter_mut().filter(|d| d.is_object()) {
                    self.apply_to_document(doc)?;
                }
                Ok(())
            }
            Value::Object(_) => self.apply_to_document(result),
            _ => Ok(()),
        }
    }

    fn apply_to_document(&self, doc: &mut Value) -> Result<()> {
        let mut state = Map::new();
        state.insert("res".to_string(), doc.take());

        let outcome = self.actions.iter().try_for_each(|action| {
            if action.field != "res" && !action.field.starts_with("res.") {
                return Err(Error::InvalidFieldTarget(action.field.clone()));
            }
            match action.action {
                PostProcessKind::Force => path::store_value(
                    &action.field,
                    action.value.clone().unwrap_or(Value::Null),
                    &mut state,
                ),
                PostProcessKind::Remove => path::delete_value(&action.field, &mut state),
            }
        });

        *doc = state.remove("res").unwrap_or(Value::Null);
        outcome
    }
}

/// Single read or full read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadOperation {
    One,
    #[default]
    All,
    Count,
}

/// Projection, ordering and paging for reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Fields to select; empty selects everything
    pub select: Vec<String>,
    /// Sort keys, `-field` for descending
    pub sort: Vec<String>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

/// Read request against a table or collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadRequest {
    pub find: Map<String, Value>,
    pub operation: ReadOperation,
    pub options: ReadOptions,
}

/// Update request: `find` predicates plus an operator map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateRequest {
    pub find: Map<String, Value>,
    pub update: Map<String, Value>,
}

/// Insert request carrying one or more documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateRequest {
    pub documents: Vec<Map<String, Value>>,
}

/// Delete request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteRequest {
    pub find: Map<String, Value>,
}
