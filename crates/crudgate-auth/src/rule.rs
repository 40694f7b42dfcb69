//! Security rule tree
//!
//! Rules are loaded once from project configuration and are read-only during
//! evaluation. The JSON shape is internally tagged on `rule`:
//!
//! ```json
//! {"rule": "and", "clauses": [
//!     {"rule": "match", "type": "string", "eval": "==", "field": "auth.role", "value": "admin"},
//!     {"rule": "force", "field": "args.owner", "value": "auth.id"}
//! ]}
//! ```
//!
//! Operand strings resolve differently per rule kind:
//! - `match` resolves only `{{ path }}` templates; any other string is a literal.
//! - `force` treats every string as a path into the request arguments and
//!   falls back to the literal only when the path does not resolve. A value
//!   such as `"auth"` therefore forces the whole `auth` object. Wrap literals
//!   that collide with a top-level key in a non-string value or pick another
//!   spelling.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A node of the security policy tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "lowercase")]
pub enum Rule {
    Allow,
    Authenticated,
    Deny,
    Match(MatchRule),
    And {
        #[serde(default)]
        clauses: Vec<Rule>,
    },
    Or {
        #[serde(default)]
        clauses: Vec<Rule>,
    },
    Webhook {
        url: String,
    },
    Query(QueryRule),
    /// `value` strings are resolved as request paths first, see the module docs
    Force {
        field: String,
        #[serde(default)]
        value: Value,
    },
    Remove {
        #[serde(default)]
        fields: Vec<String>,
    },
    /// Any rule kind this build does not know; always denies
    #[serde(other)]
    Unrecognized,
}

impl Rule {
    /// Name of the rule kind, as written in configuration
    pub fn kind(&self) -> &'static str {
        match self {
            Rule::Allow => "allow",
            Rule::Authenticated => "authenticated",
            Rule::Deny => "deny",
            Rule::Match(_) => "match",
            Rule::And { .. } => "and",
            Rule::Or { .. } => "or",
            Rule::Webhook { .. } => "webhook",
            Rule::Query(_) => "query",
            Rule::Force { .. } => "force",
            Rule::Remove { .. } => "remove",
            Rule::Unrecognized => "unrecognized",
        }
    }
}

/// Typed comparison between a request field and a configured value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRule {
    #[serde(rename = "type")]
    pub match_type: MatchType,
    #[serde(default)]
    pub eval: EvalOp,
    pub field: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    String,
    Number,
    Bool,
    #[serde(other)]
    Unknown,
}

/// Comparison operator of a match rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvalOp {
    #[default]
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "notIn")]
    NotIn,
}

/// Existence check against another table or collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRule {
    pub db: String,
    pub col: String,
    #[serde(default)]
    pub find: Map<String, Value>,
}
