//! Security Rule Engine for Crudgate
//!
//! Authorizes CRUD requests before they reach a database:
//! - Declarative rule trees (`allow`, `deny`, `match`, `and`, `or`, ...)
//! - Webhook and existence-query rules behind injectable capabilities
//! - `force`/`remove` rules that edit request arguments or defer response edits
//! - Internal service tokens for gateway-originated calls

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod capability;
pub mod engine;
pub mod matcher;
pub mod rule;
pub mod token;
pub mod webhook;

pub use capability::{CrudReader, HttpRequester, TokenProvider};
pub use engine::{FieldTarget, RuleEngine, WEBHOOK_TIMEOUT};
pub use rule::{EvalOp, MatchRule, MatchType, QueryRule, Rule};
pub use token::{JwtTokenProvider, StaticTokenProvider};
pub use webhook::ReqwestRequester;
