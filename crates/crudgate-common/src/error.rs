//! Error types for the Crudgate data-access core

use thiserror::Error;

/// Errors raised by rule evaluation and query compilation
#[derive(Error, Debug)]
pub enum Error {
    // Authorization Errors
    #[error("Invalid project details provided")]
    InvalidProject,

    #[error("Rule did not match the request")]
    RuleMismatch,

    #[error("Invalid field target (expected args.* or res.*): {0}")]
    InvalidFieldTarget(String),

    // Compiler Errors
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operand: {0}")]
    InvalidOperand(String),

    #[error("Missing payload for operator: {0}")]
    MissingOperatorPayload(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    // Path Errors
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    // External Errors
    #[error("External call failed: {0}")]
    ExternalCallFailure(String),

    #[error("Token error: {0}")]
    TokenError(String),

    // General Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for Crudgate operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP status code for each error type
impl Error {
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::UnsupportedOperator(_)
            | Self::InvalidOperand(_)
            | Self::MissingOperatorPayload(_)
            | Self::InvalidIdentifier(_)
            | Self::InvalidPath(_)
            | Self::JsonError(_) => 400,

            // 403 Forbidden
            Self::InvalidProject | Self::RuleMismatch => 403,

            // 500 Internal Server Error
            Self::InvalidFieldTarget(_) | Self::TokenError(_) | Self::ConfigError(_) => 500,

            // 502 Bad Gateway
            Self::ExternalCallFailure(_) => 502,
        }
    }

    /// Stable error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidProject => "invalid_project",
            Self::RuleMismatch => "rule_mismatch",
            Self::InvalidFieldTarget(_) => "invalid_field_target",
            Self::UnsupportedOperator(_) => "unsupported_operator",
            Self::InvalidOperand(_) => "invalid_operand",
            Self::MissingOperatorPayload(_) => "missing_operator_payload",
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::InvalidPath(_) => "invalid_path",
            Self::ExternalCallFailure(_) => "external_call_failure",
            Self::TokenError(_) => "token_error",
            Self::ConfigError(_) => "config_error",
            Self::JsonError(_) => "json_error",
        }
    }

    /// Whether the gateway should answer with an authorization denial
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::InvalidProject | Self::RuleMismatch)
    }
}
