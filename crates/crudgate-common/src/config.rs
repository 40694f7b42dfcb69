//! Configuration types for the Crudgate data-access core

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Main configuration for the gateway core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Project the rule engine is bound to
    pub project: ProjectConfig,
    /// SQL compiler configuration
    pub sql: SqlConfig,
}

impl GatewayConfig {
    /// Load configuration from a TOML or JSON file
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the file cannot be read or parsed.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

        if path.as_ref().extension().map_or(false, |ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| Error::ConfigError(format!("Failed to parse JSON config: {}", e)))
        } else {
            Self::from_toml(&content)
        }
    }

    /// Parse configuration from a TOML string
    ///
    /// # Errors
    /// Returns `Error::ConfigError` on malformed TOML.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse TOML config: {}", e)))
    }
}

/// Project identity and service credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project id requests must be addressed to
    pub id: String,
    /// HS256 secret used to mint internal service tokens
    pub secret: String,
    /// Lifetime of a minted service token in seconds
    pub service_token_ttl_secs: u64,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            secret: String::new(),
            service_token_ttl_secs: 300,
        }
    }
}

/// Query compiler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    /// Database family: "mysql", "postgres" or "sqlserver"
    pub dialect: String,
    /// Address tables without the project schema prefix
    pub remove_project_scope: bool,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            dialect: "mysql".to_string(),
            remove_project_scope: false,
        }
    }
}
