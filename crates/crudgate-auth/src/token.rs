//! Service tokens for gateway-internal calls

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crudgate_common::config::ProjectConfig;
use crudgate_common::error::{Error, Result};
use crudgate_common::{INTERNAL_ROLE, INTERNAL_USER_ID};

use crate::capability::TokenProvider;

/// Claims carried by a service token
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceClaims {
    pub id: String,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

/// Mints short-lived HS256 tokens identifying the gateway itself
pub struct JwtTokenProvider {
    secret: String,
    ttl_secs: u64,
}

impl JwtTokenProvider {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            secret: secret.to_string(),
            ttl_secs,
        }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(&config.secret, config.service_token_ttl_secs)
    }
}

impl TokenProvider for JwtTokenProvider {
    fn service_token(&self) -> Result<String> {
        if self.secret.is_empty() {
            return Err(Error::TokenError("no project secret configured".to_string()));
        }

        let now = chrono::Utc::now().timestamp() as usize;
        let claims = ServiceClaims {
            id: INTERNAL_USER_ID.to_string(),
            role: INTERNAL_ROLE.to_string(),
            exp: now + self.ttl_secs as usize,
            iat: now,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| Error::TokenError(e.to_string()))
    }
}

/// Hands out a fixed, pre-issued token
pub struct StaticTokenProvider(String);

impl StaticTokenProvider {
    pub fn new(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl TokenProvider for StaticTokenProvider {
    fn service_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
