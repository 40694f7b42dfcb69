//! HTTP requester backed by reqwest

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crudgate_common::error::{Error, Result};

use crate::capability::HttpRequester;

/// Header carrying the gateway's own service token
pub const SERVICE_TOKEN_HEADER: &str = "x-sc-token";

/// Default `HttpRequester` used for webhook rules
#[derive(Clone, Default)]
pub struct ReqwestRequester {
    client: reqwest::Client,
}

impl ReqwestRequester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpRequester for ReqwestRequester {
    async fn request(
        &self,
        method: Method,
        url: &str,
        token: &str,
        service_token: &str,
        payload: &Value,
    ) -> Result<Value> {
        let response = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(SERVICE_TOKEN_HEADER, format!("Bearer {}", service_token))
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::ExternalCallFailure(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::ExternalCallFailure(e.to_string()))?;

        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(body) => body,
                Err(_) if !status.is_success() => Value::Null,
                Err(e) => {
                    return Err(Error::ExternalCallFailure(format!(
                        "invalid response body from {}: {}",
                        url, e
                    )))
                }
            }
        };

        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| format!("service responded with status {}", status));
            debug!(%url, %status, "webhook call rejected");
            return Err(Error::ExternalCallFailure(message));
        }

        Ok(body)
    }
}
