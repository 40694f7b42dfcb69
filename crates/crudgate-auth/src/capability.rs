//! External capabilities the rule engine calls out to
//!
//! The engine never talks to a database or the network itself; `query` and
//! `webhook` rules go through these traits so they can be swapped for fakes.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crudgate_common::error::Result;
use crudgate_common::ReadRequest;

/// Read access to the gateway's CRUD layer, used by `query` rules
#[async_trait]
pub trait CrudReader: Send + Sync {
    /// Execute a read against `db_alias` / `collection` in `project`
    ///
    /// Implementations report driver failures as `Error::ExternalCallFailure`.
    async fn read(
        &self,
        db_alias: &str,
        project: &str,
        collection: &str,
        request: &ReadRequest,
    ) -> Result<Value>;
}

/// Outbound HTTP calls, used by `webhook` rules
#[async_trait]
pub trait HttpRequester: Send + Sync {
    /// Send `payload` as JSON to `url`, authenticated with both the caller's
    /// token and the gateway's own service token
    async fn request(
        &self,
        method: Method,
        url: &str,
        token: &str,
        service_token: &str,
        payload: &Value,
    ) -> Result<Value>;
}

/// Source of the gateway's own access token for service-to-service calls
pub trait TokenProvider: Send + Sync {
    fn service_token(&self) -> Result<String>;
}
