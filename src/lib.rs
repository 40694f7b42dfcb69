//! Crudgate data-access core
//!
//! Authorizes document-style CRUD requests with declarative security rules,
//! then compiles them into parameterized SQL for MySQL, PostgreSQL or
//! SQL Server.
//!
//! # Features
//!
//! - **Security rules** - `allow`, `deny`, `match`, `and`, `or`, `webhook`, `query`, `force`, `remove`
//! - **Query compiler** - update operators, find filters and per-dialect placeholders
//! - **Response post-processing** - deferred `res.*` edits from `force`/`remove` rules

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub use crudgate_auth as auth;
pub use crudgate_common as common;
pub use crudgate_sql as sql;

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use crudgate_auth::{
    CrudReader, HttpRequester, JwtTokenProvider, ReqwestRequester, Rule, RuleEngine, TokenProvider,
};
use crudgate_common::config::GatewayConfig;
use crudgate_common::error::{Error, Result};
use crudgate_common::{
    AuthClaims, CreateRequest, DeleteRequest, PostProcess, ReadRequest, RequestArgs, UpdateRequest,
};
use crudgate_sql::{CompiledQuery, SqlCompiler};

/// A compiled statement cleared by the security rules
#[derive(Debug, Clone)]
pub struct Authorized {
    pub query: CompiledQuery,
    /// Edits to apply to the database result before returning it
    pub post_process: PostProcess,
}

/// Rule engine and query compiler for one project
pub struct Gateway {
    config: GatewayConfig,
    engine: RuleEngine,
    compiler: SqlCompiler,
}

impl Gateway {
    /// Create a gateway that calls webhooks over HTTP and signs its own service tokens
    ///
    /// # Errors
    /// Returns an error if the configured SQL dialect is unknown.
    pub fn new(config: GatewayConfig, crud: Arc<dyn CrudReader>) -> Result<Self> {
        let tokens = Arc::new(JwtTokenProvider::from_config(&config.project));
        Self::with_capabilities(config, crud, Arc::new(ReqwestRequester::new()), tokens)
    }

    /// Create a gateway with explicit capabilities
    ///
    /// # Errors
    /// Returns an error if the configured SQL dialect is unknown.
    pub fn with_capabilities(
        config: GatewayConfig,
        crud: Arc<dyn CrudReader>,
        http: Arc<dyn HttpRequester>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self> {
        let compiler = SqlCompiler::from_config(&config.sql)?;
        let engine = RuleEngine::new(&config.project.id, crud, http, tokens);

        info!(
            project = %config.project.id,
            dialect = %compiler.dialect(),
            "Initialized gateway"
        );

        Ok(Self {
            config,
            engine,
            compiler,
        })
    }

    #[must_use]
    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    #[must_use]
    pub fn compiler(&self) -> &SqlCompiler {
        &self.compiler
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Authorize and compile an update
    ///
    /// The rule sees the request under `args.find` and `args.update`; rules
    /// that force or remove fields there change what gets compiled.
    ///
    /// # Errors
    /// Returns the denying rule's error or the compiler's error.
    pub async fn update(
        &self,
        rule: &Rule,
        auth: &AuthClaims,
        token: &str,
        table: &str,
        request: UpdateRequest,
        operator: &str,
    ) -> Result<Authorized> {
        let mut payload = Map::new();
        payload.insert("find".to_string(), Value::Object(request.find));
        payload.insert("update".to_string(), Value::Object(request.update));
        payload.insert("op".to_string(), Value::String(operator.to_string()));

        let (payload, post_process) = self.authorize(rule, auth, token, payload).await?;
        let request = UpdateRequest {
            find: take_object(&payload, "find")?,
            update: take_object(&payload, "update")?,
        };
        let query = self
            .compiler
            .compile_update(self.project(), table, &request, operator)?;
        Ok(Authorized { query, post_process })
    }

    /// Authorize and compile a read
    ///
    /// # Errors
    /// Returns the denying rule's error or the compiler's error.
    pub async fn read(
        &self,
        rule: &Rule,
        auth: &AuthClaims,
        token: &str,
        table: &str,
        request: ReadRequest,
    ) -> Result<Authorized> {
        let payload = into_object(&request)?;
        let (payload, post_process) = self.authorize(rule, auth, token, payload).await?;
        let request: ReadRequest = serde_json::from_value(Value::Object(payload))?;
        let query = self.compiler.compile_read(self.project(), table, &request)?;
        Ok(Authorized { query, post_process })
    }

    /// Authorize and compile an insert
    ///
    /// # Errors
    /// Returns the denying rule's error or the compiler's error.
    pub async fn create(
        &self,
        rule: &Rule,
        auth: &AuthClaims,
        token: &str,
        table: &str,
        request: CreateRequest,
    ) -> Result<Authorized> {
        let payload = into_object(&request)?;
        let (payload, post_process) = self.authorize(rule, auth, token, payload).await?;
        let request: CreateRequest = serde_json::from_value(Value::Object(payload))?;
        let query = self.compiler.compile_create(self.project(), table, &request)?;
        Ok(Authorized { query, post_process })
    }

    /// Authorize and compile a delete
    ///
    /// # Errors
    /// Returns the denying rule's error or the compiler's error.
    pub async fn delete(
        &self,
        rule: &Rule,
        auth: &AuthClaims,
        token: &str,
        table: &str,
        request: DeleteRequest,
    ) -> Result<Authorized> {
        let payload = into_object(&request)?;
        let (payload, post_process) = self.authorize(rule, auth, token, payload).await?;
        let request: DeleteRequest = serde_json::from_value(Value::Object(payload))?;
        let query = self.compiler.compile_delete(self.project(), table, &request)?;
        Ok(Authorized { query, post_process })
    }

    fn project(&self) -> &str {
        &self.config.project.id
    }

    /// Run `rule` over `{"args": payload + auth + token, "auth": claims}`
    /// and hand back the payload as the rules left it
    async fn authorize(
        &self,
        rule: &Rule,
        auth: &AuthClaims,
        token: &str,
        mut payload: Map<String, Value>,
    ) -> Result<(Map<String, Value>, PostProcess)> {
        payload.insert("auth".to_string(), Value::Object(auth.clone()));
        payload.insert("token".to_string(), Value::String(token.to_string()));

        let mut args = RequestArgs::new();
        args.insert("args".to_string(), Value::Object(payload));
        args.insert("auth".to_string(), Value::Object(auth.clone()));

        let post_process = self
            .engine
            .evaluate(self.project(), rule, &mut args, auth)
            .await?;

        let mut payload = match args.shift_remove("args") {
            Some(Value::Object(payload)) => payload,
            _ => return Err(Error::InvalidPath("args".to_string())),
        };
        payload.shift_remove("auth");
        payload.shift_remove("token");
        Ok((payload, post_process))
    }
}

fn into_object<T: serde::Serialize>(request: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(request)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidOperand(format!("expected an object request, got {}", other))),
    }
}

fn take_object(payload: &Map<String, Value>, key: &str) -> Result<Map<String, Value>> {
    match payload.get(key) {
        Some(Value::Object(map)) => Ok(map.clone()),
        None | Some(Value::Null) => Ok(Map::new()),
        Some(other) => Err(Error::InvalidOperand(format!("args.{} must be an object, got {}", key, other))),
    }
}
