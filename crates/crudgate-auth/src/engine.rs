//! Rule engine
//!
//! Evaluates a [`Rule`] tree against the request arguments and the caller's
//! claims. Evaluation either authorizes the request, returning the deferred
//! response edits collected from `force`/`remove` rules, or fails with the
//! error that denied it.
//!
//! `and`/`or` evaluate clauses strictly in order and stop as soon as the
//! outcome is known, so a `webhook` or `query` clause after a failing `and`
//! clause (or after a succeeding `or` clause) is never executed.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crudgate_common::error::{Error, Result};
use crudgate_common::{
    path, AuthClaims, PostProcess, PostProcessAction, ReadOperation, ReadRequest, RequestArgs,
    INTERNAL_USER_ID,
};

use crate::capability::{CrudReader, HttpRequester, TokenProvider};
use crate::matcher::match_rule;
use crate::rule::{QueryRule, Rule};

/// Hard deadline for a webhook rule's outbound call
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a `force`/`remove` field path points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTarget {
    /// The request arguments, edited in place
    Args,
    /// The eventual response, edited through a post-process action
    Res,
}

impl FieldTarget {
    /// Route a field path by its first segment
    ///
    /// # Errors
    /// Returns `Error::InvalidFieldTarget` unless the path starts with `args` or `res`.
    pub fn parse(field: &str) -> Result<Self> {
        match field.split('.').next() {
            Some("args") => Ok(FieldTarget::Args),
            Some("res") => Ok(FieldTarget::Res),
            _ => Err(Error::InvalidFieldTarget(field.to_string())),
        }
    }
}

/// Security rule evaluator bound to a single project
pub struct RuleEngine {
    project: String,
    crud: Arc<dyn CrudReader>,
    http: Arc<dyn HttpRequester>,
    tokens: Arc<dyn TokenProvider>,
}

impl RuleEngine {
    pub fn new(
        project: &str,
        crud: Arc<dyn CrudReader>,
        http: Arc<dyn HttpRequester>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            project: project.to_string(),
            crud,
            http,
            tokens,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Evaluate `rule` for a request addressed to `project`
    ///
    /// `args` may be edited in place by `force`/`remove` rules targeting
    /// `args.*` and by `webhook` rules, which strip the caller token.
    ///
    /// # Errors
    /// Returns `Error::InvalidProject` for a foreign project, `Error::RuleMismatch`
    /// when the policy denies the request, or the error of the failing rule.
    pub fn evaluate<'a>(
        &'a self,
        project: &'a str,
        rule: &'a Rule,
        args: &'a mut RequestArgs,
        auth: &'a AuthClaims,
    ) -> BoxFuture<'a, Result<PostProcess>> {
        Box::pin(async move {
            if project != self.project {
                return Err(Error::InvalidProject);
            }

            if matches!(rule, Rule::Allow | Rule::Authenticated) {
                return Ok(PostProcess::new());
            }

            if is_internal_caller(auth) {
                return Ok(PostProcess::new());
            }

            debug!(project, rule = rule.kind(), "evaluating rule");

            match rule {
                Rule::Allow | Rule::Authenticated => Ok(PostProcess::new()),
                Rule::Deny | Rule::Unrecognized => Err(Error::RuleMismatch),
                Rule::Match(m) => match_rule(m, args).map(|()| PostProcess::new()),
                Rule::And { clauses } => self.evaluate_and(project, clauses, args, auth).await,
                Rule::Or { clauses } => self.evaluate_or(project, clauses, args, auth).await,
                Rule::Webhook { url } => self
                    .evaluate_webhook(url, args)
                    .await
                    .map(|()| PostProcess::new()),
                Rule::Query(query) => self
                    .evaluate_query(project, query, args)
                    .await
                    .map(|()| PostProcess::new()),
                Rule::Force { field, value } => evaluate_force(field, value, args),
                Rule::Remove { fields } => evaluate_remove(fields, args),
            }
        })
    }

    async fn evaluate_and(
        &self,
        project: &str,
        clauses: &[Rule],
        args: &mut RequestArgs,
        auth: &AuthClaims,
    ) -> Result<PostProcess> {
        let mut combined = PostProcess::new();
        for clause in clauses {
            let post = self.evaluate(project, clause, args, auth).await?;
            combined.extend(post);
        }
        Ok(combined)
    }

    async fn evaluate_or(
        &self,
        project: &str,
        clauses: &[Rule],
        args: &mut RequestArgs,
        auth: &AuthClaims,
    ) -> Result<PostProcess> {
        for (index, clause) in clauses.iter().enumerate() {
            match self.evaluate(project, clause, args, auth).await {
                Ok(post) => return Ok(post),
                Err(e) => debug!(clause = index, error = %e, "or clause failed"),
            }
        }
        Err(Error::RuleMismatch)
    }

    async fn evaluate_webhook(&self, url: &str, args: &mut RequestArgs) -> Result<()> {
        let payload = args
            .get_mut("args")
            .and_then(Value::as_object_mut)
            .ok_or(Error::RuleMismatch)?;

        let token = match payload.shift_remove("token") {
            Some(Value::String(token)) => token,
            _ => String::new(),
        };
        let payload = Value::Object(payload.clone());

        let service_token = self.tokens.service_token()?;

        let call = self
            .http
            .request(Method::POST, url, &token, &service_token, &payload);
        match tokio::time::timeout(WEBHOOK_TIMEOUT, call).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => {
                warn!(%url, error = %e, "webhook rule failed");
                Err(e)
            }
            Err(_) => {
                warn!(%url, "webhook rule timed out");
                Err(Error::ExternalCallFailure(format!(
                    "webhook {} timed out after {}s",
                    url,
                    WEBHOOK_TIMEOUT.as_secs()
                )))
            }
        }
    }

    async fn evaluate_query(&self, project: &str, rule: &QueryRule, args: &RequestArgs) -> Result<()> {
        let find: Map<String, Value> = rule
            .find
            .iter()
            .map(|(key, value)| (key.clone(), path::adjust(value, args)))
            .collect();

        let request = ReadRequest {
            find,
            operation: ReadOperation::One,
            ..Default::default()
        };

        // A successful read is taken as proof of existence.
        self.crud
            .read(&rule.db, project, &rule.col, &request)
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!(db = %rule.db, col = %rule.col, error = %e, "query rule failed");
                e
            })
    }
}

fn is_internal_caller(auth: &AuthClaims) -> bool {
    auth.get("id").and_then(Value::as_str) == Some(INTERNAL_USER_ID)
}

fn evaluate_force(field: &str, value: &Value, args: &mut RequestArgs) -> Result<PostProcess> {
    let value = match value {
        Value::String(template) => path::load_value(template, args).unwrap_or_else(|_| value.clone()),
        _ => value.clone(),
    };

    match FieldTarget::parse(field)? {
        FieldTarget::Res => Ok(PostProcess::single(PostProcessAction::force(field, value))),
        FieldTarget::Args => {
            path::store_value(field, value, args)?;
            Ok(PostProcess::new())
        }
    }
}

fn evaluate_remove(fields: &[String], args: &mut RequestArgs) -> Result<PostProcess> {
    let mut post = PostProcess::new();
    for field in fields {
        match FieldTarget::parse(field)? {
            FieldTarget::Res => post.actions.push(PostProcessAction::remove(field)),
            FieldTarget::Args => path::delete_value(field, args)?,
        }
    }
    Ok(post)
}
