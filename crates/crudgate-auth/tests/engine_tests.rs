//! Rule engine integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use crudgate_auth::{CrudReader, HttpRequester, Rule, RuleEngine, StaticTokenProvider};
use crudgate_common::{
    AuthClaims, Error, PostProcessAction, ReadOperation, ReadRequest, RequestArgs, Result,
    INTERNAL_USER_ID,
};

// ===== Capability fakes =====

#[derive(Default)]
struct FakeCrud {
    fail: bool,
    reads: Mutex<Vec<(String, String, String, ReadRequest)>>,
}

#[async_trait]
impl CrudReader for FakeCrud {
    async fn read(
        &self,
        db_alias: &str,
        project: &str,
        collection: &str,
        request: &ReadRequest,
    ) -> Result<Value> {
        self.reads.lock().unwrap().push((
            db_alias.to_string(),
            project.to_string(),
            collection.to_string(),
            request.clone(),
        ));
        if self.fail {
            Err(Error::ExternalCallFailure("no rows".into()))
        } else {
            Ok(json!({"id": 1}))
        }
    }
}

#[derive(Default)]
struct FakeHttp {
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last: Mutex<Option<(String, String, String, Value)>>,
}

#[async_trait]
impl HttpRequester for FakeHttp {
    async fn request(
        &self,
        method: Method,
        url: &str,
        token: &str,
        service_token: &str,
        payload: &Value,
    ) -> Result<Value> {
        assert_eq!(method, Method::POST);
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some((
            url.to_string(),
            token.to_string(),
            service_token.to_string(),
            payload.clone(),
        ));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            Err(Error::ExternalCallFailure("status 500".into()))
        } else {
            Ok(json!({"ok": true}))
        }
    }
}

struct Harness {
    engine: RuleEngine,
    crud: Arc<FakeCrud>,
    http: Arc<FakeHttp>,
}

fn harness_with(crud: FakeCrud, http: FakeHttp) -> Harness {
    let crud = Arc::new(crud);
    let http = Arc::new(http);
    let engine = RuleEngine::new(
        "project",
        crud.clone(),
        http.clone(),
        Arc::new(StaticTokenProvider::new("service-token")),
    );
    Harness { engine, crud, http }
}

fn harness() -> Harness {
    harness_with(FakeCrud::default(), FakeHttp::default())
}

fn rule(value: Value) -> Rule {
    serde_json::from_value(value).unwrap()
}

fn args(value: Value) -> RequestArgs {
    value.as_object().cloned().unwrap()
}

fn claims(value: Value) -> AuthClaims {
    value.as_object().cloned().unwrap()
}

// ===== Basic kinds =====

#[tokio::test]
async fn test_wrong_project() {
    let h = harness();
    let mut a = args(json!({}));
    let err = h
        .engine
        .evaluate("other", &Rule::Allow, &mut a, &claims(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidProject));
}

#[tokio::test]
async fn test_allow_and_deny() {
    let h = harness();
    let mut a = args(json!({}));
    let auth = claims(json!({"id": "u1"}));

    let post = h.engine.evaluate("project", &Rule::Allow, &mut a, &auth).await.unwrap();
    assert!(post.is_empty());
    let post = h
        .engine
        .evaluate("project", &Rule::Authenticated, &mut a, &auth)
        .await
        .unwrap();
    assert!(post.is_empty());

    let err = h.engine.evaluate("project", &Rule::Deny, &mut a, &auth).await.unwrap_err();
    assert!(matches!(err, Error::RuleMismatch));
}

#[tokio::test]
async fn test_internal_caller_bypasses_deny() {
    let h = harness();
    let mut a = args(json!({}));
    let auth = claims(json!({"id": INTERNAL_USER_ID}));

    let post = h.engine.evaluate("project", &Rule::Deny, &mut a, &auth).await.unwrap();
    assert!(post.is_empty());
}

#[tokio::test]
async fn test_unrecognized_rule_denies() {
    let h = harness();
    let mut a = args(json!({}));
    let r = rule(json!({"rule": "sometimes"}));
    let err = h
        .engine
        .evaluate("project", &r, &mut a, &claims(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RuleMismatch));
}

// ===== Combinators =====

#[tokio::test]
async fn test_and_short_circuits_before_force() {
    let h = harness();
    let r = rule(json!({"rule": "and", "clauses": [
        {"rule": "match", "type": "string", "field": "role", "value": "admin"},
        {"rule": "force", "field": "args.ts", "value": "{{now}}"}
    ]}));
    let mut a = args(json!({"role": "user", "args": {}}));
    let before = a.clone();

    let err = h
        .engine
        .evaluate("project", &r, &mut a, &claims(json!({"id": "u1"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RuleMismatch));
    assert_eq!(a, before);
}

#[tokio::test]
async fn test_and_short_circuits_before_webhook() {
    let h = harness();
    let r = rule(json!({"rule": "and", "clauses": [
        {"rule": "deny"},
        {"rule": "webhook", "url": "http://hooks.local/check"}
    ]}));
    let mut a = args(json!({"args": {"token": "t"}}));

    assert!(h
        .engine
        .evaluate("project", &r, &mut a, &claims(json!({"id": "u1"})))
        .await
        .is_err());
    assert_eq!(h.http.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_and_concatenates_post_process_in_order() {
    let h = harness();
    let r = rule(json!({"rule": "and", "clauses": [
        {"rule": "force", "field": "res.owner", "value": "u1"},
        {"rule": "allow"},
        {"rule": "remove", "fields": ["res.password", "res.salt"]}
    ]}));
    let mut a = args(json!({}));

    let post = h
        .engine
        .evaluate("project", &r, &mut a, &claims(json!({"id": "u1"})))
        .await
        .unwrap();
    assert_eq!(
        post.actions,
        vec![
            PostProcessAction::force("res.owner", json!("u1")),
            PostProcessAction::remove("res.password"),
            PostProcessAction::remove("res.salt"),
        ]
    );
}

#[tokio::test]
async fn test_or_returns_first_success_only() {
    let h = harness();
    let r = rule(json!({"rule": "or", "clauses": [
        {"rule": "and", "clauses": [
            {"rule": "force", "field": "res.first", "value": 1},
            {"rule": "deny"}
        ]},
        {"rule": "force", "field": "res.second", "value": 2},
        {"rule": "force", "field": "res.third", "value": 3}
    ]}));
    let mut a = args(json!({}));

    let post = h
        .engine
        .evaluate("project", &r, &mut a, &claims(json!({"id": "u1"})))
        .await
        .unwrap();
    assert_eq!(post.actions, vec![PostProcessAction::force("res.second", json!(2))]);
}

#[tokio::test]
async fn test_or_skips_side_effects_after_success() {
    let h = harness();
    let r = rule(json!({"rule": "or", "clauses": [
        {"rule": "allow"},
        {"rule": "webhook", "url": "http://hooks.local/check"}
    ]}));
    let mut a = args(json!({"args": {"token": "t"}}));

    h.engine
        .evaluate("project", &r, &mut a, &claims(json!({"id": "u1"})))
        .await
        .unwrap();
    assert_eq!(h.http.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_or_all_fail_is_generic_mismatch() {
    let h = harness_with(FakeCrud { fail: true, ..Default::default() }, FakeHttp::default());
    let r = rule(json!({"rule": "or", "clauses": [
        {"rule": "query", "db": "mysql", "col": "members", "find": {}},
        {"rule": "force", "field": "bogus.x", "value": 1}
    ]}));
    let mut a = args(json!({}));

    let err = h
        .engine
        .evaluate("project", &r, &mut a, &claims(json!({"id": "u1"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RuleMismatch));
}

// ===== Webhook =====

#[tokio::test]
async fn test_webhook_strips_token() {
    let h = harness();
    let r = rule(json!({"rule": "webhook", "url": "http://hooks.local/check"}));
    let mut a = args(json!({"args": {"token": "caller", "title": "hello"}}));

    h.engine
        .evaluate("project", &r, &mut a, &claims(json!({"id": "u1"})))
        .await
        .unwrap();

    let (url, token, service_token, payload) = h.http.last.lock().unwrap().clone().unwrap();
    assert_eq!(url, "http://hooks.local/check");
    assert_eq!(token, "caller");
    assert_eq!(service_token, "service-token");
    assert_eq!(payload, json!({"title": "hello"}));
    assert!(a["args"].get("token").is_none());
}

#[tokio::test]
async fn test_webhook_failure_propagates() {
    let h = harness_with(FakeCrud::default(), FakeHttp { fail: true, ..Default::default() });
    let r = rule(json!({"rule": "webhook", "url": "http://hooks.local/check"}));
    let mut a = args(json!({"args": {"token": "caller"}}));

    let err = h
        .engine
        .evaluate("project", &r, &mut a, &claims(json!({"id": "u1"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExternalCallFailure(_)));
}

#[tokio::test(start_paused = true)]
async fn test_webhook_timeout() {
    let h = harness_with(
        FakeCrud::default(),
        FakeHttp {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        },
    );
    let r = rule(json!({"rule": "webhook", "url": "http://hooks.local/slow"}));
    let mut a = args(json!({"args": {"token": "caller"}}));

    let err = h
        .engine
        .evaluate("project", &r, &mut a, &claims(json!({"id": "u1"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExternalCallFailure(msg) if msg.contains("timed out")));
}

#[tokio::test]
async fn test_webhook_without_args_payload() {
    let h = harness();
    let r = rule(json!({"rule": "webhook", "url": "http://hooks.local/check"}));
    let mut a = args(json!({}));

    let err = h
        .engine
        .evaluate("project", &r, &mut a, &claims(json!({"id": "u1"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RuleMismatch));
    assert_eq!(h.http.calls.load(Ordering::SeqCst), 0);
}

// ===== Query =====

#[tokio::test]
async fn test_query_resolves_find_from_args() {
    let h = harness();
    let r = rule(json!({"rule": "query", "db": "postgres", "col": "members",
        "find": {"user_id": "args.userId", "team": "core"}}));
    let mut a = args(json!({"args": {"userId": "u42"}}));

    h.engine
        .evaluate("project", &r, &mut a, &claims(json!({"id": "u42"})))
        .await
        .unwrap();

    let reads = h.crud.reads.lock().unwrap();
    assert_eq!(reads.len(), 1);
    let (db, project, col, request) = &reads[0];
    assert_eq!(db, "postgres");
    assert_eq!(project, "project");
    assert_eq!(col, "members");
    assert_eq!(request.operation, ReadOperation::One);
    assert_eq!(Value::Object(request.find.clone()), json!({"user_id": "u42", "team": "core"}));

    // the configured rule keeps its template
    let Rule::Query(q) = &r else { unreachable!() };
    assert_eq!(q.find["user_id"], json!("args.userId"));
}

#[tokio::test]
async fn test_query_failure_denies() {
    let h = harness_with(FakeCrud { fail: true, ..Default::default() }, FakeHttp::default());
    let r = rule(json!({"rule": "query", "db": "mysql", "col": "members", "find": {}}));
    let mut a = args(json!({}));

    let err = h
        .engine
        .evaluate("project", &r, &mut a, &claims(json!({"id": "u1"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExternalCallFailure(_)));
}

// ===== Force / remove =====

#[tokio::test]
async fn test_force_writes_args() {
    let h = harness();
    let r = rule(json!({"rule": "force", "field": "args.owner", "value": "auth.id"}));
    let mut a = args(json!({"args": {}, "auth": {"id": "u7"}}));

    let post = h
        .engine
        .evaluate("project", &r, &mut a, &claims(json!({"id": "u7"})))
        .await
        .unwrap();
    assert!(post.is_empty());
    assert_eq!(a["args"]["owner"], json!("u7"));
}

#[tokio::test]
async fn test_force_invalid_target() {
    let h = harness();
    let r = rule(json!({"rule": "force", "field": "body.owner", "value": 1}));
    let mut a = args(json!({}));

    let err = h
        .engine
        .evaluate("project", &r, &mut a, &claims(json!({"id": "u7"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidFieldTarget(field) if field == "body.owner"));
}

#[tokio::test]
async fn test_remove_mixed_targets() {
    let h = harness();
    let r = rule(json!({"rule": "remove", "fields": ["args.secret", "res.password"]}));
    let mut a = args(json!({"args": {"secret": "s", "keep": 1}}));

    let post = h
        .engine
        .evaluate("project", &r, &mut a, &claims(json!({"id": "u7"})))
        .await
        .unwrap();
    assert_eq!(post.actions, vec![PostProcessAction::remove("res.password")]);
    assert_eq!(a["args"], json!({"keep": 1}));
}
