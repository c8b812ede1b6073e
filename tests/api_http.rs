// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - sources CRUD + validation
// - email-recipients CRUD + validation
// - POST /api/monitor (manual trigger)
// - POST /api/send-email
// - POST /api/changes dedup

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use policy_change_monitor::api::{self, AppState};
use policy_change_monitor::error::{FetchError, NotifyError};
use policy_change_monitor::fetch::{ContentFetcher, FetchedPage};
use policy_change_monitor::monitor::Monitor;
use policy_change_monitor::notify::{NotificationTransport, Notifier};
use policy_change_monitor::rules::SeverityRules;
use policy_change_monitor::store::{ChangeStore, MemoryStore, RecipientStore, SourceStore};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

#[derive(Default)]
struct ScriptedFetcher {
    pages: Mutex<HashMap<String, String>>,
}

impl ScriptedFetcher {
    fn set(&self, url: &str, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }
}

#[async_trait::async_trait]
impl ContentFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        match self.pages.lock().unwrap().get(url) {
            Some(body) => FetchedPage::from_raw(body),
            None => Err(FetchError::BadStatus(404)),
        }
    }
}

#[derive(Default)]
struct RecordingTransport {
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

#[async_trait::async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send(
        &self,
        subject: &str,
        _body: &str,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        self.calls
            .lock()
            .unwrap()
            .push((subject.to_string(), recipients.to_vec()));
        Ok(())
    }
}

/// Build the same Router the binary uses, on stub collaborators.
fn test_app() -> (
    Router,
    Arc<MemoryStore>,
    Arc<ScriptedFetcher>,
    Arc<RecordingTransport>,
) {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(ScriptedFetcher::default());
    let transport = Arc::new(RecordingTransport::default());
    let monitor = Arc::new(Monitor::new(
        fetcher.clone(),
        store.clone() as Arc<dyn SourceStore>,
        store.clone() as Arc<dyn ChangeStore>,
        store.clone() as Arc<dyn RecipientStore>,
        Notifier::new(transport.clone()),
        SeverityRules::default_seed(),
        2,
    ));
    let state = AppState {
        store: store.clone(),
        monitor,
        transport: transport.clone(),
    };
    (api::create_router(state), store, fetcher, transport)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET")
}

fn post_json(uri: &str, payload: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST")
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .expect("build DELETE")
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json")
}

#[tokio::test]
async fn health_returns_200_and_ok_body() {
    let (app, _, _, _) = test_app();
    let resp = app.oneshot(get("/health")).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    assert_eq!(String::from_utf8(bytes).unwrap().trim(), "ok");
}

#[tokio::test]
async fn sources_crud_roundtrip() {
    let (app, _, _, _) = test_app();

    let payload =
        json!({ "name": "Port Authority", "url": "https://example.org/policy", "category": "ports" });
    let resp = app
        .clone()
        .oneshot(post_json("/api/sources", &payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created = read_json(resp).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["status"], "unknown");

    let resp = app.clone().oneshot(get("/api/sources")).await.unwrap();
    let listed = read_json(resp).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let resp = app
        .clone()
        .oneshot(delete(&format!("/api/sources/{id}")))
        .await
        .unwrap();
    let deleted = read_json(resp).await;
    assert_eq!(deleted["success"], true);

    let resp = app.oneshot(get("/api/sources")).await.unwrap();
    let listed = read_json(resp).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn source_with_bad_url_is_rejected() {
    let (app, _, _, _) = test_app();
    let payload = json!({ "name": "Nope", "url": "ftp://example.org/x" });
    let resp = app
        .oneshot(post_json("/api/sources", &payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = read_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("http"));
}

#[tokio::test]
async fn recipient_validation_rejects_malformed_address() {
    let (app, _, _, _) = test_app();

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/email-recipients",
            &json!({ "email": "not-an-email" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/email-recipients",
            &json!({ "email": "harbor@example.org" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(get("/api/email-recipients")).await.unwrap();
    let listed = read_json(resp).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["email"], "harbor@example.org");
}

#[tokio::test]
async fn manual_trigger_returns_full_cycle_result() {
    let (app, store, fetcher, _) = test_app();
    store.insert_source("Port Authority", "https://example.org/policy", "ports");
    fetcher.set("https://example.org/policy", "Departures operate daily");

    let resp = app
        .oneshot(post_json("/api/monitor", &json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let result = read_json(resp).await;
    let sources = result["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["outcome"], "unchanged");
    assert_eq!(result["notification"]["status"], "skipped");
    assert!(result["changes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn send_email_requires_recipients_then_dispatches() {
    let (app, store, _, transport) = test_app();
    let payload = json!({ "subject": "test", "body": "hello" });

    let resp = app
        .clone()
        .oneshot(post_json("/api/send-email", &payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    store.insert_recipient("harbor@example.org");
    let resp = app
        .oneshot(post_json("/api/send-email", &payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = read_json(resp).await;
    assert_eq!(body["success"], true);

    let calls = transport.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "test");
}

#[tokio::test]
async fn duplicate_manual_change_is_a_conflict() {
    let (app, _, _, _) = test_app();
    let payload = json!({
        "source_id": "src-000001",
        "source_name": "Port Authority",
        "url": "https://example.org/policy",
        "summary": "2 line(s) changed",
        "details": "- a\n+ b",
        "severity": "low"
    });

    let resp = app
        .clone()
        .oneshot(post_json("/api/changes", &payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(post_json("/api/changes", &payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = app.oneshot(get("/api/changes")).await.unwrap();
    let listed = read_json(resp).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}
