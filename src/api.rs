use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::model::{ChangeRecord, EmailRecipient, MonitorCycleResult, Severity, Source};
use crate::monitor::Monitor;
use crate::notify::NotificationTransport;
use crate::store::{ChangeStore, MemoryStore, RecipientStore, RecordOutcome, SourceStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub monitor: Arc<Monitor>,
    pub transport: Arc<dyn NotificationTransport>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/sources", get(list_sources).post(add_source))
        .route("/api/sources/{id}", delete(delete_source))
        .route("/api/changes", get(list_changes).post(add_change))
        .route(
            "/api/email-recipients",
            get(list_recipients).post(add_recipient),
        )
        .route("/api/email-recipients/{id}", delete(delete_recipient))
        .route("/api/monitor", post(run_monitor))
        .route("/api/send-email", post(send_email))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

type ApiError = (StatusCode, Json<Value>);

fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg.into() })))
}

// ---- sources ----

async fn list_sources(State(state): State<AppState>) -> Json<Vec<Source>> {
    Json(state.store.list_sources().await)
}

#[derive(serde::Deserialize)]
struct NewSource {
    name: String,
    url: String,
    #[serde(default)]
    category: String,
}

impl NewSource {
    /// Reject malformed input before it reaches the detection pipeline.
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        let url = reqwest::Url::parse(&self.url).map_err(|e| format!("invalid url: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err("url must be http(s)".into());
        }
        Ok(())
    }
}

async fn add_source(
    State(state): State<AppState>,
    Json(body): Json<NewSource>,
) -> Result<Json<Source>, ApiError> {
    body.validate().map_err(bad_request)?;
    let source = state
        .store
        .insert_source(body.name.trim(), &body.url, body.category.trim());
    tracing::info!(source = %source.name, id = %source.id, "source added");
    Ok(Json(source))
}

async fn delete_source(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    let success = state.store.delete_source(&id);
    Json(json!({ "success": success }))
}

// ---- changes ----

async fn list_changes(State(state): State<AppState>) -> Json<Vec<ChangeRecord>> {
    Json(state.store.list_changes().await)
}

#[derive(serde::Deserialize)]
struct NewChange {
    source_id: String,
    source_name: String,
    url: String,
    #[serde(default)]
    categories: Vec<String>,
    summary: String,
    #[serde(default)]
    details: String,
    severity: Severity,
}

async fn add_change(
    State(state): State<AppState>,
    Json(body): Json<NewChange>,
) -> Result<Json<ChangeRecord>, ApiError> {
    if body.summary.trim().is_empty() {
        return Err(bad_request("summary must not be empty"));
    }
    let record = ChangeRecord {
        id: String::new(),
        source_id: body.source_id,
        source_name: body.source_name,
        url: body.url,
        categories: body.categories,
        summary: body.summary,
        details: body.details,
        severity: body.severity,
        timestamp: chrono::Utc::now(),
        reviewed: false,
    };
    match state.store.record_if_absent(record).await {
        RecordOutcome::Inserted(r) => Ok(Json(r)),
        RecordOutcome::Duplicate => Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": "duplicate change" })),
        )),
    }
}

// ---- recipients ----

async fn list_recipients(State(state): State<AppState>) -> Json<Vec<EmailRecipient>> {
    Json(state.store.list_recipients().await)
}

#[derive(serde::Deserialize)]
struct NewRecipient {
    email: String,
}

async fn add_recipient(
    State(state): State<AppState>,
    Json(body): Json<NewRecipient>,
) -> Result<Json<EmailRecipient>, ApiError> {
    let email = body.email.trim();
    if email.parse::<lettre::message::Mailbox>().is_err() {
        return Err(bad_request(format!("invalid email address: {email}")));
    }
    Ok(Json(state.store.insert_recipient(email)))
}

async fn delete_recipient(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    let success = state.store.delete_recipient(&id);
    Json(json!({ "success": success }))
}

// ---- monitoring & email ----

/// Manual trigger: runs the same cycle as the scheduler, synchronously, and
/// returns the full per-source outcome list plus any notification warning.
async fn run_monitor(State(state): State<AppState>) -> Json<MonitorCycleResult> {
    Json(state.monitor.run_cycle().await)
}

#[derive(serde::Deserialize)]
struct SendEmailReq {
    subject: String,
    body: String,
}

async fn send_email(
    State(state): State<AppState>,
    Json(req): Json<SendEmailReq>,
) -> Result<Json<Value>, ApiError> {
    let recipients = state.store.addresses().await;
    if recipients.is_empty() {
        return Err(bad_request("no recipients configured"));
    }
    match state
        .transport
        .send(&req.subject, &req.body, &recipients)
        .await
    {
        Ok(()) => Ok(Json(json!({ "success": true }))),
        Err(e) => Err((
            StatusCode::BAD_GATEWAY,
            Json(json!({ "success": false, "error": e.to_string() })),
        )),
    }
}
