//! HTTP surface: submission, listings and reviewer decisions.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{OriginalUri, Path, State, rejection::JsonRejection},
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, warn};

use crate::engine::{Outcome, ValidationEngine};
use crate::error::{Error, Result};
use crate::model::SubmitMessage;
use crate::oracle::BannedTermOracle;
use crate::probe::LinkClassifier;
use crate::reconciler::ApprovalReconciler;
use crate::store::Store;

pub const STATUS_STORED: &str = "your message has been stored.";
pub const STATUS_REJECTED: &str = "your message has been rejected.";
pub const STATUS_AWAITING: &str = "your message is awaiting approval as it contains image links.";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub engine: Arc<ValidationEngine>,
    pub reconciler: Arc<ApprovalReconciler>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        oracle: Arc<dyn BannedTermOracle>,
        classifier: Arc<dyn LinkClassifier>,
    ) -> Self {
        Self {
            engine: Arc::new(ValidationEngine::new(store.clone(), oracle, classifier)),
            reconciler: Arc::new(ApprovalReconciler::new(store.clone())),
            store,
        }
    }
}

/// Build the full router with middleware.
///
/// Layers run outermost-last: request id is set first, then traced,
/// then propagated onto the response.
pub fn router(state: AppState) -> Router {
    let request_id = HeaderName::from_static("x-request-id");

    let api = Router::new()
        .route("/validate", post(validate))
        .route("/messages", get(list_messages))
        .route("/rejected", get(list_rejected))
        .route("/approvals", get(list_approvals))
        .route("/approvals/{id}/approve", post(approve))
        .route("/approvals/{id}/reject", post(reject));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .fallback(not_found)
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::MalformedContent(_) => StatusCode::BAD_REQUEST,
            Error::DuplicateId(_) => StatusCode::CONFLICT,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::OracleUnavailable(_) => StatusCode::BAD_GATEWAY,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, "Request refused");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "filter-service"
    }))
}

async fn not_found(OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"code": "RESOURCE_NOT_FOUND", "resource": uri.to_string()})),
    )
}

// ── Submission ──────────────────────────────────────────────────────────

async fn validate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SubmitMessage>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(submit) = payload.map_err(|e| Error::MalformedContent(e.body_text()))?;
    let submission = state.engine.submit(submit).await?;

    let body = match submission.outcome() {
        Outcome::Stored => json!({"status": STATUS_STORED}),
        Outcome::Rejected { reason } => json!({"status": STATUS_REJECTED, "reason": reason}),
        Outcome::AwaitingApproval => json!({"status": STATUS_AWAITING}),
    };
    Ok((StatusCode::OK, Json(body)))
}

// ── Listings ────────────────────────────────────────────────────────────

async fn list_messages(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let messages = state.store.get_all_messages().await?;
    Ok(Json(json!({"updated": Utc::now(), "messages": messages})))
}

async fn list_rejected(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let rejected = state.store.get_all_rejected().await?;
    Ok(Json(json!({"updated": Utc::now(), "rejected": rejected})))
}

async fn list_approvals(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let approvals = state.store.get_all_approvals().await?;
    Ok(Json(json!({"updated": Utc::now(), "approvals": approvals})))
}

// ── Reviewer decisions ──────────────────────────────────────────────────

async fn approve(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse> {
    let message = state.reconciler.approve(&id).await?;
    Ok(Json(message))
}

async fn reject(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse> {
    let message = state.reconciler.reject(&id).await?;
    Ok(Json(message))
}
