//! HTTP API endpoints

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, Router},
    Json,
};
use chrono::Utc;
use pwmail_auth::{AuthError, ErrorClass, SignedEnvelope};
use pwmail_crypto::Address;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::metrics::MailMetrics;
use crate::service::{InboxPage, MailService, PageRequest};
use crate::store::Mail;

/// Header carrying the caller's address.
pub const PUBLIC_KEY_HEADER: &str = "x-public-key";

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<MailService>,
    pub metrics: Arc<MailMetrics>,
}

/// Create API router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/mail/inbox", post(inbox_handler))
        .route("/mail/read", post(read_handler))
        .route("/mail/send", post(send_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Failure of a mail endpoint.
#[derive(Debug)]
pub enum ApiError {
    /// No identity header at all
    MissingIdentity,
    Auth(AuthError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl ApiError {
    fn class(&self) -> ErrorClass {
        match self {
            ApiError::MissingIdentity => ErrorClass::Unauthorized,
            ApiError::Auth(err) => err.class(),
        }
    }
}

fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorClass::ClientError => StatusCode::BAD_REQUEST,
        ErrorClass::NotFound => StatusCode::NOT_FOUND,
        ErrorClass::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.class());
        let message = match self {
            ApiError::MissingIdentity => format!("missing {} header", PUBLIC_KEY_HEADER),
            // Storage details stay in the server log
            ApiError::Auth(AuthError::Internal(_)) => "internal error".to_string(),
            ApiError::Auth(err) => err.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Caller identity and envelope from a raw request
fn signed_request(headers: &HeaderMap, body: &[u8]) -> Result<(Address, SignedEnvelope), ApiError> {
    let header = headers
        .get(PUBLIC_KEY_HEADER)
        .ok_or(ApiError::MissingIdentity)?;
    let header = header
        .to_str()
        .map_err(|_| AuthError::InvalidAddress("header is not ASCII".to_string()))?;
    let sender = Address::parse(header).map_err(AuthError::from)?;

    let envelope: SignedEnvelope = serde_json::from_slice(body)
        .map_err(|e| AuthError::BadRequest(format!("envelope: {}", e)))?;

    Ok((sender, envelope))
}

/// Record metrics for a finished request and log failures
fn observe<T>(state: &ApiState, start: Instant, route: &str, result: &Result<T, ApiError>) {
    state
        .metrics
        .request_latency
        .observe(start.elapsed().as_secs_f64());

    match result {
        Ok(_) => state.metrics.requests_accepted.inc(),
        Err(err) => {
            let class = err.class();
            state.metrics.record_rejection(class);
            if class == ErrorClass::ServerError {
                error!("{} failed: {:?}", route, err);
            } else {
                warn!("{} rejected: {:?}", route, err);
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    pub page: i64,
    pub limit: i64,
}

/// POST /mail/inbox?page=P&limit=L - List the caller's inbox
async fn inbox_handler(
    State(state): State<ApiState>,
    query: Result<Query<InboxQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let result = list_inbox(&state, query, &headers, &body).await;

    observe(&state, start, "inbox", &result);
    match result {
        Ok(listing) => (StatusCode::OK, Json(listing)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn list_inbox(
    state: &ApiState,
    query: Result<Query<InboxQuery>, QueryRejection>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<InboxPage, ApiError> {
    let (sender, envelope) = signed_request(headers, body)?;
    let Query(query) =
        query.map_err(|e| AuthError::BadRequest(format!("query: {}", e.body_text())))?;
    let page = PageRequest {
        page: query.page,
        limit: query.limit,
    };
    Ok(state.service.inbox(&envelope, &sender, page, Utc::now()).await?)
}

/// POST /mail/read - Fetch one mail the caller sent or received
async fn read_handler(State(state): State<ApiState>, headers: HeaderMap, body: Bytes) -> Response {
    let start = Instant::now();
    let result = read_mail(&state, &headers, &body).await;

    observe(&state, start, "read", &result);
    match result {
        Ok(mail) => (StatusCode::OK, Json(mail)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn read_mail(state: &ApiState, headers: &HeaderMap, body: &[u8]) -> Result<Mail, ApiError> {
    let (sender, envelope) = signed_request(headers, body)?;
    Ok(state.service.read(&envelope, &sender, Utc::now()).await?)
}

/// POST /mail/send - Store a mail from the caller
async fn send_handler(State(state): State<ApiState>, headers: HeaderMap, body: Bytes) -> Response {
    let start = Instant::now();
    let result = send_mail(&state, &headers, &body).await;

    observe(&state, start, "send", &result);
    match result {
        Ok(mail) => {
            state.metrics.mails_sent.inc();
            (StatusCode::CREATED, Json(json!({ "id": mail.id }))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

async fn send_mail(state: &ApiState, headers: &HeaderMap, body: &[u8]) -> Result<Mail, ApiError> {
    let (sender, envelope) = signed_request(headers, body)?;
    Ok(state.service.send(&envelope, &sender, Utc::now()).await?)
}

/// GET /health - Health check
async fn health_handler() -> Response {
    let response = json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response)).into_response()
}

/// GET /metrics - Prometheus text exposition
async fn metrics_handler(State(state): State<ApiState>) -> Response {
    match state.metrics.export_prometheus() {
        Ok(text) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Metrics export failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
