//! HTTP endpoints implemented by the payment gateway facade.
//!
//! The core specifies five endpoints; `/merchants/signup` and
//! `/merchants/login` are a supplemental onboarding surface so the rest of
//! the API is reachable at all.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use paygate_types::idempotency::is_valid_idempotency_key;
use paygate_types::transaction::{InitializeRequest, RefundRequest, TransactionFilters};
use paygate_types::{GatewayError, IdempotencyRecord, PaginationParams, SignupRequest};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use crate::audit_context;
use crate::auth::AuthenticatedAccount;
use crate::errors::{ApiError, ValidatedJson};
use crate::state::AppState;

const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_root))
        .route("/api/v1/merchants/signup", post(post_signup))
        .route("/api/v1/merchants/login", post(post_login))
        .route("/api/v1/payments/initialize", post(post_initialize))
        .route("/api/v1/payments/{id}/verify", post(post_verify))
        .route("/api/v1/payments/{id}/refund", post(post_refund))
        .route("/api/v1/payments/{id}", get(get_payment))
        .route("/api/v1/payments", get(list_payments))
        .route("/api/v1/webhooks/{provider}", post(post_webhook))
}

/// `GET /`: liveness greeting, outside the `/api/v1` prefix like the
/// teacher's own root route.
#[instrument(skip_all)]
async fn get_root() -> impl IntoResponse {
    (StatusCode::OK, format!("Hello from {}!", env!("CARGO_PKG_NAME")))
}

fn ok<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(serde_json::json!({"success": true, "data": data}))).into_response()
}

#[instrument(skip_all)]
async fn post_signup(State(state): State<AppState>, ValidatedJson(body): ValidatedJson<SignupRequest>) -> Result<Response, ApiError> {
    let (merchant, sealed_key) = state.merchants.signup(&body).await?;
    Ok(ok(StatusCode::CREATED, serde_json::json!({"merchant": merchant, "api_key": sealed_key})))
}

#[derive(serde::Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[instrument(skip_all)]
async fn post_login(State(state): State<AppState>, ValidatedJson(body): ValidatedJson<LoginRequest>) -> Result<Response, ApiError> {
    let sealed_key = state.merchants.login(&body.username, &body.password).await?;
    Ok(ok(StatusCode::OK, sealed_key))
}

/// `POST /payments/initialize`: guarded by both `Idempotency-Key`
/// and `X-API-Key`. A missing or malformed idempotency key is a
/// 400 at ingress, before the transaction service ever runs; a cache hit
/// replays the original status code and body verbatim.
#[instrument(skip_all, fields(merchant_id = %account.0.merchant_id))]
async fn post_initialize(
    State(state): State<AppState>,
    account: AuthenticatedAccount,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: axum::http::HeaderMap,
    ValidatedJson(body): ValidatedJson<InitializeRequest>,
) -> Result<Response, ApiError> {
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|k| is_valid_idempotency_key(k))
        .ok_or_else(|| GatewayError::validation("missing or malformed Idempotency-Key header"))?;

    if let Some(cached) = state.idempotency.get(idempotency_key) {
        let status = StatusCode::from_u16(cached.status_code).unwrap_or(StatusCode::OK);
        return Ok((status, Json(cached.body)).into_response());
    }

    let ctx = audit_context::for_account(&headers, Some(peer), &account);
    let transaction = state.transactions.initialize(account.0.merchant_id, &body, idempotency_key, &ctx).await?;
    let status = StatusCode::CREATED;
    let body_json = serde_json::json!({"success": true, "data": transaction});

    state.idempotency.set(
        idempotency_key,
        IdempotencyRecord { status_code: status.as_u16(), body: body_json.clone() },
        state.idempotency_ttl_seconds,
    );

    Ok((status, Json(body_json)).into_response())
}

#[instrument(skip_all)]
async fn post_verify(
    State(state): State<AppState>,
    account: AuthenticatedAccount,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: axum::http::HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let ctx = audit_context::for_account(&headers, Some(peer), &account);
    let transaction = state.transactions.verify(id, &ctx).await?;
    Ok(ok(StatusCode::OK, transaction))
}

#[instrument(skip_all)]
async fn post_refund(
    State(state): State<AppState>,
    account: AuthenticatedAccount,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: axum::http::HeaderMap,
    Path(id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<RefundRequest>,
) -> Result<Response, ApiError> {
    let ctx = audit_context::for_account(&headers, Some(peer), &account);
    let transaction = state.transactions.refund(id, &body, &ctx).await?;
    Ok(ok(StatusCode::OK, transaction))
}

#[instrument(skip_all)]
async fn get_payment(State(state): State<AppState>, _auth: AuthenticatedAccount, Path(id): Path<Uuid>) -> Result<Response, ApiError> {
    let transaction = state.transactions.get(id).await?;
    Ok(ok(StatusCode::OK, transaction))
}

#[instrument(skip_all)]
async fn list_payments(
    State(state): State<AppState>,
    _auth: AuthenticatedAccount,
    Query(filters): Query<TransactionFilters>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Response, ApiError> {
    let page = state.transactions.list(&filters, pagination).await?;
    Ok(ok(StatusCode::OK, page))
}

/// `POST /webhooks/{provider}`: unguarded. Always answers 200
/// once the event is durably received, regardless of processing outcome —
/// the provider's own retry loop must not race our scheduler. The only thing that yields a non-200 here is a body
/// that isn't even valid JSON.
#[instrument(skip_all, fields(provider = %provider))]
async fn post_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, ApiError> {
    let payload: Value = serde_json::from_slice(&body).map_err(|e| GatewayError::validation(format!("unparseable webhook body: {e}")))?;

    let signature = headers
        .get("x-cpay-signature")
        .or_else(|| headers.get("x-cardgate-signature"))
        .and_then(|v| v.to_str().ok());

    let event_id = state.webhooks.receive(&provider, &payload, signature, Some(body.as_ref())).await?;

    let ctx = audit_context::for_webhook(&headers, Some(peer));
    match state.webhooks.process(event_id, &ctx).await {
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, %event_id, "webhook processing deferred to retry"),
    }

    Ok((StatusCode::OK, Json(serde_json::json!({"success": true, "data": {"event_id": event_id}}))).into_response())
}
