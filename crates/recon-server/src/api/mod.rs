mod events;
mod export;
mod receipts;
mod sync;
mod webhook_logs;
mod webhooks;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use recon_core::Tenant;
use recon_pipeline::{Pipeline, StoreError};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RequestId, TenantRateLimit,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub pipeline: Pipeline,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(request_id: String, data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "precondition_failed" => StatusCode::PRECONDITION_FAILED,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_unauthorized" | "upstream_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_store_error(request_id: String, error: &StoreError) -> ApiError {
    match error {
        StoreError::NotFound => ApiError::new(request_id, "not_found", "resource not found"),
        StoreError::InvalidReceipt(message) => {
            ApiError::new(request_id, "validation_error", message.clone())
        }
        StoreError::Constraint(message) => ApiError::new(request_id, "conflict", message.clone()),
        StoreError::Db(e) => {
            tracing::error!(error = %e, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

/// Loads the tenant or fails with `not_found`.
pub(super) async fn require_tenant(
    state: &AppState,
    request_id: &str,
    tenant_id: &str,
) -> Result<Tenant, ApiError> {
    state
        .pipeline
        .store
        .get_tenant(tenant_id)
        .await
        .map_err(|e| map_store_error(request_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(request_id, "not_found", "tenant not found"))
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: TenantRateLimit) -> Router<AppState> {
    Router::new()
        .route("/api/v1/tenants/{tenant}/sync", post(sync::run_sync))
        .route("/api/v1/tenants/{tenant}/sync-state", get(sync::get_sync_state))
        .route(
            "/api/v1/tenants/{tenant}/refunds/process",
            post(sync::process_refunds),
        )
        .route("/api/v1/tenants/{tenant}/export", get(export::export_orders))
        .route(
            "/api/v1/tenants/{tenant}/orders/{order_id}/receipts",
            get(receipts::list_order_receipts),
        )
        .route(
            "/api/v1/tenants/{tenant}/receipts/{receipt_id}",
            delete(receipts::void_receipt),
        )
        .route(
            "/api/v1/tenants/{tenant}/receipts/{receipt_id}/return-payment-type",
            put(receipts::set_return_payment_type),
        )
        .route(
            "/api/v1/tenants/{tenant}/webhook-logs",
            get(webhook_logs::list_webhook_logs),
        )
        .route("/api/v1/tenants/{tenant}/events", get(events::stream_events))
        // Auth runs first so unauthenticated callers never touch a tenant's budget.
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: TenantRateLimit) -> Router {
    // Webhook deliveries are authenticated upstream by signature, not bearer token.
    let public_routes = Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/webhooks/{tenant}", post(webhooks::receive_webhook));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match recon_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
