use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use recon_core::SyncStatus;
use recon_pipeline::{RefundPassSummary, SyncError, SyncRequest, SyncSummary};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_store_error, require_tenant, ApiError, ApiResponse, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SyncBody {
    /// Continue from the stored cursor when no cursor is given.
    #[serde(default)]
    resume: bool,
    #[serde(flatten)]
    request: SyncRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SyncResult {
    status: SyncStatus,
    #[serde(flatten)]
    summary: SyncSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SyncStateItem {
    status: Option<SyncStatus>,
    cursor: Option<String>,
    last_error: Option<String>,
    watermark: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

fn map_sync_error(request_id: String, error: SyncError) -> ApiError {
    match error {
        SyncError::TenantNotFound(_) => ApiError::new(request_id, "not_found", "tenant not found"),
        SyncError::MissingCredentials(_) => ApiError::new(
            request_id,
            "precondition_failed",
            "tenant has no upstream credentials",
        ),
        SyncError::Unauthorized { .. } => ApiError::new(
            request_id,
            "upstream_unauthorized",
            "upstream rejected the tenant's credentials; re-authorization required",
        ),
        SyncError::Fetch(e) => {
            tracing::warn!(error = %e, "sync aborted by upstream failure");
            ApiError::new(request_id, "upstream_error", e.to_string())
        }
        SyncError::Store(e) => map_store_error(request_id, &e),
    }
}

/// POST /api/v1/tenants/{tenant}/sync
pub(super) async fn run_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(tenant_id): Path<String>,
    Json(body): Json<SyncBody>,
) -> Result<Json<ApiResponse<SyncResult>>, ApiError> {
    let sync = &state.pipeline.sync;
    let result = if body.resume {
        sync.resume_sync(&tenant_id, body.request).await
    } else {
        sync.run_sync(&tenant_id, body.request).await
    };
    let summary = result.map_err(|e| map_sync_error(req_id.0.clone(), e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        SyncResult {
            status: summary.status(),
            summary,
        },
    )))
}

/// GET /api/v1/tenants/{tenant}/sync-state
pub(super) async fn get_sync_state(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(tenant_id): Path<String>,
) -> Result<Json<ApiResponse<SyncStateItem>>, ApiError> {
    require_tenant(&state, &req_id.0, &tenant_id).await?;
    let stored = state
        .pipeline
        .store
        .load_sync_state(&tenant_id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    let data = match stored {
        Some(s) => SyncStateItem {
            status: Some(s.status),
            cursor: s.cursor,
            last_error: s.last_error,
            watermark: s.watermark,
            updated_at: s.updated_at,
        },
        None => SyncStateItem {
            status: None,
            cursor: None,
            last_error: None,
            watermark: None,
            updated_at: None,
        },
    };
    Ok(Json(ApiResponse::new(req_id.0, data)))
}

/// POST /api/v1/tenants/{tenant}/refunds/process
pub(super) async fn process_refunds(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(tenant_id): Path<String>,
) -> Result<Json<ApiResponse<RefundPassSummary>>, ApiError> {
    let summary = state
        .pipeline
        .engine
        .process_pending_refunds(&tenant_id, Utc::now())
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, summary)))
}
