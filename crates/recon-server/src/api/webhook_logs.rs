use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use recon_core::WebhookLog;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_store_error, normalize_limit, require_tenant, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct WebhookLogsQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/tenants/{tenant}/webhook-logs, newest first.
pub(super) async fn list_webhook_logs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(tenant_id): Path<String>,
    Query(query): Query<WebhookLogsQuery>,
) -> Result<Json<ApiResponse<Vec<WebhookLog>>>, ApiError> {
    require_tenant(&state, &req_id.0, &tenant_id).await?;
    let limit = usize::try_from(normalize_limit(query.limit)).unwrap_or(50);
    let logs = state
        .pipeline
        .store
        .list_webhook_logs(&tenant_id, limit)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, logs)))
}
