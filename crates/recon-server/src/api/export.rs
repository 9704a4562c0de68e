use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use recon_core::AuditRecord;
use recon_pipeline::orders_for_export;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_store_error, require_tenant, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ExportQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// GET /api/v1/tenants/{tenant}/export?start=&end=
///
/// Orders created in `[start, end)`. An inverted range is answered with an
/// empty list.
pub(super) async fn export_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(tenant_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<ApiResponse<Vec<AuditRecord>>>, ApiError> {
    require_tenant(&state, &req_id.0, &tenant_id).await?;
    let records = orders_for_export(
        state.pipeline.store.as_ref(),
        &tenant_id,
        query.start,
        query.end,
    )
    .await
    .map_err(|e| map_store_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, records)))
}
