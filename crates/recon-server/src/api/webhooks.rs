use axum::{
    extract::{Path, State},
    Extension, Json,
};
use recon_pipeline::{IngestError, IngestOutcome, WebhookEvent};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_store_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WebhookResult {
    status: &'static str,
    order_id: Option<String>,
    inserted: Option<bool>,
    receipts_issued: usize,
    reason: Option<String>,
}

impl From<IngestOutcome> for WebhookResult {
    fn from(outcome: IngestOutcome) -> Self {
        match outcome {
            IngestOutcome::Ingested {
                order_id,
                inserted,
                evaluation,
            } => Self {
                status: "ingested",
                order_id: Some(order_id),
                inserted: Some(inserted),
                receipts_issued: evaluation.issued(),
                reason: None,
            },
            IngestOutcome::Skipped { reason } => Self {
                status: "skipped",
                order_id: None,
                inserted: None,
                receipts_issued: 0,
                reason: Some(reason),
            },
        }
    }
}

/// POST /api/v1/webhooks/{tenant}
///
/// A skipped delivery still answers 200 so upstream does not redeliver a
/// payload that can never be ingested.
pub(super) async fn receive_webhook(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(tenant_id): Path<String>,
    Json(event): Json<WebhookEvent>,
) -> Result<Json<ApiResponse<WebhookResult>>, ApiError> {
    let outcome = state
        .pipeline
        .webhooks
        .ingest(&tenant_id, &event)
        .await
        .map_err(|e| match e {
            IngestError::TenantNotFound(_) => {
                ApiError::new(req_id.0.clone(), "not_found", "tenant not found")
            }
            IngestError::Store(e) => map_store_error(req_id.0.clone(), &e),
        })?;

    Ok(Json(ApiResponse::new(req_id.0, outcome.into())))
}
