use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use recon_core::{Receipt, ReceiptType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_store_error, require_tenant, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ReceiptItem {
    id: i64,
    order_id: String,
    receipt_type: ReceiptType,
    event_key: String,
    issued_at: DateTime<Utc>,
    reference_receipt_id: Option<i64>,
    refund_amount: Option<Decimal>,
    /// Code 1–4; refund receipts only.
    return_payment_type: Option<i16>,
    payload: serde_json::Value,
}

impl From<Receipt> for ReceiptItem {
    fn from(receipt: Receipt) -> Self {
        Self {
            id: receipt.id,
            order_id: receipt.order_id,
            receipt_type: receipt.receipt_type,
            event_key: receipt.event_key,
            issued_at: receipt.issued_at,
            reference_receipt_id: receipt.reference_receipt_id,
            refund_amount: receipt.refund_amount,
            return_payment_type: receipt.return_payment_type.map(|t| t.code()),
            payload: receipt.payload,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct VoidResult {
    deleted: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ReturnPaymentTypeRequest {
    pub code: i16,
}

/// GET /api/v1/tenants/{tenant}/orders/{order_id}/receipts
pub(super) async fn list_order_receipts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((tenant_id, order_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Vec<ReceiptItem>>>, ApiError> {
    require_tenant(&state, &req_id.0, &tenant_id).await?;
    let receipts = state
        .pipeline
        .store
        .list_receipts(&tenant_id, &order_id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    let data = receipts.into_iter().map(ReceiptItem::from).collect();
    Ok(Json(ApiResponse::new(req_id.0, data)))
}

/// DELETE /api/v1/tenants/{tenant}/receipts/{receipt_id}
///
/// Voiding a sale receipt also removes the refund receipts referencing it.
pub(super) async fn void_receipt(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((tenant_id, receipt_id)): Path<(String, i64)>,
) -> Result<Json<ApiResponse<VoidResult>>, ApiError> {
    let deleted = state
        .pipeline
        .engine
        .void_receipt(&tenant_id, receipt_id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, VoidResult { deleted })))
}

/// PUT /api/v1/tenants/{tenant}/receipts/{receipt_id}/return-payment-type
pub(super) async fn set_return_payment_type(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((tenant_id, receipt_id)): Path<(String, i64)>,
    Json(body): Json<ReturnPaymentTypeRequest>,
) -> Result<Json<ApiResponse<ReceiptItem>>, ApiError> {
    let receipt = state
        .pipeline
        .engine
        .set_return_payment_type(&tenant_id, receipt_id, body.code)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(req_id.0, receipt.into())))
}
