//! Database operations for `receipts`.
//!
//! Receipts are unique per `(tenant_id, order_id, receipt_type, event_key)`.
//! [`insert_receipt`] relies on that index: a conflicting insert returns no
//! row rather than an error, which callers treat as "already issued".

use chrono::{DateTime, Utc};
use recon_core::{NewReceipt, Receipt, ReceiptType, ReturnPaymentType};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `receipts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReceiptRow {
    pub id: i64,
    pub tenant_id: String,
    pub order_id: String,
    pub receipt_type: String,
    pub event_key: String,
    pub issued_at: DateTime<Utc>,
    pub payload: Value,
    pub reference_receipt_id: Option<i64>,
    pub refund_amount: Option<Decimal>,
    pub return_payment_type: Option<i16>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ReceiptRow> for Receipt {
    type Error = DbError;

    fn try_from(row: ReceiptRow) -> Result<Self, Self::Error> {
        let receipt_type =
            ReceiptType::parse(&row.receipt_type).ok_or_else(|| DbError::InvalidRow {
                table: "receipts",
                reason: format!("unknown receipt type \"{}\"", row.receipt_type),
            })?;
        let return_payment_type = row
            .return_payment_type
            .map(ReturnPaymentType::try_from)
            .transpose()
            .map_err(|reason| DbError::InvalidRow {
                table: "receipts",
                reason,
            })?;
        Ok(Receipt {
            id: row.id,
            order_id: row.order_id,
            receipt_type,
            event_key: row.event_key,
            issued_at: row.issued_at,
            payload: row.payload,
            reference_receipt_id: row.reference_receipt_id,
            refund_amount: row.refund_amount,
            return_payment_type,
        })
    }
}

const RECEIPT_COLUMNS: &str = "id, tenant_id, order_id, receipt_type, event_key, issued_at, \
     payload, reference_receipt_id, refund_amount, return_payment_type, created_at";

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Looks up the receipt for one `(order, type, event key)` slot.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_receipt(
    pool: &PgPool,
    tenant_id: &str,
    order_id: &str,
    receipt_type: ReceiptType,
    event_key: &str,
) -> Result<Option<ReceiptRow>, DbError> {
    let row = sqlx::query_as::<_, ReceiptRow>(&format!(
        "SELECT {RECEIPT_COLUMNS} FROM receipts \
         WHERE tenant_id = $1 AND order_id = $2 AND receipt_type = $3 AND event_key = $4"
    ))
    .bind(tenant_id)
    .bind(order_id)
    .bind(receipt_type.as_str())
    .bind(event_key)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_receipt(
    pool: &PgPool,
    tenant_id: &str,
    receipt_id: i64,
) -> Result<Option<ReceiptRow>, DbError> {
    let row = sqlx::query_as::<_, ReceiptRow>(&format!(
        "SELECT {RECEIPT_COLUMNS} FROM receipts WHERE tenant_id = $1 AND id = $2"
    ))
    .bind(tenant_id)
    .bind(receipt_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// All receipts of an order, sale first, then refunds by issue time.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_receipts_for_order(
    pool: &PgPool,
    tenant_id: &str,
    order_id: &str,
) -> Result<Vec<ReceiptRow>, DbError> {
    let rows = sqlx::query_as::<_, ReceiptRow>(&format!(
        "SELECT {RECEIPT_COLUMNS} FROM receipts \
         WHERE tenant_id = $1 AND order_id = $2 \
         ORDER BY (receipt_type = 'sale') DESC, issued_at, id"
    ))
    .bind(tenant_id)
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts a receipt unless its slot is already taken.
///
/// Returns `None` when a receipt with the same `(order, type, event key)`
/// already exists for the tenant.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails for any other reason (for
/// example a refund whose reference receipt does not exist).
pub async fn insert_receipt(
    pool: &PgPool,
    tenant_id: &str,
    receipt: &NewReceipt,
) -> Result<Option<ReceiptRow>, DbError> {
    let row = sqlx::query_as::<_, ReceiptRow>(&format!(
        "INSERT INTO receipts \
             (tenant_id, order_id, receipt_type, event_key, issued_at, payload, \
              reference_receipt_id, refund_amount) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (tenant_id, order_id, receipt_type, event_key) DO NOTHING \
         RETURNING {RECEIPT_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(&receipt.order_id)
    .bind(receipt.receipt_type.as_str())
    .bind(&receipt.event_key)
    .bind(receipt.issued_at)
    .bind(&receipt.payload)
    .bind(receipt.reference_receipt_id)
    .bind(receipt.refund_amount)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Deletes a receipt together with every refund receipt that references it.
///
/// Returns the ids of all deleted rows; empty when the receipt does not
/// exist. Refund events pointing at deleted receipts keep their status and
/// lose the receipt link.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_receipt_cascade(
    pool: &PgPool,
    tenant_id: &str,
    receipt_id: i64,
) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "WITH doomed AS ( \
             SELECT id FROM receipts WHERE tenant_id = $1 AND id = $2 \
             UNION \
             SELECT id FROM receipts WHERE tenant_id = $1 AND reference_receipt_id = $2 \
         ) \
         DELETE FROM receipts \
         WHERE id IN (SELECT id FROM doomed) \
         RETURNING id",
    )
    .bind(tenant_id)
    .bind(receipt_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Records how a refund was paid back.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the receipt does not exist,
/// [`DbError::InvalidReceipt`] if it is a sale receipt, or [`DbError::Sqlx`]
/// on query failure.
pub async fn set_return_payment_type(
    pool: &PgPool,
    tenant_id: &str,
    receipt_id: i64,
    payment_type: ReturnPaymentType,
) -> Result<ReceiptRow, DbError> {
    let updated = sqlx::query_as::<_, ReceiptRow>(&format!(
        "UPDATE receipts SET return_payment_type = $3 \
         WHERE tenant_id = $1 AND id = $2 AND receipt_type = 'refund' \
         RETURNING {RECEIPT_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(receipt_id)
    .bind(payment_type.code())
    .fetch_optional(pool)
    .await?;

    if let Some(row) = updated {
        return Ok(row);
    }
    match get_receipt(pool, tenant_id, receipt_id).await? {
        Some(row) => Err(DbError::InvalidReceipt(format!(
            "receipt {} is a {} receipt; return payment type applies to refunds only",
            row.id, row.receipt_type
        ))),
        None => Err(DbError::NotFound),
    }
}
