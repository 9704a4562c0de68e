//! Database operations for `refund_events`.

use chrono::{DateTime, Utc};
use recon_core::{RefundEvent, RefundEventRecord, RefundEventStatus};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `refund_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefundEventRow {
    pub id: i64,
    pub tenant_id: String,
    pub order_id: String,
    pub event_key: String,
    pub amount: Decimal,
    pub refunded_at: DateTime<Utc>,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub next_eligible_at: DateTime<Utc>,
    pub failure_reason: Option<String>,
    pub receipt_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RefundEventRow> for RefundEventRecord {
    type Error = DbError;

    fn try_from(row: RefundEventRow) -> Result<Self, Self::Error> {
        let status = RefundEventStatus::parse(&row.status).ok_or_else(|| DbError::InvalidRow {
            table: "refund_events",
            reason: format!("unknown status \"{}\"", row.status),
        })?;
        Ok(RefundEventRecord {
            id: row.id,
            event: RefundEvent {
                order_id: row.order_id,
                event_key: row.event_key,
                amount: row.amount,
                refunded_at: row.refunded_at,
            },
            status,
            attempts: row.attempts,
            last_error: row.last_error,
            next_eligible_at: row.next_eligible_at,
            failure_reason: row.failure_reason,
            receipt_id: row.receipt_id,
        })
    }
}

const REFUND_EVENT_COLUMNS: &str = "id, tenant_id, order_id, event_key, amount, refunded_at, \
     status, attempts, last_error, next_eligible_at, failure_reason, receipt_id, \
     created_at, updated_at";

/// Records a refund event, or returns the existing row for the same
/// `(order, event key)` unchanged.
///
/// New rows start `pending` and immediately eligible.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn record_refund_event(
    pool: &PgPool,
    tenant_id: &str,
    event: &RefundEvent,
) -> Result<RefundEventRow, DbError> {
    // The no-op update makes RETURNING yield the existing row on conflict.
    let row = sqlx::query_as::<_, RefundEventRow>(&format!(
        "INSERT INTO refund_events (tenant_id, order_id, event_key, amount, refunded_at) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (tenant_id, order_id, event_key) DO UPDATE SET \
             event_key = refund_events.event_key \
         RETURNING {REFUND_EVENT_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(&event.order_id)
    .bind(&event.event_key)
    .bind(event.amount)
    .bind(event.refunded_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_refund_event(
    pool: &PgPool,
    tenant_id: &str,
    order_id: &str,
    event_key: &str,
) -> Result<Option<RefundEventRow>, DbError> {
    let row = sqlx::query_as::<_, RefundEventRow>(&format!(
        "SELECT {REFUND_EVENT_COLUMNS} FROM refund_events \
         WHERE tenant_id = $1 AND order_id = $2 AND event_key = $3"
    ))
    .bind(tenant_id)
    .bind(order_id)
    .bind(event_key)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Pending events whose `next_eligible_at` is at or before `now`, oldest
/// first, at most `limit` rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_due_refund_events(
    pool: &PgPool,
    tenant_id: &str,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<RefundEventRow>, DbError> {
    let rows = sqlx::query_as::<_, RefundEventRow>(&format!(
        "SELECT {REFUND_EVENT_COLUMNS} FROM refund_events \
         WHERE tenant_id = $1 AND status = 'pending' AND next_eligible_at <= $2 \
         ORDER BY next_eligible_at, id \
         LIMIT $3"
    ))
    .bind(tenant_id)
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Stores a failed attempt and reschedules the event.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no pending event has this id, or
/// [`DbError::Sqlx`] on query failure.
pub async fn mark_refund_attempt_failed(
    pool: &PgPool,
    id: i64,
    attempts: i32,
    last_error: &str,
    next_eligible_at: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE refund_events \
         SET attempts = $2, last_error = $3, next_eligible_at = $4, updated_at = NOW() \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .bind(attempts)
    .bind(last_error)
    .bind(next_eligible_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if the event does not exist, or
/// [`DbError::Sqlx`] on query failure.
pub async fn mark_refund_issued(pool: &PgPool, id: i64, receipt_id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE refund_events \
         SET status = 'issued', receipt_id = $2, last_error = NULL, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(receipt_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Moves an event to the terminal `failed` state.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no pending event has this id, or
/// [`DbError::Sqlx`] on query failure.
pub async fn mark_refund_failed(
    pool: &PgPool,
    id: i64,
    attempts: i32,
    reason: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE refund_events \
         SET status = 'failed', attempts = $2, failure_reason = $3, last_error = $3, \
             updated_at = NOW() \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .bind(attempts)
    .bind(reason)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
