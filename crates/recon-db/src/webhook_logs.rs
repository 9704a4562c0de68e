//! Database operations for `webhook_logs`.

use chrono::{DateTime, Utc};
use recon_core::{NewWebhookLog, WebhookLog, WebhookLogStatus};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `webhook_logs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WebhookLogRow {
    pub id: i64,
    pub tenant_id: String,
    pub event_type: String,
    pub order_id: Option<String>,
    pub order_number: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub payload_preview: String,
    pub received_at: DateTime<Utc>,
}

impl TryFrom<WebhookLogRow> for WebhookLog {
    type Error = DbError;

    fn try_from(row: WebhookLogRow) -> Result<Self, Self::Error> {
        let status = WebhookLogStatus::parse(&row.status).ok_or_else(|| DbError::InvalidRow {
            table: "webhook_logs",
            reason: format!("unknown status \"{}\"", row.status),
        })?;
        Ok(WebhookLog {
            id: row.id,
            event_type: row.event_type,
            order_id: row.order_id,
            order_number: row.order_number,
            status,
            error_message: row.error_message,
            payload_preview: row.payload_preview,
            received_at: row.received_at,
        })
    }
}

const WEBHOOK_LOG_COLUMNS: &str = "id, tenant_id, event_type, order_id, order_number, status, \
     error_message, payload_preview, received_at";

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_webhook_log(
    pool: &PgPool,
    tenant_id: &str,
    log: &NewWebhookLog,
) -> Result<WebhookLogRow, DbError> {
    let row = sqlx::query_as::<_, WebhookLogRow>(&format!(
        "INSERT INTO webhook_logs \
             (tenant_id, event_type, order_id, order_number, status, error_message, payload_preview) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {WEBHOOK_LOG_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(&log.event_type)
    .bind(&log.order_id)
    .bind(&log.order_number)
    .bind(log.status.as_str())
    .bind(&log.error_message)
    .bind(&log.payload_preview)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Most recent entries first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_webhook_logs(
    pool: &PgPool,
    tenant_id: &str,
    limit: i64,
) -> Result<Vec<WebhookLogRow>, DbError> {
    let rows = sqlx::query_as::<_, WebhookLogRow>(&format!(
        "SELECT {WEBHOOK_LOG_COLUMNS} FROM webhook_logs \
         WHERE tenant_id = $1 \
         ORDER BY received_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(tenant_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Deletes entries received before `older_than`, across all tenants.
///
/// Returns the number of rows removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn prune_webhook_logs(pool: &PgPool, older_than: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM webhook_logs WHERE received_at < $1")
        .bind(older_than)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
