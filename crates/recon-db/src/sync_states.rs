//! Database operations for `sync_states`.

use chrono::{DateTime, Utc};
use recon_core::{SyncState, SyncStatus};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `sync_states` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncStateRow {
    pub tenant_id: String,
    pub page_cursor: Option<String>,
    pub status: String,
    pub last_error: Option<String>,
    pub watermark: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SyncStateRow> for SyncState {
    type Error = DbError;

    fn try_from(row: SyncStateRow) -> Result<Self, Self::Error> {
        let status = SyncStatus::parse(&row.status).ok_or_else(|| DbError::InvalidRow {
            table: "sync_states",
            reason: format!("unknown status \"{}\"", row.status),
        })?;
        Ok(SyncState {
            cursor: row.page_cursor,
            status,
            last_error: row.last_error,
            watermark: row.watermark,
            updated_at: Some(row.updated_at),
        })
    }
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_sync_state(
    pool: &PgPool,
    tenant_id: &str,
) -> Result<Option<SyncStateRow>, DbError> {
    let row = sqlx::query_as::<_, SyncStateRow>(
        "SELECT tenant_id, page_cursor, status, last_error, watermark, updated_at \
         FROM sync_states WHERE tenant_id = $1",
    )
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Overwrites the tenant's checkpoint. `updated_at` is always set to now.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn save_sync_state(
    pool: &PgPool,
    tenant_id: &str,
    state: &SyncState,
) -> Result<SyncStateRow, DbError> {
    let row = sqlx::query_as::<_, SyncStateRow>(
        "INSERT INTO sync_states (tenant_id, page_cursor, status, last_error, watermark, updated_at) \
         VALUES ($1, $2, $3, $4, $5, NOW()) \
         ON CONFLICT (tenant_id) DO UPDATE SET \
             page_cursor = EXCLUDED.page_cursor, \
             status      = EXCLUDED.status, \
             last_error  = EXCLUDED.last_error, \
             watermark   = EXCLUDED.watermark, \
             updated_at  = NOW() \
         RETURNING tenant_id, page_cursor, status, last_error, watermark, updated_at",
    )
    .bind(tenant_id)
    .bind(&state.cursor)
    .bind(state.status.as_str())
    .bind(&state.last_error)
    .bind(state.watermark)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
