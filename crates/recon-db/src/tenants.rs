//! Database operations for `tenants`.

use chrono::{DateTime, Utc};
use recon_core::{Tenant, TenantSettings};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `tenants` table.
#[derive(Clone, sqlx::FromRow)]
pub struct TenantRow {
    pub id: String,
    pub access_token: Option<String>,
    pub fiscal_store_id: Option<String>,
    pub receipts_start_date: Option<DateTime<Utc>>,
    pub cod_receipts_enabled: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for TenantRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantRow")
            .field("id", &self.id)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[redacted]"),
            )
            .field("fiscal_store_id", &self.fiscal_store_id)
            .field("receipts_start_date", &self.receipts_start_date)
            .field("cod_receipts_enabled", &self.cod_receipts_enabled)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant {
            id: row.id,
            access_token: row.access_token,
            settings: TenantSettings {
                fiscal_store_id: row.fiscal_store_id,
                receipts_start_date: row.receipts_start_date,
                cod_receipts_enabled: row.cod_receipts_enabled,
            },
            is_active: row.is_active,
        }
    }
}

const TENANT_COLUMNS: &str = "id, access_token, fiscal_store_id, receipts_start_date, \
     cod_receipts_enabled, is_active, created_at, updated_at";

/// Inserts or fully replaces a tenant's credential and settings.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_tenant(pool: &PgPool, tenant: &Tenant) -> Result<TenantRow, DbError> {
    let row = sqlx::query_as::<_, TenantRow>(&format!(
        "INSERT INTO tenants \
             (id, access_token, fiscal_store_id, receipts_start_date, \
              cod_receipts_enabled, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (id) DO UPDATE SET \
             access_token         = EXCLUDED.access_token, \
             fiscal_store_id      = EXCLUDED.fiscal_store_id, \
             receipts_start_date  = EXCLUDED.receipts_start_date, \
             cod_receipts_enabled = EXCLUDED.cod_receipts_enabled, \
             is_active            = EXCLUDED.is_active, \
             updated_at           = NOW() \
         RETURNING {TENANT_COLUMNS}"
    ))
    .bind(&tenant.id)
    .bind(&tenant.access_token)
    .bind(&tenant.settings.fiscal_store_id)
    .bind(tenant.settings.receipts_start_date)
    .bind(tenant.settings.cod_receipts_enabled)
    .bind(tenant.is_active)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns the tenant with `id`, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_tenant(pool: &PgPool, id: &str) -> Result<Option<TenantRow>, DbError> {
    let row = sqlx::query_as::<_, TenantRow>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns all active tenants ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_tenants(pool: &PgPool) -> Result<Vec<TenantRow>, DbError> {
    let rows = sqlx::query_as::<_, TenantRow>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE is_active = TRUE ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
