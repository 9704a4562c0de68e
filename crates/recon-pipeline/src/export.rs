use chrono::{DateTime, Utc};
use recon_core::AuditRecord;

use crate::error::StoreError;
use crate::store::TenantStore;

/// Audit records for orders created in `[start, end)`, oldest first.
///
/// An empty or inverted range yields no records.
///
/// # Errors
///
/// Returns [`StoreError`] if the orders cannot be read.
pub async fn orders_for_export(
    store: &dyn TenantStore,
    tenant_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<AuditRecord>, StoreError> {
    if start >= end {
        return Ok(Vec::new());
    }
    let orders = store.orders_created_between(tenant_id, start, end).await?;
    Ok(orders.iter().map(AuditRecord::from).collect())
}
