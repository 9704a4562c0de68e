use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recon_core::{
    NewReceipt, NewWebhookLog, Order, Receipt, ReceiptType, RefundEvent, RefundEventRecord,
    ReturnPaymentType, SyncState, Tenant, WebhookLog,
};
use sqlx::PgPool;

use super::{InsertOutcome, TenantStore};
use crate::error::StoreError;

/// [`TenantStore`] backed by Postgres through `recon-db`.
#[derive(Debug, Clone)]
pub struct PgTenantStore {
    pool: PgPool,
}

impl PgTenantStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn limit_i64(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, StoreError> {
        let row = recon_db::get_tenant(&self.pool, tenant_id).await?;
        Ok(row.map(Tenant::from))
    }

    async fn list_active_tenants(&self) -> Result<Vec<Tenant>, StoreError> {
        let rows = recon_db::list_active_tenants(&self.pool).await?;
        Ok(rows.into_iter().map(Tenant::from).collect())
    }

    async fn upsert_order(&self, tenant_id: &str, order: &Order) -> Result<bool, StoreError> {
        Ok(recon_db::upsert_order(&self.pool, tenant_id, order).await?)
    }

    async fn get_order(
        &self,
        tenant_id: &str,
        order_id: &str,
    ) -> Result<Option<Order>, StoreError> {
        recon_db::get_order(&self.pool, tenant_id, order_id)
            .await?
            .map(Order::try_from)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn orders_created_between(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError> {
        recon_db::list_orders_created_between(&self.pool, tenant_id, start, end)
            .await?
            .into_iter()
            .map(|row| Order::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn find_receipt(
        &self,
        tenant_id: &str,
        order_id: &str,
        receipt_type: ReceiptType,
        event_key: &str,
    ) -> Result<Option<Receipt>, StoreError> {
        recon_db::find_receipt(&self.pool, tenant_id, order_id, receipt_type, event_key)
            .await?
            .map(Receipt::try_from)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn get_receipt(
        &self,
        tenant_id: &str,
        receipt_id: i64,
    ) -> Result<Option<Receipt>, StoreError> {
        recon_db::get_receipt(&self.pool, tenant_id, receipt_id)
            .await?
            .map(Receipt::try_from)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn list_receipts(
        &self,
        tenant_id: &str,
        order_id: &str,
    ) -> Result<Vec<Receipt>, StoreError> {
        recon_db::list_receipts_for_order(&self.pool, tenant_id, order_id)
            .await?
            .into_iter()
            .map(|row| Receipt::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn insert_receipt(
        &self,
        tenant_id: &str,
        receipt: &NewReceipt,
    ) -> Result<InsertOutcome, StoreError> {
        match recon_db::insert_receipt(&self.pool, tenant_id, receipt).await? {
            Some(row) => Ok(InsertOutcome::Inserted(Receipt::try_from(row)?)),
            None => Ok(InsertOutcome::Duplicate),
        }
    }

    async fn delete_receipt_cascade(
        &self,
        tenant_id: &str,
        receipt_id: i64,
    ) -> Result<Vec<i64>, StoreError> {
        Ok(recon_db::delete_receipt_cascade(&self.pool, tenant_id, receipt_id).await?)
    }

    async fn set_return_payment_type(
        &self,
        tenant_id: &str,
        receipt_id: i64,
        payment_type: ReturnPaymentType,
    ) -> Result<Receipt, StoreError> {
        let row =
            recon_db::set_return_payment_type(&self.pool, tenant_id, receipt_id, payment_type)
                .await?;
        Ok(Receipt::try_from(row)?)
    }

    async fn load_sync_state(&self, tenant_id: &str) -> Result<Option<SyncState>, StoreError> {
        recon_db::get_sync_state(&self.pool, tenant_id)
            .await?
            .map(SyncState::try_from)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn save_sync_state(&self, tenant_id: &str, state: &SyncState) -> Result<(), StoreError> {
        recon_db::save_sync_state(&self.pool, tenant_id, state).await?;
        Ok(())
    }

    async fn append_webhook_log(
        &self,
        tenant_id: &str,
        log: &NewWebhookLog,
    ) -> Result<(), StoreError> {
        recon_db::insert_webhook_log(&self.pool, tenant_id, log).await?;
        Ok(())
    }

    async fn list_webhook_logs(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<WebhookLog>, StoreError> {
        recon_db::list_webhook_logs(&self.pool, tenant_id, limit_i64(limit))
            .await?
            .into_iter()
            .map(|row| WebhookLog::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn prune_webhook_logs(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(recon_db::prune_webhook_logs(&self.pool, older_than).await?)
    }

    async fn record_refund_event(
        &self,
        tenant_id: &str,
        event: &RefundEvent,
    ) -> Result<RefundEventRecord, StoreError> {
        let row = recon_db::record_refund_event(&self.pool, tenant_id, event).await?;
        Ok(RefundEventRecord::try_from(row)?)
    }

    async fn get_refund_event(
        &self,
        tenant_id: &str,
        order_id: &str,
        event_key: &str,
    ) -> Result<Option<RefundEventRecord>, StoreError> {
        recon_db::get_refund_event(&self.pool, tenant_id, order_id, event_key)
            .await?
            .map(RefundEventRecord::try_from)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn due_refund_events(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RefundEventRecord>, StoreError> {
        recon_db::list_due_refund_events(&self.pool, tenant_id, now, limit_i64(limit))
            .await?
            .into_iter()
            .map(|row| RefundEventRecord::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn mark_refund_attempt_failed(
        &self,
        id: i64,
        attempts: i32,
        last_error: &str,
        next_eligible_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        recon_db::mark_refund_attempt_failed(&self.pool, id, attempts, last_error, next_eligible_at)
            .await?;
        Ok(())
    }

    async fn mark_refund_issued(&self, id: i64, receipt_id: i64) -> Result<(), StoreError> {
        recon_db::mark_refund_issued(&self.pool, id, receipt_id).await?;
        Ok(())
    }

    async fn mark_refund_failed(
        &self,
        id: i64,
        attempts: i32,
        reason: &str,
    ) -> Result<(), StoreError> {
        recon_db::mark_refund_failed(&self.pool, id, attempts, reason).await?;
        Ok(())
    }
}
