//! Per-tenant persistence as seen by the pipeline.
//!
//! [`PgTenantStore`] is the production implementation over `recon-db`.
//! [`MemoryStore`] honours the same contract, including receipt uniqueness,
//! and backs tests and dry runs.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recon_core::{
    NewReceipt, NewWebhookLog, Order, Receipt, ReceiptType, RefundEvent, RefundEventRecord,
    ReturnPaymentType, SyncState, Tenant, WebhookLog,
};

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use postgres::PgTenantStore;

/// Result of [`TenantStore::insert_receipt`].
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(Receipt),
    /// A receipt already occupies the `(order, type, event key)` slot.
    Duplicate,
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    // Tenants
    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, StoreError>;
    async fn list_active_tenants(&self) -> Result<Vec<Tenant>, StoreError>;

    // Orders
    /// Overwrites the order. Returns `true` when it was not stored before.
    async fn upsert_order(&self, tenant_id: &str, order: &Order) -> Result<bool, StoreError>;
    async fn get_order(&self, tenant_id: &str, order_id: &str)
        -> Result<Option<Order>, StoreError>;
    /// Orders with `created_at` in `[start, end)`, oldest first.
    async fn orders_created_between(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError>;

    // Receipts
    async fn find_receipt(
        &self,
        tenant_id: &str,
        order_id: &str,
        receipt_type: ReceiptType,
        event_key: &str,
    ) -> Result<Option<Receipt>, StoreError>;
    async fn get_receipt(
        &self,
        tenant_id: &str,
        receipt_id: i64,
    ) -> Result<Option<Receipt>, StoreError>;
    async fn list_receipts(
        &self,
        tenant_id: &str,
        order_id: &str,
    ) -> Result<Vec<Receipt>, StoreError>;
    async fn insert_receipt(
        &self,
        tenant_id: &str,
        receipt: &NewReceipt,
    ) -> Result<InsertOutcome, StoreError>;
    /// Deletes the receipt and any refund receipts referencing it. Returns
    /// the deleted ids, empty when nothing matched.
    async fn delete_receipt_cascade(
        &self,
        tenant_id: &str,
        receipt_id: i64,
    ) -> Result<Vec<i64>, StoreError>;
    async fn set_return_payment_type(
        &self,
        tenant_id: &str,
        receipt_id: i64,
        payment_type: ReturnPaymentType,
    ) -> Result<Receipt, StoreError>;

    // Sync state
    async fn load_sync_state(&self, tenant_id: &str) -> Result<Option<SyncState>, StoreError>;
    async fn save_sync_state(&self, tenant_id: &str, state: &SyncState) -> Result<(), StoreError>;

    // Webhook logs
    async fn append_webhook_log(
        &self,
        tenant_id: &str,
        log: &NewWebhookLog,
    ) -> Result<(), StoreError>;
    /// Most recent first.
    async fn list_webhook_logs(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<WebhookLog>, StoreError>;
    /// Removes entries of every tenant received before `older_than`.
    async fn prune_webhook_logs(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError>;

    // Refund events
    /// Records the event, or returns the stored record for the same
    /// `(order, event key)` untouched.
    async fn record_refund_event(
        &self,
        tenant_id: &str,
        event: &RefundEvent,
    ) -> Result<RefundEventRecord, StoreError>;
    async fn get_refund_event(
        &self,
        tenant_id: &str,
        order_id: &str,
        event_key: &str,
    ) -> Result<Option<RefundEventRecord>, StoreError>;
    /// Pending events eligible at `now`, oldest first.
    async fn due_refund_events(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RefundEventRecord>, StoreError>;
    async fn mark_refund_attempt_failed(
        &self,
        id: i64,
        attempts: i32,
        last_error: &str,
        next_eligible_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn mark_refund_issued(&self, id: i64, receipt_id: i64) -> Result<(), StoreError>;
    async fn mark_refund_failed(&self, id: i64, attempts: i32, reason: &str)
        -> Result<(), StoreError>;
}
