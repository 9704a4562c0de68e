//! Shared fixtures for pipeline tests: a scripted order source and tenant
//! and payload builders.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recon_commerce::{CommerceError, OrderPage, OrderQuery, PaymentRecord};
use recon_core::{
    NewReceipt, NewWebhookLog, Order, Receipt, ReceiptType, RefundEvent, RefundEventRecord,
    RetryPolicy, ReturnPaymentType, SyncState, Tenant, TenantSettings, WebhookLog,
};
use recon_pipeline::{
    Broadcaster, InsertOutcome, MemoryStore, OrderSource, Pipeline, ReceiptEngine, StoreError,
    SyncOrchestrator, SyncSettings, TenantStore, WebhookIngestor,
};
use serde_json::{json, Value};

pub const TENANT: &str = "site-1";

/// Order source that replays scripted search pages and records every query.
#[derive(Default)]
pub struct ScriptedSource {
    pages: Mutex<VecDeque<Result<OrderPage, CommerceError>>>,
    queries: Mutex<Vec<OrderQuery>>,
    details: Mutex<HashMap<String, Value>>,
    payment_records: Mutex<HashMap<String, PaymentRecord>>,
    pub detail_calls: AtomicUsize,
    pub payment_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn push_page(&self, orders: Vec<Value>, next_cursor: Option<&str>) {
        self.pages.lock().unwrap().push_back(Ok(OrderPage {
            orders,
            next_cursor: next_cursor.map(str::to_string),
        }));
    }

    pub fn push_error(&self, error: CommerceError) {
        self.pages.lock().unwrap().push_back(Err(error));
    }

    pub fn set_details(&self, order_id: &str, order: Value) {
        self.details
            .lock()
            .unwrap()
            .insert(order_id.to_string(), order);
    }

    pub fn set_payment_record(&self, order_id: &str, record: PaymentRecord) {
        self.payment_records
            .lock()
            .unwrap()
            .insert(order_id.to_string(), record);
    }

    pub fn queries(&self) -> Vec<OrderQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderSource for ScriptedSource {
    async fn query_orders(
        &self,
        _credentials: &str,
        query: &OrderQuery,
    ) -> Result<OrderPage, CommerceError> {
        self.queries.lock().unwrap().push(query.clone());
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(OrderPage::default()))
    }

    async fn fetch_order_details(
        &self,
        _credentials: &str,
        order_id: &str,
    ) -> Result<Option<Value>, CommerceError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.details.lock().unwrap().get(order_id).cloned())
    }

    async fn fetch_payment_record_for_order(
        &self,
        _credentials: &str,
        order_id: &str,
    ) -> Result<PaymentRecord, CommerceError> {
        self.payment_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .payment_records
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .unwrap_or_default())
    }
}

pub fn tenant(settings: TenantSettings) -> Tenant {
    Tenant {
        id: TENANT.to_string(),
        access_token: Some("token-1".to_string()),
        settings,
        is_active: true,
    }
}

pub fn fiscal_settings() -> TenantSettings {
    TenantSettings {
        fiscal_store_id: Some("FS-1".to_string()),
        receipts_start_date: None,
        cod_receipts_enabled: false,
    }
}

/// Everything a test needs, sharing one store, source and broadcaster.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub source: Arc<ScriptedSource>,
    pub events: Broadcaster,
    pub engine: ReceiptEngine,
    pub sync: SyncOrchestrator,
    pub webhooks: WebhookIngestor,
}

impl Harness {
    pub fn new(settings: TenantSettings) -> Self {
        Self::with_retry_policy(settings, RetryPolicy::default())
    }

    pub fn with_retry_policy(settings: TenantSettings, retry: RetryPolicy) -> Self {
        Self::build(settings, retry, |store| store)
    }

    /// Pipeline over a store that rejects order writes for `fail_upsert`
    /// and receipt writes for `fail_receipt`. `store` stays the plain
    /// in-memory store underneath.
    pub fn with_failing_writes(
        settings: TenantSettings,
        fail_upsert: &[&str],
        fail_receipt: &[&str],
    ) -> Self {
        let fail_upsert: HashSet<String> = fail_upsert.iter().map(|s| s.to_string()).collect();
        let fail_receipt: HashSet<String> = fail_receipt.iter().map(|s| s.to_string()).collect();
        Self::build(settings, RetryPolicy::default(), move |inner| {
            Arc::new(FailingStore {
                inner,
                fail_upsert,
                fail_receipt,
            })
        })
    }

    fn build(
        settings: TenantSettings,
        retry: RetryPolicy,
        wrap: impl FnOnce(Arc<dyn TenantStore>) -> Arc<dyn TenantStore>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        store.put_tenant(tenant(settings));
        let inner: Arc<dyn TenantStore> = store.clone();
        let source = Arc::new(ScriptedSource::default());
        let pipeline = Pipeline::new(
            wrap(inner),
            source.clone(),
            SyncSettings::default(),
            retry,
        );
        Self {
            store,
            source,
            events: pipeline.events,
            engine: pipeline.engine,
            sync: pipeline.sync,
            webhooks: pipeline.webhooks,
        }
    }
}

/// A fully paid card order as the order search returns it.
pub fn paid_order(id: &str, created: &str) -> Value {
    json!({
        "id": id,
        "number": 1000,
        "status": "APPROVED",
        "paymentStatus": "PAID",
        "currency": "EUR",
        "createdDate": created,
        "updatedDate": created,
        "priceSummary": {
            "subtotal": { "amount": "40.00" },
            "total": { "amount": "40.00" }
        },
        "buyerInfo": { "email": "buyer@example.com" },
        "payments": [{
            "id": format!("pay-{id}"),
            "createdDate": created,
            "regularPaymentDetails": {
                "status": "APPROVED",
                "paymentMethod": "CreditCard",
                "providerTransactionId": format!("tx-{id}")
            }
        }]
    })
}

/// Delegates to an inner store, failing writes for selected order ids.
struct FailingStore {
    inner: Arc<dyn TenantStore>,
    fail_upsert: HashSet<String>,
    fail_receipt: HashSet<String>,
}

fn injected(operation: &str, order_id: &str) -> StoreError {
    StoreError::Constraint(format!("{operation} rejected for {order_id}"))
}

#[async_trait]
impl TenantStore for FailingStore {
    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, StoreError> {
        self.inner.get_tenant(tenant_id).await
    }

    async fn list_active_tenants(&self) -> Result<Vec<Tenant>, StoreError> {
        self.inner.list_active_tenants().await
    }

    async fn upsert_order(&self, tenant_id: &str, order: &Order) -> Result<bool, StoreError> {
        if self.fail_upsert.contains(&order.id) {
            return Err(injected("upsert", &order.id));
        }
        self.inner.upsert_order(tenant_id, order).await
    }

    async fn get_order(
        &self,
        tenant_id: &str,
        order_id: &str,
    ) -> Result<Option<Order>, StoreError> {
        self.inner.get_order(tenant_id, order_id).await
    }

    async fn orders_created_between(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError> {
        self.inner.orders_created_between(tenant_id, start, end).await
    }

    async fn find_receipt(
        &self,
        tenant_id: &str,
        order_id: &str,
        receipt_type: ReceiptType,
        event_key: &str,
    ) -> Result<Option<Receipt>, StoreError> {
        self.inner
            .find_receipt(tenant_id, order_id, receipt_type, event_key)
            .await
    }

    async fn get_receipt(
        &self,
        tenant_id: &str,
        receipt_id: i64,
    ) -> Result<Option<Receipt>, StoreError> {
        self.inner.get_receipt(tenant_id, receipt_id).await
    }

    async fn list_receipts(
        &self,
        tenant_id: &str,
        order_id: &str,
    ) -> Result<Vec<Receipt>, StoreError> {
        self.inner.list_receipts(tenant_id, order_id).await
    }

    async fn insert_receipt(
        &self,
        tenant_id: &str,
        receipt: &NewReceipt,
    ) -> Result<InsertOutcome, StoreError> {
        if self.fail_receipt.contains(&receipt.order_id) {
            return Err(injected("receipt insert", &receipt.order_id));
        }
        self.inner.insert_receipt(tenant_id, receipt).await
    }

    async fn delete_receipt_cascade(
        &self,
        tenant_id: &str,
        receipt_id: i64,
    ) -> Result<Vec<i64>, StoreError> {
        self.inner.delete_receipt_cascade(tenant_id, receipt_id).await
    }

    async fn set_return_payment_type(
        &self,
        tenant_id: &str,
        receipt_id: i64,
        payment_type: ReturnPaymentType,
    ) -> Result<Receipt, StoreError> {
        self.inner
            .set_return_payment_type(tenant_id, receipt_id, payment_type)
            .await
    }

    async fn load_sync_state(&self, tenant_id: &str) -> Result<Option<SyncState>, StoreError> {
        self.inner.load_sync_state(tenant_id).await
    }

    async fn save_sync_state(&self, tenant_id: &str, state: &SyncState) -> Result<(), StoreError> {
        self.inner.save_sync_state(tenant_id, state).await
    }

    async fn append_webhook_log(
        &self,
        tenant_id: &str,
        log: &NewWebhookLog,
    ) -> Result<(), StoreError> {
        self.inner.append_webhook_log(tenant_id, log).await
    }

    async fn list_webhook_logs(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<WebhookLog>, StoreError> {
        self.inner.list_webhook_logs(tenant_id, limit).await
    }

    async fn prune_webhook_logs(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        self.inner.prune_webhook_logs(older_than).await
    }

    async fn record_refund_event(
        &self,
        tenant_id: &str,
        event: &RefundEvent,
    ) -> Result<RefundEventRecord, StoreError> {
        self.inner.record_refund_event(tenant_id, event).await
    }

    async fn get_refund_event(
        &self,
        tenant_id: &str,
        order_id: &str,
        event_key: &str,
    ) -> Result<Option<RefundEventRecord>, StoreError> {
        self.inner
            .get_refund_event(tenant_id, order_id, event_key)
            .await
    }

    async fn due_refund_events(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RefundEventRecord>, StoreError> {
        self.inner.due_refund_events(tenant_id, now, limit).await
    }

    async fn mark_refund_attempt_failed(
        &self,
        id: i64,
        attempts: i32,
        last_error: &str,
        next_eligible_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner
            .mark_refund_attempt_failed(id, attempts, last_error, next_eligible_at)
            .await
    }

    async fn mark_refund_issued(&self, id: i64, receipt_id: i64) -> Result<(), StoreError> {
        self.inner.mark_refund_issued(id, receipt_id).await
    }

    async fn mark_refund_failed(
        &self,
        id: i64,
        attempts: i32,
        reason: &str,
    ) -> Result<(), StoreError> {
        self.inner.mark_refund_failed(id, attempts, reason).await
    }
}
