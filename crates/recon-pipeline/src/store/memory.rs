use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recon_core::{
    NewReceipt, NewWebhookLog, Order, Receipt, ReceiptType, RefundEvent, RefundEventRecord,
    RefundEventStatus, ReturnPaymentType, SyncState, Tenant, WebhookLog,
};

use super::{InsertOutcome, TenantStore};
use crate::error::StoreError;

/// In-memory [`TenantStore`].
///
/// All state sits behind one mutex that is only held inside synchronous
/// sections, never across an `.await`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    tenants: BTreeMap<String, Tenant>,
    orders: BTreeMap<(String, String), Order>,
    receipts: BTreeMap<i64, (String, Receipt)>,
    sync_states: HashMap<String, SyncState>,
    webhook_logs: Vec<(String, WebhookLog)>,
    refund_events: BTreeMap<i64, (String, RefundEventRecord)>,
    last_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn pending_refund_mut(&mut self, id: i64) -> Result<&mut RefundEventRecord, StoreError> {
        match self.refund_events.get_mut(&id) {
            Some((_, record)) if record.status == RefundEventStatus::Pending => Ok(record),
            _ => Err(StoreError::NotFound),
        }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a tenant.
    pub fn put_tenant(&self, tenant: Tenant) {
        self.lock().tenants.insert(tenant.id.clone(), tenant);
    }

    #[must_use]
    pub fn order_count(&self, tenant_id: &str) -> usize {
        self.lock()
            .orders
            .keys()
            .filter(|(tenant, _)| tenant == tenant_id)
            .count()
    }

    /// Every receipt of the tenant, in insertion order.
    #[must_use]
    pub fn receipts(&self, tenant_id: &str) -> Vec<Receipt> {
        self.lock()
            .receipts
            .values()
            .filter(|(tenant, _)| tenant == tenant_id)
            .map(|(_, receipt)| receipt.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn key(tenant_id: &str, order_id: &str) -> (String, String) {
    (tenant_id.to_string(), order_id.to_string())
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, StoreError> {
        Ok(self.lock().tenants.get(tenant_id).cloned())
    }

    async fn list_active_tenants(&self) -> Result<Vec<Tenant>, StoreError> {
        Ok(self
            .lock()
            .tenants
            .values()
            .filter(|t| t.is_active)
            .cloned()
            .collect())
    }

    async fn upsert_order(&self, tenant_id: &str, order: &Order) -> Result<bool, StoreError> {
        let mut state = self.lock();
        if !state.tenants.contains_key(tenant_id) {
            return Err(StoreError::Constraint(format!("unknown tenant {tenant_id}")));
        }
        let previous = state.orders.insert(key(tenant_id, &order.id), order.clone());
        Ok(previous.is_none())
    }

    async fn get_order(
        &self,
        tenant_id: &str,
        order_id: &str,
    ) -> Result<Option<Order>, StoreError> {
        Ok(self.lock().orders.get(&key(tenant_id, order_id)).cloned())
    }

    async fn orders_created_between(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .lock()
            .orders
            .iter()
            .filter(|((tenant, _), order)| {
                tenant == tenant_id
                    && order
                        .created_at
                        .is_some_and(|created| created >= start && created < end)
            })
            .map(|(_, order)| order.clone())
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn find_receipt(
        &self,
        tenant_id: &str,
        order_id: &str,
        receipt_type: ReceiptType,
        event_key: &str,
    ) -> Result<Option<Receipt>, StoreError> {
        Ok(self
            .lock()
            .receipts
            .values()
            .find(|(tenant, r)| {
                tenant == tenant_id
                    && r.order_id == order_id
                    && r.receipt_type == receipt_type
                    && r.event_key == event_key
            })
            .map(|(_, r)| r.clone()))
    }

    async fn get_receipt(
        &self,
        tenant_id: &str,
        receipt_id: i64,
    ) -> Result<Option<Receipt>, StoreError> {
        Ok(self
            .lock()
            .receipts
            .get(&receipt_id)
            .filter(|(tenant, _)| tenant == tenant_id)
            .map(|(_, r)| r.clone()))
    }

    async fn list_receipts(
        &self,
        tenant_id: &str,
        order_id: &str,
    ) -> Result<Vec<Receipt>, StoreError> {
        let mut receipts: Vec<Receipt> = self
            .lock()
            .receipts
            .values()
            .filter(|(tenant, r)| tenant == tenant_id && r.order_id == order_id)
            .map(|(_, r)| r.clone())
            .collect();
        receipts.sort_by_key(|r| (r.receipt_type != ReceiptType::Sale, r.issued_at, r.id));
        Ok(receipts)
    }

    async fn insert_receipt(
        &self,
        tenant_id: &str,
        receipt: &NewReceipt,
    ) -> Result<InsertOutcome, StoreError> {
        let mut state = self.lock();
        if !state.orders.contains_key(&key(tenant_id, &receipt.order_id)) {
            return Err(StoreError::Constraint(format!(
                "receipt for unknown order {}",
                receipt.order_id
            )));
        }
        let taken = state.receipts.values().any(|(tenant, r)| {
            tenant == tenant_id
                && r.order_id == receipt.order_id
                && r.receipt_type == receipt.receipt_type
                && r.event_key == receipt.event_key
        });
        if taken {
            return Ok(InsertOutcome::Duplicate);
        }
        if let Some(reference) = receipt.reference_receipt_id {
            if !state.receipts.contains_key(&reference) {
                return Err(StoreError::Constraint(format!(
                    "reference receipt {reference} does not exist"
                )));
            }
        }

        let stored = Receipt {
            id: state.next_id(),
            order_id: receipt.order_id.clone(),
            receipt_type: receipt.receipt_type,
            event_key: receipt.event_key.clone(),
            issued_at: receipt.issued_at,
            payload: receipt.payload.clone(),
            reference_receipt_id: receipt.reference_receipt_id,
            refund_amount: receipt.refund_amount,
            return_payment_type: None,
        };
        state
            .receipts
            .insert(stored.id, (tenant_id.to_string(), stored.clone()));
        Ok(InsertOutcome::Inserted(stored))
    }

    async fn delete_receipt_cascade(
        &self,
        tenant_id: &str,
        receipt_id: i64,
    ) -> Result<Vec<i64>, StoreError> {
        let mut state = self.lock();
        if !matches!(state.receipts.get(&receipt_id), Some((tenant, _)) if tenant == tenant_id) {
            return Ok(Vec::new());
        }
        let doomed: Vec<i64> = state
            .receipts
            .iter()
            .filter(|(id, (_, r))| **id == receipt_id || r.reference_receipt_id == Some(receipt_id))
            .map(|(id, _)| *id)
            .collect();
        for id in &doomed {
            state.receipts.remove(id);
        }
        for (_, record) in state.refund_events.values_mut() {
            if record.receipt_id.is_some_and(|id| doomed.contains(&id)) {
                record.receipt_id = None;
            }
        }
        Ok(doomed)
    }

    async fn set_return_payment_type(
        &self,
        tenant_id: &str,
        receipt_id: i64,
        payment_type: ReturnPaymentType,
    ) -> Result<Receipt, StoreError> {
        let mut state = self.lock();
        let receipt = match state.receipts.get_mut(&receipt_id) {
            Some((tenant, receipt)) if tenant == tenant_id => receipt,
            _ => return Err(StoreError::NotFound),
        };
        if receipt.receipt_type != ReceiptType::Refund {
            return Err(StoreError::InvalidReceipt(format!(
                "receipt {receipt_id} is a {} receipt; return payment type applies to refunds only",
                receipt.receipt_type
            )));
        }
        receipt.return_payment_type = Some(payment_type);
        Ok(receipt.clone())
    }

    async fn load_sync_state(&self, tenant_id: &str) -> Result<Option<SyncState>, StoreError> {
        Ok(self.lock().sync_states.get(tenant_id).cloned())
    }

    async fn save_sync_state(&self, tenant_id: &str, state: &SyncState) -> Result<(), StoreError> {
        let mut saved = state.clone();
        saved.updated_at = Some(Utc::now());
        self.lock().sync_states.insert(tenant_id.to_string(), saved);
        Ok(())
    }

    async fn append_webhook_log(
        &self,
        tenant_id: &str,
        log: &NewWebhookLog,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let entry = WebhookLog {
            id: state.next_id(),
            event_type: log.event_type.clone(),
            order_id: log.order_id.clone(),
            order_number: log.order_number.clone(),
            status: log.status,
            error_message: log.error_message.clone(),
            payload_preview: log.payload_preview.clone(),
            received_at: Utc::now(),
        };
        state.webhook_logs.push((tenant_id.to_string(), entry));
        Ok(())
    }

    async fn list_webhook_logs(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<WebhookLog>, StoreError> {
        Ok(self
            .lock()
            .webhook_logs
            .iter()
            .rev()
            .filter(|(tenant, _)| tenant == tenant_id)
            .take(limit)
            .map(|(_, log)| log.clone())
            .collect())
    }

    async fn prune_webhook_logs(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let before = state.webhook_logs.len();
        state
            .webhook_logs
            .retain(|(_, log)| log.received_at >= older_than);
        Ok(u64::try_from(before - state.webhook_logs.len()).unwrap_or(u64::MAX))
    }

    async fn record_refund_event(
        &self,
        tenant_id: &str,
        event: &RefundEvent,
    ) -> Result<RefundEventRecord, StoreError> {
        let mut state = self.lock();
        let existing = state.refund_events.values().find(|(tenant, r)| {
            tenant == tenant_id
                && r.event.order_id == event.order_id
                && r.event.event_key == event.event_key
        });
        if let Some((_, record)) = existing {
            return Ok(record.clone());
        }
        let record = RefundEventRecord {
            id: state.next_id(),
            event: event.clone(),
            status: RefundEventStatus::Pending,
            attempts: 0,
            last_error: None,
            next_eligible_at: Utc::now(),
            failure_reason: None,
            receipt_id: None,
        };
        state
            .refund_events
            .insert(record.id, (tenant_id.to_string(), record.clone()));
        Ok(record)
    }

    async fn get_refund_event(
        &self,
        tenant_id: &str,
        order_id: &str,
        event_key: &str,
    ) -> Result<Option<RefundEventRecord>, StoreError> {
        Ok(self
            .lock()
            .refund_events
            .values()
            .find(|(tenant, r)| {
                tenant == tenant_id && r.event.order_id == order_id && r.event.event_key == event_key
            })
            .map(|(_, r)| r.clone()))
    }

    async fn due_refund_events(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RefundEventRecord>, StoreError> {
        let mut due: Vec<RefundEventRecord> = self
            .lock()
            .refund_events
            .values()
            .filter(|(tenant, r)| {
                tenant == tenant_id
                    && r.status == RefundEventStatus::Pending
                    && r.next_eligible_at <= now
            })
            .map(|(_, r)| r.clone())
            .collect();
        due.sort_by_key(|r| (r.next_eligible_at, r.id));
        due.truncate(limit);
        Ok(due)
    }

    async fn mark_refund_attempt_failed(
        &self,
        id: i64,
        attempts: i32,
        last_error: &str,
        next_eligible_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let record = state.pending_refund_mut(id)?;
        record.attempts = attempts;
        record.last_error = Some(last_error.to_string());
        record.next_eligible_at = next_eligible_at;
        Ok(())
    }

    async fn mark_refund_issued(&self, id: i64, receipt_id: i64) -> Result<(), StoreError> {
        let mut state = self.lock();
        let (_, record) = state
            .refund_events
            .get_mut(&id)
            .ok_or(StoreError::NotFound)?;
        record.status = RefundEventStatus::Issued;
        record.receipt_id = Some(receipt_id);
        record.last_error = None;
        Ok(())
    }

    async fn mark_refund_failed(
        &self,
        id: i64,
        attempts: i32,
        reason: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let record = state.pending_refund_mut(id)?;
        record.status = RefundEventStatus::Failed;
        record.attempts = attempts;
        record.failure_reason = Some(reason.to_string());
        record.last_error = Some(reason.to_string());
        Ok(())
    }
}
