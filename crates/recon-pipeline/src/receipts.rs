//! Fiscal receipt decisions.
//!
//! The sale track issues at most one `sale` receipt per order once the order
//! is eligible. The refund track issues one `refund` receipt per refund
//! event, referencing the sale receipt; a refund seen before its sale
//! receipt is deferred and retried on a bounded schedule. Refund receipts
//! never add up to more than the sale they reference. In both tracks the
//! store's uniqueness index is the final word: losing an insert race yields
//! [`ReceiptDecision::AlreadyIssued`], never an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use recon_commerce::extract_refund_events;
use recon_core::{
    NewReceipt, Order, PaymentStatus, Receipt, ReceiptType, RefundEvent, RefundEventRecord,
    RefundEventStatus, ReturnPaymentType, RetryPolicy, Tenant, TenantSettings, SALE_EVENT_KEY,
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::events::{Broadcaster, PipelineEvent};
use crate::store::{InsertOutcome, TenantStore};

/// Due refund events handled per [`ReceiptEngine::process_pending_refunds`] call.
const REFUND_PASS_LIMIT: usize = 500;

/// Why an order does not (yet) qualify for a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Ineligible {
    #[error("order is not fully paid ({0})")]
    NotFullyPaid(PaymentStatus),
    #[error("order is canceled")]
    Canceled,
    #[error("order total is not positive")]
    NonPositiveTotal,
    #[error("tenant has no fiscal store configured")]
    NoFiscalStore,
    #[error("no transaction reference and cash-on-delivery receipts are not enabled")]
    NoTransactionRef,
    #[error("order was paid before the receipts start date")]
    BeforeStartDate,
    #[error("order has no paid or created timestamp to compare with the receipts start date")]
    MissingPaidAt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReceiptDecision {
    Issued(Receipt),
    AlreadyIssued,
    NotEligible(Ineligible),
    /// Refund waiting for its sale receipt.
    Deferred {
        attempts: i32,
        next_eligible_at: DateTime<Utc>,
    },
    /// Refund retry budget exhausted.
    Failed(String),
}

impl ReceiptDecision {
    #[must_use]
    pub fn is_issued(&self) -> bool {
        matches!(self, ReceiptDecision::Issued(_))
    }

    #[must_use]
    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            ReceiptDecision::Issued(receipt) => Some(receipt),
            _ => None,
        }
    }
}

/// Both tracks' decisions for one order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvaluation {
    pub sale: ReceiptDecision,
    pub refunds: Vec<ReceiptDecision>,
}

impl OrderEvaluation {
    #[must_use]
    pub fn issued(&self) -> usize {
        self.decisions().filter(|d| d.is_issued()).count()
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.decisions().filter(|d| !d.is_issued()).count()
    }

    fn decisions(&self) -> impl Iterator<Item = &ReceiptDecision> {
        std::iter::once(&self.sale).chain(self.refunds.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundPassSummary {
    pub due: usize,
    pub issued: usize,
    pub already_issued: usize,
    pub deferred: usize,
    pub failed: usize,
}

/// Amount on the sale receipt, falling back to the current order total when
/// the snapshot carries none.
fn sale_amount(sale: &Receipt, order: &Order) -> Decimal {
    sale.payload
        .get("total")
        .cloned()
        .and_then(|total| serde_json::from_value::<Decimal>(total).ok())
        .unwrap_or(order.total)
}

/// Sum of the refund receipts already issued against `sale_id`, as a
/// positive amount.
fn refunded_amount(receipts: &[Receipt], sale_id: i64) -> Decimal {
    receipts
        .iter()
        .filter(|r| r.receipt_type == ReceiptType::Refund)
        .filter(|r| r.reference_receipt_id == Some(sale_id))
        .filter_map(|r| r.refund_amount)
        .map(|amount| amount.abs())
        .sum()
}

/// The timestamp compared against the receipts start date.
fn paid_timestamp(order: &Order) -> Option<DateTime<Utc>> {
    order.paid_at.or(order.created_at)
}

fn check_start_date(settings: &TenantSettings, order: &Order) -> Result<(), Ineligible> {
    let Some(start) = settings.receipts_start_date else {
        return Ok(());
    };
    match paid_timestamp(order) {
        Some(paid) if paid >= start => Ok(()),
        Some(_) => Err(Ineligible::BeforeStartDate),
        None => Err(Ineligible::MissingPaidAt),
    }
}

/// Sale-track eligibility. Checks run in a fixed order and the first
/// failing one is reported.
///
/// # Errors
///
/// Returns the [`Ineligible`] reason of the first failed check.
pub fn sale_eligibility(settings: &TenantSettings, order: &Order) -> Result<(), Ineligible> {
    if !order.payment_status.is_fully_paid() {
        return Err(Ineligible::NotFullyPaid(order.payment_status));
    }
    if order.is_canceled() {
        return Err(Ineligible::Canceled);
    }
    if order.total.is_sign_negative() || order.total.is_zero() {
        return Err(Ineligible::NonPositiveTotal);
    }
    if !settings.has_fiscal_store() {
        return Err(Ineligible::NoFiscalStore);
    }
    // A transaction reference always qualifies; the COD switch only matters
    // when it is absent.
    let cod_allowed = settings.cod_receipts_enabled && order.payment_method() == Some("offline");
    if order.transaction_ref().is_none() && !cod_allowed {
        return Err(Ineligible::NoTransactionRef);
    }
    check_start_date(settings, order)
}

/// Refund-track preconditions that do not depend on the sale receipt.
///
/// # Errors
///
/// Returns [`Ineligible::NoFiscalStore`] or a start-date reason.
pub fn refund_eligibility(settings: &TenantSettings, order: &Order) -> Result<(), Ineligible> {
    if !settings.has_fiscal_store() {
        return Err(Ineligible::NoFiscalStore);
    }
    check_start_date(settings, order)
}

#[derive(Clone)]
pub struct ReceiptEngine {
    store: Arc<dyn TenantStore>,
    retry: RetryPolicy,
    events: Broadcaster,
}

impl ReceiptEngine {
    pub fn new(store: Arc<dyn TenantStore>, events: Broadcaster) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            events,
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Runs the sale track, then the refund track for every refund recorded
    /// in the order payload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store fails.
    pub async fn evaluate_order(
        &self,
        tenant: &Tenant,
        order: &Order,
        now: DateTime<Utc>,
    ) -> Result<OrderEvaluation, StoreError> {
        let sale = self.evaluate_sale(tenant, order, now).await?;
        let refunds = self
            .evaluate_refunds(tenant, order, &extract_refund_events(order), now)
            .await?;
        Ok(OrderEvaluation { sale, refunds })
    }

    /// # Errors
    ///
    /// Returns [`StoreError`] if the store fails.
    pub async fn evaluate_sale(
        &self,
        tenant: &Tenant,
        order: &Order,
        now: DateTime<Utc>,
    ) -> Result<ReceiptDecision, StoreError> {
        if let Err(reason) = sale_eligibility(&tenant.settings, order) {
            debug!(tenant = %tenant.id, order_id = %order.id, %reason, "sale receipt not eligible");
            return Ok(ReceiptDecision::NotEligible(reason));
        }

        if self
            .store
            .find_receipt(&tenant.id, &order.id, ReceiptType::Sale, SALE_EVENT_KEY)
            .await?
            .is_some()
        {
            return Ok(ReceiptDecision::AlreadyIssued);
        }

        let receipt = NewReceipt::sale(order, order.paid_at.unwrap_or(now));
        match self.store.insert_receipt(&tenant.id, &receipt).await? {
            InsertOutcome::Inserted(receipt) => {
                info!(
                    tenant = %tenant.id,
                    order_id = %order.id,
                    receipt_id = receipt.id,
                    "sale receipt issued"
                );
                self.publish_issued(&tenant.id, &receipt);
                Ok(ReceiptDecision::Issued(receipt))
            }
            InsertOutcome::Duplicate => Ok(ReceiptDecision::AlreadyIssued),
        }
    }

    /// # Errors
    ///
    /// Returns [`StoreError`] if the store fails.
    pub async fn evaluate_refunds(
        &self,
        tenant: &Tenant,
        order: &Order,
        events: &[RefundEvent],
        now: DateTime<Utc>,
    ) -> Result<Vec<ReceiptDecision>, StoreError> {
        let mut decisions = Vec::with_capacity(events.len());
        for event in events {
            decisions.push(self.evaluate_refund(tenant, order, event, now).await?);
        }
        Ok(decisions)
    }

    /// Records `event` and issues its refund receipt if the sale receipt
    /// exists. A pending event that is not yet due again is reported as
    /// deferred without spending an attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store fails.
    pub async fn evaluate_refund(
        &self,
        tenant: &Tenant,
        order: &Order,
        event: &RefundEvent,
        now: DateTime<Utc>,
    ) -> Result<ReceiptDecision, StoreError> {
        if let Err(reason) = refund_eligibility(&tenant.settings, order) {
            return Ok(ReceiptDecision::NotEligible(reason));
        }

        let record = self.store.record_refund_event(&tenant.id, event).await?;
        match record.status {
            RefundEventStatus::Issued => Ok(ReceiptDecision::AlreadyIssued),
            RefundEventStatus::Failed => Ok(ReceiptDecision::Failed(
                record.failure_reason.unwrap_or_default(),
            )),
            RefundEventStatus::Pending if record.attempts > 0 && record.next_eligible_at > now => {
                Ok(ReceiptDecision::Deferred {
                    attempts: record.attempts,
                    next_eligible_at: record.next_eligible_at,
                })
            }
            RefundEventStatus::Pending => self.attempt_refund(tenant, order, &record, now).await,
        }
    }

    /// Retries every pending refund event of the tenant that is due at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown tenant, or any other
    /// [`StoreError`] from the store.
    pub async fn process_pending_refunds(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RefundPassSummary, StoreError> {
        let tenant = self
            .store
            .get_tenant(tenant_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        let due = self
            .store
            .due_refund_events(tenant_id, now, REFUND_PASS_LIMIT)
            .await?;

        let mut summary = RefundPassSummary {
            due: due.len(),
            ..RefundPassSummary::default()
        };
        for record in due {
            let decision = match self.store.get_order(tenant_id, &record.event.order_id).await? {
                Some(order) => self.attempt_refund(&tenant, &order, &record, now).await?,
                None => self.defer(&record, "order is not stored", now).await?,
            };
            match decision {
                ReceiptDecision::Issued(_) => summary.issued += 1,
                ReceiptDecision::AlreadyIssued => summary.already_issued += 1,
                ReceiptDecision::Deferred { .. } | ReceiptDecision::NotEligible(_) => {
                    summary.deferred += 1;
                }
                ReceiptDecision::Failed(_) => summary.failed += 1,
            }
        }

        if summary.due > 0 {
            info!(
                tenant = %tenant_id,
                due = summary.due,
                issued = summary.issued,
                deferred = summary.deferred,
                failed = summary.failed,
                "refund pass finished"
            );
        }
        Ok(summary)
    }

    /// Deletes a receipt; for a sale receipt this also deletes its refund
    /// receipts. Returns the deleted ids.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the tenant has no such receipt.
    pub async fn void_receipt(
        &self,
        tenant_id: &str,
        receipt_id: i64,
    ) -> Result<Vec<i64>, StoreError> {
        let deleted = self
            .store
            .delete_receipt_cascade(tenant_id, receipt_id)
            .await?;
        if deleted.is_empty() {
            return Err(StoreError::NotFound);
        }
        info!(tenant = %tenant_id, receipt_id, deleted = deleted.len(), "receipt voided");
        Ok(deleted)
    }

    /// # Errors
    ///
    /// Returns [`StoreError::InvalidReceipt`] if `code` is outside 1–4 or the
    /// receipt is a sale receipt, [`StoreError::NotFound`] if it does not
    /// exist.
    pub async fn set_return_payment_type(
        &self,
        tenant_id: &str,
        receipt_id: i64,
        code: i16,
    ) -> Result<Receipt, StoreError> {
        let payment_type = ReturnPaymentType::try_from(code).map_err(StoreError::InvalidReceipt)?;
        self.store
            .set_return_payment_type(tenant_id, receipt_id, payment_type)
            .await
    }

    async fn attempt_refund(
        &self,
        tenant: &Tenant,
        order: &Order,
        record: &RefundEventRecord,
        now: DateTime<Utc>,
    ) -> Result<ReceiptDecision, StoreError> {
        let event = &record.event;
        if let Some(existing) = self
            .store
            .find_receipt(&tenant.id, &order.id, ReceiptType::Refund, &event.event_key)
            .await?
        {
            self.store.mark_refund_issued(record.id, existing.id).await?;
            return Ok(ReceiptDecision::AlreadyIssued);
        }

        let Some(sale) = self
            .store
            .find_receipt(&tenant.id, &order.id, ReceiptType::Sale, SALE_EVENT_KEY)
            .await?
        else {
            return self.defer(record, "sale receipt not issued yet", now).await;
        };

        let refunded = refunded_amount(
            &self.store.list_receipts(&tenant.id, &order.id).await?,
            sale.id,
        );
        let remaining = sale_amount(&sale, order) - refunded;
        if event.amount.abs() > remaining {
            let reason = format!(
                "refund of {} exceeds the {} left on sale receipt {}",
                event.amount.abs(),
                remaining.max(Decimal::ZERO),
                sale.id
            );
            self.store
                .mark_refund_failed(record.id, record.attempts, &reason)
                .await?;
            warn!(
                tenant = %tenant.id,
                order_id = %order.id,
                event_key = %event.event_key,
                %reason,
                "refund receipt refused"
            );
            return Ok(ReceiptDecision::Failed(reason));
        }

        let receipt = NewReceipt::refund(order, sale.id, event);
        match self.store.insert_receipt(&tenant.id, &receipt).await? {
            InsertOutcome::Inserted(receipt) => {
                self.store.mark_refund_issued(record.id, receipt.id).await?;
                info!(
                    tenant = %tenant.id,
                    order_id = %order.id,
                    event_key = %event.event_key,
                    receipt_id = receipt.id,
                    "refund receipt issued"
                );
                self.publish_issued(&tenant.id, &receipt);
                Ok(ReceiptDecision::Issued(receipt))
            }
            InsertOutcome::Duplicate => {
                if let Some(existing) = self
                    .store
                    .find_receipt(&tenant.id, &order.id, ReceiptType::Refund, &event.event_key)
                    .await?
                {
                    self.store.mark_refund_issued(record.id, existing.id).await?;
                }
                Ok(ReceiptDecision::AlreadyIssued)
            }
        }
    }

    async fn defer(
        &self,
        record: &RefundEventRecord,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<ReceiptDecision, StoreError> {
        let attempts = record.attempts.saturating_add(1);
        if self.retry.is_exhausted(attempts) {
            let reason = format!("{reason} after {attempts} attempts");
            self.store
                .mark_refund_failed(record.id, attempts, &reason)
                .await?;
            warn!(
                order_id = %record.event.order_id,
                event_key = %record.event.event_key,
                %reason,
                "refund receipt permanently failed"
            );
            return Ok(ReceiptDecision::Failed(reason));
        }

        let next_eligible_at = self.retry.next_eligible_at(now, attempts);
        self.store
            .mark_refund_attempt_failed(record.id, attempts, reason, next_eligible_at)
            .await?;
        debug!(
            order_id = %record.event.order_id,
            event_key = %record.event.event_key,
            attempts,
            %next_eligible_at,
            "refund receipt deferred"
        );
        Ok(ReceiptDecision::Deferred {
            attempts,
            next_eligible_at,
        })
    }

    fn publish_issued(&self, tenant_id: &str, receipt: &Receipt) {
        self.events.publish(
            tenant_id,
            &PipelineEvent::ReceiptIssued {
                order_id: receipt.order_id.clone(),
                receipt_id: receipt.id,
                receipt_type: receipt.receipt_type,
            },
        );
    }
}

#[cfg(test)]
#[path = "receipts_test.rs"]
mod tests;
