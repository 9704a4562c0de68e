//! Webhook intake: one upstream order event in, one stored order out.
//!
//! Every delivery ends with exactly one webhook log entry. Payloads that
//! cannot become an order are logged with status `error` and acknowledged,
//! so upstream does not redeliver them.

use std::sync::Arc;

use chrono::Utc;
use recon_commerce::extract::paths::at;
use recon_commerce::extract::{extract_order_id, extract_order_number, has_totals};
use recon_commerce::normalize::needs_payment_record;
use recon_commerce::{
    enrich_with_payment_record, extract_refund_events, normalize_order, parse_refund_entry,
    FULL_REFUND_KEY,
};
use recon_core::{
    payload_preview, IngestSource, NewWebhookLog, Order, RefundEvent, Tenant, WebhookLogStatus,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{IngestError, StoreError};
use crate::events::{Broadcaster, PipelineEvent};
use crate::receipts::{OrderEvaluation, ReceiptEngine};
use crate::source::OrderSource;
use crate::store::TenantStore;

const ORDER_PATHS: [&str; 4] = ["order", "data.order", "entity", "data"];
const REFUND_PATHS: [&str; 3] = ["refund", "data.refund", "entity.refund"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub event_type: String,
    pub payload: Value,
}

impl WebhookEvent {
    /// Refund notifications may carry the refund itself next to the order.
    #[must_use]
    pub fn is_refund(&self) -> bool {
        self.event_type.to_ascii_lowercase().contains("refund")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Ingested {
        order_id: String,
        /// `true` when the order was not stored before.
        inserted: bool,
        evaluation: OrderEvaluation,
    },
    /// Logged and acknowledged without touching any order.
    Skipped { reason: String },
}

/// The object inside a webhook body that describes the order.
///
/// Some events wrap it as `order` or `data.order`, some send it as `entity`
/// (occasionally JSON-encoded as a string), some as `data` or the body
/// itself.
#[must_use]
pub fn locate_order(payload: &Value) -> Value {
    for path in ORDER_PATHS {
        match at(payload, path) {
            Some(node @ Value::Object(_)) => return node.clone(),
            Some(Value::String(encoded)) => {
                if let Ok(decoded @ Value::Object(_)) = serde_json::from_str::<Value>(encoded) {
                    return decoded;
                }
            }
            _ => {}
        }
    }
    payload.clone()
}

#[derive(Clone)]
pub struct WebhookIngestor {
    store: Arc<dyn TenantStore>,
    source: Arc<dyn OrderSource>,
    engine: ReceiptEngine,
    events: Broadcaster,
}

impl WebhookIngestor {
    pub fn new(
        store: Arc<dyn TenantStore>,
        source: Arc<dyn OrderSource>,
        engine: ReceiptEngine,
        events: Broadcaster,
    ) -> Self {
        Self {
            store,
            source,
            engine,
            events,
        }
    }

    /// # Errors
    ///
    /// Returns [`IngestError::TenantNotFound`] for an unknown tenant, or
    /// [`IngestError::Store`] when the order, its receipts or the log entry
    /// cannot be written. A delivery that fails this way is safe to retry.
    pub async fn ingest(
        &self,
        tenant_id: &str,
        event: &WebhookEvent,
    ) -> Result<IngestOutcome, IngestError> {
        let tenant = self
            .store
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| IngestError::TenantNotFound(tenant_id.to_string()))?;
        let credentials = tenant
            .access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty());
        let preview = payload_preview(&event.payload);

        let mut raw = locate_order(&event.payload);
        if !has_totals(&raw) {
            if let (Some(order_id), Some(credentials)) = (extract_order_id(&raw), credentials) {
                match self.source.fetch_order_details(credentials, &order_id).await {
                    Ok(Some(full)) => raw = full,
                    Ok(None) => debug!(tenant = %tenant_id, %order_id, "order details not found upstream; using webhook delta"),
                    Err(e) => warn!(tenant = %tenant_id, %order_id, error = %e, "order details fetch failed; using webhook delta"),
                }
            }
        }

        let mut order = match normalize_order(&raw, IngestSource::Webhook) {
            Ok(order) => order,
            Err(e) => {
                let reason = e.to_string();
                self.append_log(
                    tenant_id,
                    NewWebhookLog {
                        event_type: event.event_type.clone(),
                        order_id: extract_order_id(&raw),
                        order_number: extract_order_number(&raw, None),
                        status: WebhookLogStatus::Error,
                        error_message: Some(reason.clone()),
                        payload_preview: preview,
                    },
                )
                .await?;
                self.publish(tenant_id, event, None, WebhookLogStatus::Error);
                return Ok(IngestOutcome::Skipped { reason });
            }
        };

        if let Some(credentials) = credentials.filter(|_| needs_payment_record(&order)) {
            match self
                .source
                .fetch_payment_record_for_order(credentials, &order.id)
                .await
            {
                Ok(record) => {
                    enrich_with_payment_record(&mut order, &record);
                }
                Err(e) => {
                    warn!(tenant = %tenant_id, order_id = %order.id, error = %e, "payment record enrichment failed");
                }
            }
        }

        match self.store_and_evaluate(&tenant, &order, event).await {
            Ok((inserted, evaluation)) => {
                self.append_log(tenant_id, log_for(event, &order, None, preview))
                    .await?;
                self.publish(tenant_id, event, Some(&order.id), WebhookLogStatus::Ok);
                info!(
                    tenant = %tenant_id,
                    order_id = %order.id,
                    event_type = %event.event_type,
                    inserted,
                    receipts_issued = evaluation.issued(),
                    "webhook ingested"
                );
                Ok(IngestOutcome::Ingested {
                    order_id: order.id,
                    inserted,
                    evaluation,
                })
            }
            Err(e) => {
                let log = log_for(event, &order, Some(e.to_string()), preview);
                if let Err(log_error) = self.append_log(tenant_id, log).await {
                    warn!(tenant = %tenant_id, error = %log_error, "failed to record webhook error");
                }
                self.publish(tenant_id, event, Some(&order.id), WebhookLogStatus::Error);
                Err(e.into())
            }
        }
    }

    async fn store_and_evaluate(
        &self,
        tenant: &Tenant,
        order: &Order,
        event: &WebhookEvent,
    ) -> Result<(bool, OrderEvaluation), StoreError> {
        let now = Utc::now();
        let inserted = self.store.upsert_order(&tenant.id, order).await?;
        self.events.publish(
            &tenant.id,
            &PipelineEvent::OrderSynced {
                order_id: order.id.clone(),
                source: order.source,
            },
        );

        let sale = self.engine.evaluate_sale(tenant, order, now).await?;
        let refund_events = webhook_refund_events(order, event);
        let refunds = self
            .engine
            .evaluate_refunds(tenant, order, &refund_events, now)
            .await?;
        Ok((inserted, OrderEvaluation { sale, refunds }))
    }

    async fn append_log(&self, tenant_id: &str, log: NewWebhookLog) -> Result<(), StoreError> {
        self.store.append_webhook_log(tenant_id, &log).await
    }

    fn publish(
        &self,
        tenant_id: &str,
        event: &WebhookEvent,
        order_id: Option<&str>,
        status: WebhookLogStatus,
    ) {
        self.events.publish(
            tenant_id,
            &PipelineEvent::WebhookProcessed {
                event_type: event.event_type.clone(),
                order_id: order_id.map(str::to_string),
                status,
            },
        );
    }
}

/// Refund events in the order payload, plus the refund carried by a refund
/// notification when the order does not list it yet. An explicit refund
/// replaces the inferred whole-order refund.
fn webhook_refund_events(order: &Order, event: &WebhookEvent) -> Vec<RefundEvent> {
    let mut events = extract_refund_events(order);
    if !event.is_refund() {
        return events;
    }
    let fallback_time = order.updated_at.or(order.paid_at).or(order.created_at);
    let explicit = REFUND_PATHS
        .iter()
        .filter_map(|path| at(&event.payload, path))
        .find_map(|entry| parse_refund_entry(&order.id, entry, fallback_time));
    if let Some(refund) = explicit {
        events.retain(|e| e.event_key != FULL_REFUND_KEY);
        if !events.iter().any(|e| e.event_key == refund.event_key) {
            events.push(refund);
        }
    }
    events
}

fn log_for(
    event: &WebhookEvent,
    order: &Order,
    error_message: Option<String>,
    payload_preview: String,
) -> NewWebhookLog {
    NewWebhookLog {
        event_type: event.event_type.clone(),
        order_id: Some(order.id.clone()),
        order_number: order.number.clone(),
        status: if error_message.is_some() {
            WebhookLogStatus::Error
        } else {
            WebhookLogStatus::Ok
        },
        error_message,
        payload_preview,
    }
}
