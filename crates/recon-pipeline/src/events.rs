//! In-process pub/sub for pipeline progress, scoped per tenant.
//!
//! A [`Broadcaster`] is cheap to clone and injected into every component
//! that publishes. Subscribers receive events on an unbounded channel; a
//! subscriber whose receiver has been dropped is pruned on the next publish
//! to its tenant.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use recon_core::{IngestSource, ReceiptType, SyncStatus, WebhookLogStatus};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PipelineEvent {
    #[serde(rename_all = "camelCase")]
    OrderSynced {
        order_id: String,
        source: IngestSource,
    },
    #[serde(rename_all = "camelCase")]
    ReceiptIssued {
        order_id: String,
        receipt_id: i64,
        receipt_type: ReceiptType,
    },
    #[serde(rename_all = "camelCase")]
    WebhookProcessed {
        event_type: String,
        order_id: Option<String>,
        status: WebhookLogStatus,
    },
    #[serde(rename_all = "camelCase")]
    SyncFinished {
        status: SyncStatus,
        total: usize,
        pages: u32,
        cursor: Option<String>,
    },
}

impl PipelineEvent {
    /// Short name used as the SSE event field.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::OrderSynced { .. } => "orderSynced",
            PipelineEvent::ReceiptIssued { .. } => "receiptIssued",
            PipelineEvent::WebhookProcessed { .. } => "webhookProcessed",
            PipelineEvent::SyncFinished { .. } => "syncFinished",
        }
    }
}

/// Receiving end of one subscription.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub tenant_id: String,
    pub receiver: mpsc::UnboundedReceiver<PipelineEvent>,
}

type Subscribers = HashMap<String, Vec<(u64, mpsc::UnboundedSender<PipelineEvent>)>>;

#[derive(Debug, Clone, Default)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: AtomicU64,
    subscribers: Mutex<Subscribers>,
}

impl Broadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, tenant_id: &str) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock()
            .entry(tenant_id.to_string())
            .or_default()
            .push((id, sender));
        Subscription {
            id,
            tenant_id: tenant_id.to_string(),
            receiver,
        }
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self.lock();
        let mut removed = false;
        subscribers.retain(|_, senders| {
            let before = senders.len();
            senders.retain(|(sub_id, _)| *sub_id != id);
            removed |= senders.len() != before;
            !senders.is_empty()
        });
        removed
    }

    /// Delivers `event` to every live subscriber of `tenant_id` and returns
    /// how many received it.
    pub fn publish(&self, tenant_id: &str, event: &PipelineEvent) -> usize {
        let mut subscribers = self.lock();
        let Some(senders) = subscribers.get_mut(tenant_id) else {
            return 0;
        };
        senders.retain(|(_, sender)| sender.send(event.clone()).is_ok());
        let delivered = senders.len();
        if senders.is_empty() {
            subscribers.remove(tenant_id);
        }
        delivered
    }

    #[must_use]
    pub fn subscriber_count(&self, tenant_id: &str) -> usize {
        self.lock().get(tenant_id).map_or(0, Vec::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
