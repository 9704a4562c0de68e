//! Order reconciliation and fiscal receipt pipeline.
//!
//! Wires the upstream [`OrderSource`] and a [`TenantStore`] together:
//! [`SyncOrchestrator`] pulls order pages, [`WebhookIngestor`] handles pushed
//! events, and both hand normalized orders to the [`ReceiptEngine`].

pub mod error;
pub mod events;
pub mod export;
pub mod pipeline;
pub mod receipts;
pub mod source;
pub mod store;
pub mod sync;
pub mod webhook;

pub use error::{IngestError, StoreError, SyncError};
pub use events::{Broadcaster, PipelineEvent, Subscription};
pub use export::orders_for_export;
pub use pipeline::Pipeline;
pub use receipts::{
    refund_eligibility, sale_eligibility, Ineligible, OrderEvaluation, ReceiptDecision,
    ReceiptEngine, RefundPassSummary,
};
pub use source::OrderSource;
pub use store::{InsertOutcome, MemoryStore, PgTenantStore, TenantStore};
pub use sync::{ItemFailure, SyncOrchestrator, SyncRequest, SyncSettings, SyncSummary};
pub use webhook::{locate_order, IngestOutcome, WebhookEvent, WebhookIngestor};
