//! One-stop wiring of the store, source and pipeline services.

use std::sync::Arc;

use recon_commerce::{CommerceClient, CommerceError};
use recon_core::{AppConfig, RetryPolicy};
use sqlx::PgPool;

use crate::events::Broadcaster;
use crate::receipts::ReceiptEngine;
use crate::source::OrderSource;
use crate::store::{PgTenantStore, TenantStore};
use crate::sync::{SyncOrchestrator, SyncSettings};
use crate::webhook::WebhookIngestor;

/// The pipeline services for one process, all sharing a store, an order
/// source and a broadcaster. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    pub store: Arc<dyn TenantStore>,
    pub events: Broadcaster,
    pub engine: ReceiptEngine,
    pub sync: SyncOrchestrator,
    pub webhooks: WebhookIngestor,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn TenantStore>,
        source: Arc<dyn OrderSource>,
        settings: SyncSettings,
        retry: RetryPolicy,
    ) -> Self {
        let events = Broadcaster::new();
        let engine = ReceiptEngine::new(Arc::clone(&store), events.clone()).with_retry_policy(retry);
        let sync = SyncOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&source),
            engine.clone(),
            events.clone(),
            settings,
        );
        let webhooks =
            WebhookIngestor::new(Arc::clone(&store), source, engine.clone(), events.clone());
        Self {
            store,
            events,
            engine,
            sync,
            webhooks,
        }
    }

    /// Postgres-backed pipeline talking to the configured commerce API.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError`] if the commerce client cannot be built.
    pub fn from_config(pool: PgPool, config: &AppConfig) -> Result<Self, CommerceError> {
        let client = CommerceClient::from_config(config)?;
        Ok(Self::new(
            Arc::new(PgTenantStore::new(pool)),
            Arc::new(client),
            SyncSettings::from_app_config(config),
            retry_policy(config),
        ))
    }
}

#[must_use]
pub fn retry_policy(config: &AppConfig) -> RetryPolicy {
    RetryPolicy {
        max_attempts: config.refund_max_attempts.max(1),
        backoff_base_secs: config.refund_retry_backoff_secs,
    }
}
