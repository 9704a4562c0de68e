//! Paginated order sync for one tenant.
//!
//! A run walks the upstream order search page by page, normalizes and stores
//! every order, then hands it to the [`ReceiptEngine`]. The cursor is
//! checkpointed in the tenant's sync state after every page so an
//! interrupted or page-limited run can be resumed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use recon_commerce::normalize::needs_payment_record;
use recon_commerce::pagination::is_stuck_cursor;
use recon_commerce::{enrich_with_payment_record, normalize_order, OrderQuery};
use recon_core::{AppConfig, IngestSource, PaymentStatus, SyncState, SyncStatus, Tenant};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::events::{Broadcaster, PipelineEvent};
use crate::receipts::ReceiptEngine;
use crate::source::OrderSource;
use crate::store::TenantStore;

/// Per-run parameters. Unset fields fall back to [`SyncSettings`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// Only orders created at or after this instant. Ignored by upstream once
    /// a cursor is in play.
    pub start_date: Option<DateTime<Utc>>,
    /// Orders per page.
    pub limit: Option<u32>,
    pub max_pages: Option<u32>,
    /// Resume position; `None` starts from the beginning.
    pub cursor: Option<String>,
    /// Ask upstream for `PAID` orders only.
    #[serde(default)]
    pub paid_only: bool,
}

/// Defaults and pacing shared by every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub page_size: u32,
    pub max_pages: u32,
    /// Pause between two orders of a page.
    pub inter_order_delay: Duration,
    /// Overlap kept before the watermark when an incremental run starts.
    pub lookback: chrono::Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_pages: 20,
            inter_order_delay: Duration::ZERO,
            lookback: chrono::Duration::hours(24),
        }
    }
}

impl SyncSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            page_size: config.sync_page_size.max(1),
            max_pages: config.sync_max_pages.max(1),
            inter_order_delay: Duration::from_millis(config.sync_inter_order_delay_ms),
            lookback: chrono::Duration::hours(i64::from(config.sync_lookback_hours)),
        }
    }
}

/// One order that could not be stored or evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    pub order_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    /// Raw orders received from upstream.
    pub total: usize,
    pub pages: u32,
    /// Where the next run should continue; `None` when pagination finished.
    pub cursor: Option<String>,
    pub receipts_issued: usize,
    pub receipts_skipped: usize,
    /// Orders stored and evaluated.
    pub synced: usize,
    /// Orders completed from the upstream payment record.
    pub enriched: usize,
    /// Payloads that were not ingestible.
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
}

impl SyncSummary {
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        if self.cursor.is_some() {
            SyncStatus::Partial
        } else {
            SyncStatus::Done
        }
    }

    fn record_failure(&mut self, order_id: &str, reason: &dyn std::fmt::Display) {
        self.failed += 1;
        self.failures.push(ItemFailure {
            order_id: order_id.to_string(),
            reason: reason.to_string(),
        });
    }
}

#[derive(Clone)]
pub struct SyncOrchestrator {
    store: Arc<dyn TenantStore>,
    source: Arc<dyn OrderSource>,
    engine: ReceiptEngine,
    events: Broadcaster,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn TenantStore>,
        source: Arc<dyn OrderSource>,
        engine: ReceiptEngine,
        events: Broadcaster,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            source,
            engine,
            events,
            settings,
        }
    }

    /// Like [`SyncOrchestrator::run_sync`], but without an explicit cursor
    /// the run continues from the stored one when the last run stopped
    /// early (`partial`) or failed (`error`). After a finished walk
    /// (`done`) and without an explicit start date, the run only asks for
    /// orders created since the stored watermark minus the lookback.
    ///
    /// # Errors
    ///
    /// See [`SyncOrchestrator::run_sync`].
    pub async fn resume_sync(
        &self,
        tenant_id: &str,
        mut request: SyncRequest,
    ) -> Result<SyncSummary, SyncError> {
        if request.cursor.is_none() {
            if let Some(state) = self.store.load_sync_state(tenant_id).await? {
                if state.status.is_resumable() && state.cursor.is_some() {
                    debug!(tenant = %tenant_id, cursor = ?state.cursor, "resuming from stored cursor");
                    request.cursor = state.cursor;
                } else if request.start_date.is_none() {
                    if let Some(start) = state.incremental_start(self.settings.lookback) {
                        debug!(tenant = %tenant_id, %start, "incremental sync from watermark");
                        request.start_date = Some(start);
                    }
                }
            }
        }
        self.run_sync(tenant_id, request).await
    }

    /// Syncs up to `max_pages` pages of the tenant's orders.
    ///
    /// Per-order problems are counted in the summary and never abort the
    /// run.
    ///
    /// # Errors
    ///
    /// - [`SyncError::TenantNotFound`] / [`SyncError::MissingCredentials`]
    ///   before anything is fetched.
    /// - [`SyncError::Unauthorized`] or [`SyncError::Fetch`] when a page
    ///   cannot be fetched; the sync state is left at `error` with the last
    ///   good cursor.
    /// - [`SyncError::Store`] when the sync state cannot be written.
    pub async fn run_sync(
        &self,
        tenant_id: &str,
        request: SyncRequest,
    ) -> Result<SyncSummary, SyncError> {
        let tenant = self
            .store
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| SyncError::TenantNotFound(tenant_id.to_string()))?;
        let credentials = tenant
            .access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SyncError::MissingCredentials(tenant_id.to_string()))?;

        let limit = request.limit.unwrap_or(self.settings.page_size).max(1);
        let max_pages = request.max_pages.unwrap_or(self.settings.max_pages).max(1);
        let payment_status = request.paid_only.then_some(PaymentStatus::Paid);
        let now = Utc::now();

        let mut summary = SyncSummary::default();
        let mut cursor = request.cursor;
        let mut watermark = self
            .store
            .load_sync_state(tenant_id)
            .await?
            .and_then(|s| s.watermark);
        self.store
            .save_sync_state(
                tenant_id,
                &SyncState::new(cursor.clone(), SyncStatus::Running).with_watermark(watermark),
            )
            .await?;

        info!(tenant = %tenant_id, cursor = ?cursor, max_pages, "sync started");

        while summary.pages < max_pages {
            let query = OrderQuery {
                start_date: request.start_date,
                cursor: cursor.clone(),
                limit,
                payment_status,
            };
            let page = match self.source.query_orders(&credentials, &query).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(tenant = %tenant_id, page = summary.pages + 1, cursor = ?cursor, error = %e, "order page fetch failed");
                    self.store
                        .save_sync_state(
                            tenant_id,
                            &SyncState::failed(cursor.clone(), e.to_string())
                                .with_watermark(watermark),
                        )
                        .await?;
                    self.publish_finished(tenant_id, SyncStatus::Error, &summary);
                    return Err(if e.is_unauthorized() {
                        SyncError::Unauthorized {
                            tenant: tenant_id.to_string(),
                            source: e,
                        }
                    } else {
                        SyncError::Fetch(e)
                    });
                }
            };
            summary.pages += 1;
            summary.total += page.orders.len();

            for (index, raw) in page.orders.iter().enumerate() {
                if index > 0 && !self.settings.inter_order_delay.is_zero() {
                    tokio::time::sleep(self.settings.inter_order_delay).await;
                }
                let stored = self
                    .process_order(&tenant, &credentials, raw, now, &mut summary)
                    .await;
                watermark = watermark.max(stored);
            }

            let next = page.next_cursor;
            if is_stuck_cursor(cursor.as_deref(), next.as_deref()) {
                warn!(
                    tenant = %tenant_id,
                    cursor = ?cursor,
                    "upstream returned the cursor it was given; treating as end of pagination"
                );
                cursor = None;
                break;
            }
            cursor = next;
            if cursor.is_none() {
                break;
            }
            self.store
                .save_sync_state(
                    tenant_id,
                    &SyncState::new(cursor.clone(), SyncStatus::Running).with_watermark(watermark),
                )
                .await?;
        }

        summary.cursor = cursor;
        let status = summary.status();
        self.store
            .save_sync_state(
                tenant_id,
                &SyncState::new(summary.cursor.clone(), status).with_watermark(watermark),
            )
            .await?;
        self.publish_finished(tenant_id, status, &summary);

        info!(
            tenant = %tenant_id,
            status = status.as_str(),
            pages = summary.pages,
            total = summary.total,
            synced = summary.synced,
            enriched = summary.enriched,
            skipped = summary.skipped,
            failed = summary.failed,
            receipts_issued = summary.receipts_issued,
            "sync finished"
        );
        Ok(summary)
    }

    /// Returns the order's `created_at` once the order is stored.
    async fn process_order(
        &self,
        tenant: &Tenant,
        credentials: &str,
        raw: &Value,
        now: DateTime<Utc>,
        summary: &mut SyncSummary,
    ) -> Option<DateTime<Utc>> {
        let mut order = match normalize_order(raw, IngestSource::Backfill) {
            Ok(order) => order,
            Err(e) => {
                debug!(tenant = %tenant.id, reason = e.reason, "skipping order payload");
                summary.skipped += 1;
                return None;
            }
        };

        if needs_payment_record(&order) {
            match self
                .source
                .fetch_payment_record_for_order(credentials, &order.id)
                .await
            {
                Ok(record) => {
                    if enrich_with_payment_record(&mut order, &record) {
                        summary.enriched += 1;
                    }
                }
                Err(e) => {
                    warn!(tenant = %tenant.id, order_id = %order.id, error = %e, "payment record enrichment failed");
                }
            }
        }

        if let Err(e) = self.store.upsert_order(&tenant.id, &order).await {
            warn!(tenant = %tenant.id, order_id = %order.id, error = %e, "order upsert failed");
            summary.record_failure(&order.id, &e);
            return None;
        }
        self.events.publish(
            &tenant.id,
            &PipelineEvent::OrderSynced {
                order_id: order.id.clone(),
                source: order.source,
            },
        );

        match self.engine.evaluate_order(tenant, &order, now).await {
            Ok(evaluation) => {
                summary.synced += 1;
                summary.receipts_issued += evaluation.issued();
                summary.receipts_skipped += evaluation.skipped();
            }
            Err(e) => {
                warn!(tenant = %tenant.id, order_id = %order.id, error = %e, "receipt evaluation failed");
                summary.record_failure(&order.id, &e);
            }
        }
        order.created_at
    }

    fn publish_finished(&self, tenant_id: &str, status: SyncStatus, summary: &SyncSummary) {
        self.events.publish(
            tenant_id,
            &PipelineEvent::SyncFinished {
                status,
                total: summary.total,
                pages: summary.pages,
                cursor: summary.cursor.clone(),
            },
        );
    }
}
