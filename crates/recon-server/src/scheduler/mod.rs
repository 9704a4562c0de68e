//! Background job scheduler.
//!
//! Registers the recurring incremental sync with its refund pass, and the
//! daily webhook log pruning.

use std::sync::Arc;

use chrono::{Duration, Utc};
use recon_core::AppConfig;
use recon_pipeline::{Pipeline, SyncRequest};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Runs daily at 03:30 UTC.
const PRUNE_CRON: &str = "0 30 3 * * *";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pipeline: Pipeline,
    config: Arc<AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_sync_job(&scheduler, pipeline.clone(), &config.sync_cron).await?;
    register_prune_job(&scheduler, pipeline, config.webhook_log_retention_days).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the incremental sync, on `RECON_SYNC_CRON`.
async fn register_sync_job(
    scheduler: &JobScheduler,
    pipeline: Pipeline,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let pipeline = Arc::new(pipeline);

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pipeline = Arc::clone(&pipeline);

        Box::pin(async move {
            tracing::info!("scheduler: starting incremental sync run");
            run_sync_job(&pipeline).await;
            tracing::info!("scheduler: incremental sync run complete");
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered sync job");
    Ok(())
}

/// Resume the sync of every active tenant, then retry its due refunds.
///
/// A tenant's failure is logged and never stops the others.
pub(crate) async fn run_sync_job(pipeline: &Pipeline) {
    let tenants = match pipeline.store.list_active_tenants().await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to list active tenants");
            return;
        }
    };

    if tenants.is_empty() {
        tracing::info!("scheduler: no active tenants; skipping");
        return;
    }

    for tenant in &tenants {
        match pipeline
            .sync
            .resume_sync(&tenant.id, SyncRequest::default())
            .await
        {
            Ok(summary) => tracing::info!(
                tenant = %tenant.id,
                pages = summary.pages,
                synced = summary.synced,
                failed = summary.failed,
                receipts_issued = summary.receipts_issued,
                "scheduler: tenant synced"
            ),
            Err(e) if e.is_unauthorized() => {
                tracing::warn!(tenant = %tenant.id, error = %e, "scheduler: tenant needs re-authorization");
            }
            Err(e) => {
                tracing::error!(tenant = %tenant.id, error = %e, "scheduler: tenant sync failed");
            }
        }

        if let Err(e) = pipeline
            .engine
            .process_pending_refunds(&tenant.id, Utc::now())
            .await
        {
            tracing::error!(tenant = %tenant.id, error = %e, "scheduler: refund pass failed");
        }
    }
}

/// Register the daily webhook log pruning.
async fn register_prune_job(
    scheduler: &JobScheduler,
    pipeline: Pipeline,
    retention_days: u32,
) -> Result<(), JobSchedulerError> {
    let pipeline = Arc::new(pipeline);

    let job = Job::new_async(PRUNE_CRON, move |_uuid, _lock| {
        let pipeline = Arc::clone(&pipeline);

        Box::pin(async move {
            let older_than = Utc::now() - Duration::days(i64::from(retention_days));
            match pipeline.store.prune_webhook_logs(older_than).await {
                Ok(removed) => {
                    tracing::info!(removed, %older_than, "scheduler: webhook logs pruned");
                }
                Err(e) => tracing::error!(error = %e, "scheduler: webhook log pruning failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recon_commerce::{CommerceError, OrderPage, OrderQuery, PaymentRecord};
    use recon_core::{RetryPolicy, SyncStatus, Tenant, TenantSettings};
    use recon_pipeline::{MemoryStore, OrderSource, SyncSettings};
    use serde_json::{json, Value};

    /// One page with a single paid order, then nothing. Records every query.
    #[derive(Default)]
    struct OnePage {
        queries: std::sync::Mutex<Vec<OrderQuery>>,
    }

    #[async_trait]
    impl OrderSource for OnePage {
        async fn query_orders(
            &self,
            _credentials: &str,
            query: &OrderQuery,
        ) -> Result<OrderPage, CommerceError> {
            self.queries.lock().unwrap().push(query.clone());
            if query.cursor.is_some() {
                return Ok(OrderPage::default());
            }
            Ok(OrderPage {
                orders: vec![json!({
                    "id": "ord-1",
                    "paymentStatus": "PAID",
                    "createdDate": "2025-06-01T10:00:00Z",
                    "priceSummary": { "total": { "amount": "12.00" } },
                    "payments": [{
                        "id": "pay-1",
                        "createdDate": "2025-06-01T10:00:00Z",
                        "regularPaymentDetails": {
                            "status": "APPROVED",
                            "paymentMethod": "CreditCard",
                            "providerTransactionId": "tx-1"
                        }
                    }]
                })],
                next_cursor: None,
            })
        }

        async fn fetch_order_details(
            &self,
            _credentials: &str,
            _order_id: &str,
        ) -> Result<Option<Value>, CommerceError> {
            Ok(None)
        }

        async fn fetch_payment_record_for_order(
            &self,
            _credentials: &str,
            _order_id: &str,
        ) -> Result<PaymentRecord, CommerceError> {
            Ok(PaymentRecord::default())
        }
    }

    fn tenant(id: &str, access_token: Option<&str>) -> Tenant {
        Tenant {
            id: id.to_string(),
            access_token: access_token.map(str::to_string),
            settings: TenantSettings {
                fiscal_store_id: Some("FS-1".to_string()),
                ..TenantSettings::default()
            },
            is_active: true,
        }
    }

    #[tokio::test]
    async fn sync_job_continues_past_failing_tenant() {
        let store = Arc::new(MemoryStore::new());
        store.put_tenant(tenant("site-broken", None));
        store.put_tenant(tenant("site-ok", Some("token")));
        let pipeline = Pipeline::new(
            store.clone(),
            Arc::new(OnePage::default()),
            SyncSettings::default(),
            RetryPolicy::default(),
        );

        run_sync_job(&pipeline).await;

        assert_eq!(store.order_count("site-ok"), 1);
        assert_eq!(store.receipts("site-ok").len(), 1);
        let state = pipeline
            .store
            .load_sync_state("site-ok")
            .await
            .expect("state")
            .expect("saved");
        assert_eq!(state.status, SyncStatus::Done);
        assert_eq!(store.order_count("site-broken"), 0);
    }

    #[tokio::test]
    async fn second_run_after_done_is_incremental() {
        let store = Arc::new(MemoryStore::new());
        store.put_tenant(tenant("site-ok", Some("token")));
        let source = Arc::new(OnePage::default());
        let pipeline = Pipeline::new(
            store.clone(),
            source.clone(),
            SyncSettings::default(),
            RetryPolicy::default(),
        );

        run_sync_job(&pipeline).await;
        run_sync_job(&pipeline).await;

        let queries = source.queries.lock().unwrap().clone();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].start_date, None);
        assert_eq!(queries[1].cursor, None);
        assert_eq!(
            queries[1].start_date,
            Some("2025-05-31T10:00:00Z".parse().expect("timestamp"))
        );
        assert_eq!(store.receipts("site-ok").len(), 1);
    }
}
