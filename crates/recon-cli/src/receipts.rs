use chrono::{Duration, Utc};
use recon_pipeline::{Pipeline, StoreError};

/// Retry due refund receipts for each tenant.
///
/// # Errors
///
/// Returns the first store error; tenants processed before it keep their
/// results.
pub(crate) async fn run_refund_pass(pipeline: &Pipeline, tenants: &[String]) -> anyhow::Result<()> {
    for tenant in tenants {
        let summary = pipeline
            .engine
            .process_pending_refunds(tenant, Utc::now())
            .await?;
        println!(
            "{tenant}: due={} issued={} already_issued={} deferred={} failed={}",
            summary.due, summary.issued, summary.already_issued, summary.deferred, summary.failed
        );
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the receipt does not exist or the delete fails.
pub(crate) async fn run_void_receipt(
    pipeline: &Pipeline,
    tenant: &str,
    receipt_id: i64,
) -> anyhow::Result<()> {
    match pipeline.engine.void_receipt(tenant, receipt_id).await {
        Ok(deleted) => {
            let ids: Vec<String> = deleted.iter().map(ToString::to_string).collect();
            println!("voided receipts: {}", ids.join(", "));
            Ok(())
        }
        Err(StoreError::NotFound) => {
            anyhow::bail!("receipt {receipt_id} not found for tenant '{tenant}'")
        }
        Err(e) => Err(e.into()),
    }
}

/// # Errors
///
/// Returns an error if the delete fails.
pub(crate) async fn run_prune_webhook_logs(pipeline: &Pipeline, days: u32) -> anyhow::Result<()> {
    let older_than = Utc::now() - Duration::days(i64::from(days));
    let removed = pipeline.store.prune_webhook_logs(older_than).await?;
    tracing::info!(removed, %older_than, "webhook logs pruned");
    println!("removed {removed} webhook log entries older than {days} days");
    Ok(())
}
