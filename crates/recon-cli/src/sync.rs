//! Sync command handler.
//!
//! One tenant's failure is reported and the run moves on, so a bulk sync
//! over every tenant is never cut short by a single bad store.

use recon_pipeline::{Pipeline, SyncRequest, SyncSummary};

/// Tenant ids to work on: the named one, or every active tenant.
///
/// # Errors
///
/// Returns an error if the named tenant does not exist or the tenant list
/// cannot be read.
pub(crate) async fn resolve_tenants(
    pipeline: &Pipeline,
    tenant: Option<String>,
) -> anyhow::Result<Vec<String>> {
    if let Some(id) = tenant {
        pipeline
            .store
            .get_tenant(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("tenant '{id}' not found"))?;
        return Ok(vec![id]);
    }
    let tenants = pipeline.store.list_active_tenants().await?;
    Ok(tenants.into_iter().map(|t| t.id).collect())
}

/// Run one sync per tenant and print its summary.
///
/// # Errors
///
/// Returns an error when every tenant failed.
pub(crate) async fn run_sync_command(
    pipeline: &Pipeline,
    tenants: &[String],
    request: &SyncRequest,
    resume: bool,
) -> anyhow::Result<()> {
    if tenants.is_empty() {
        println!("no active tenants; nothing to sync");
        return Ok(());
    }

    let mut failed = 0usize;
    for tenant in tenants {
        let result = if resume {
            pipeline.sync.resume_sync(tenant, request.clone()).await
        } else {
            pipeline.sync.run_sync(tenant, request.clone()).await
        };
        match result {
            Ok(summary) => println!("{}", format_summary(tenant, &summary)),
            Err(e) => {
                failed += 1;
                if e.is_unauthorized() {
                    tracing::warn!(tenant = %tenant, error = %e, "tenant must re-authorize");
                } else {
                    tracing::error!(tenant = %tenant, error = %e, "sync failed");
                }
                println!("{tenant}: failed: {e}");
            }
        }
    }

    if failed == tenants.len() {
        anyhow::bail!("sync failed for every tenant");
    }
    Ok(())
}

fn format_summary(tenant: &str, summary: &SyncSummary) -> String {
    let mut line = format!(
        "{tenant}: {status} pages={pages} total={total} synced={synced} enriched={enriched} \
         skipped={skipped} failed={failed} receipts_issued={issued} receipts_skipped={not_issued}",
        status = summary.status().as_str(),
        pages = summary.pages,
        total = summary.total,
        synced = summary.synced,
        enriched = summary.enriched,
        skipped = summary.skipped,
        failed = summary.failed,
        issued = summary.receipts_issued,
        not_issued = summary.receipts_skipped,
    );
    if let Some(cursor) = &summary.cursor {
        line.push_str(&format!(" cursor={cursor}"));
    }
    for failure in &summary.failures {
        line.push_str(&format!("\n  {}: {}", failure.order_id, failure.reason));
    }
    line
}
