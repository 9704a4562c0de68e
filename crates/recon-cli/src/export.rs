use std::path::Path;

use chrono::{DateTime, Utc};
use recon_pipeline::{orders_for_export, Pipeline};

/// Writes the audit records as a JSON array to `output`, or stdout.
///
/// # Errors
///
/// Returns an error if the orders cannot be read or the file cannot be
/// written.
pub(crate) async fn run_export(
    pipeline: &Pipeline,
    tenant: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    if start >= end {
        tracing::warn!(%start, %end, "export range is empty");
    }
    pipeline
        .store
        .get_tenant(tenant)
        .await?
        .ok_or_else(|| anyhow::anyhow!("tenant '{tenant}' not found"))?;

    let records = orders_for_export(pipeline.store.as_ref(), tenant, start, end).await?;
    let rendered = serde_json::to_string_pretty(&records)?;

    match output {
        Some(path) => {
            tokio::fs::write(path, rendered).await?;
            println!("wrote {} records to {}", records.len(), path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}
