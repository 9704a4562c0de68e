mod export;
mod receipts;
mod sync;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use recon_pipeline::Pipeline;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "recon-cli")]
#[command(about = "Order reconciliation and fiscal receipt operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Pull orders from upstream and issue due receipts
    Sync {
        /// Tenant to sync; omit together with --all-tenants
        #[arg(long, required_unless_present = "all_tenants")]
        tenant: Option<String>,
        /// Sync every active tenant
        #[arg(long, conflicts_with = "tenant")]
        all_tenants: bool,
        /// Only orders created at or after this RFC 3339 instant
        #[arg(long)]
        start_date: Option<DateTime<Utc>>,
        /// Orders per page
        #[arg(long)]
        limit: Option<u32>,
        /// Pages to fetch before stopping
        #[arg(long)]
        max_pages: Option<u32>,
        /// Start from this cursor instead of the beginning
        #[arg(long, conflicts_with = "resume")]
        cursor: Option<String>,
        /// Continue from the stored cursor of an unfinished run
        #[arg(long)]
        resume: bool,
        /// Ask upstream for paid orders only
        #[arg(long)]
        paid_only: bool,
    },
    /// Retry refund receipts that are due
    Refunds {
        #[arg(long, required_unless_present = "all_tenants")]
        tenant: Option<String>,
        #[arg(long, conflicts_with = "tenant")]
        all_tenants: bool,
    },
    /// Write the audit export for orders created in [start, end)
    Export {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        end: DateTime<Utc>,
        /// Output file; stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Delete a receipt, and for a sale receipt its refund receipts
    VoidReceipt {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        receipt_id: i64,
    },
    /// Delete webhook logs older than the retention window
    PruneWebhookLogs {
        /// Retention in days; defaults to RECON_WEBHOOK_LOG_RETENTION_DAYS
        #[arg(long)]
        days: Option<u32>,
    },
    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("no command given; run with --help");
        return Ok(());
    };

    let config = recon_core::load_app_config_from_env()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool = recon_db::connect_pool_from_config(&config).await?;

    if matches!(command, Commands::Migrate) {
        let applied = recon_db::run_migrations(&pool).await?;
        println!("migrations applied: {applied}");
        return Ok(());
    }

    let pipeline = Pipeline::from_config(pool, &config)?;

    match command {
        Commands::Sync {
            tenant,
            all_tenants: _,
            start_date,
            limit,
            max_pages,
            cursor,
            resume,
            paid_only,
        } => {
            let request = recon_pipeline::SyncRequest {
                start_date,
                limit,
                max_pages,
                cursor,
                paid_only,
            };
            let tenants = sync::resolve_tenants(&pipeline, tenant).await?;
            sync::run_sync_command(&pipeline, &tenants, &request, resume).await
        }
        Commands::Refunds {
            tenant,
            all_tenants: _,
        } => {
            let tenants = sync::resolve_tenants(&pipeline, tenant).await?;
            receipts::run_refund_pass(&pipeline, &tenants).await
        }
        Commands::Export {
            tenant,
            start,
            end,
            output,
        } => export::run_export(&pipeline, &tenant, start, end, output.as_deref()).await,
        Commands::VoidReceipt { tenant, receipt_id } => {
            receipts::run_void_receipt(&pipeline, &tenant, receipt_id).await
        }
        Commands::PruneWebhookLogs { days } => {
            let days = days.unwrap_or(config.webhook_log_retention_days);
            receipts::run_prune_webhook_logs(&pipeline, days).await
        }
        Commands::Migrate => Ok(()),
    }
}
