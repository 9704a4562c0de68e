pub mod app_config;
pub mod config;
pub mod export;
pub mod orders;
pub mod receipts;
pub mod refunds;
pub mod sync_state;
pub mod tenants;
pub mod webhook_logs;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use export::AuditRecord;
pub use orders::{IngestSource, Order, PaymentStatus, DERIVED_KEY};
pub use receipts::{NewReceipt, Receipt, ReceiptType, ReturnPaymentType, SALE_EVENT_KEY};
pub use refunds::{RefundEvent, RefundEventRecord, RefundEventStatus, RetryPolicy};
pub use sync_state::{SyncState, SyncStatus};
pub use tenants::{Tenant, TenantSettings};
pub use webhook_logs::{payload_preview, NewWebhookLog, WebhookLog, WebhookLogStatus};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
