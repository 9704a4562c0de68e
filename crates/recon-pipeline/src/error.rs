use recon_commerce::CommerceError;
use recon_db::DbError;
use thiserror::Error;

/// Failure of a [`crate::TenantStore`] operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// The operation does not apply to this receipt.
    #[error("invalid receipt operation: {0}")]
    InvalidReceipt(String),

    /// A write would break a storage constraint other than receipt
    /// uniqueness (for example a refund receipt without its sale receipt).
    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error(transparent)]
    Db(DbError),
}

impl From<DbError> for StoreError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::NotFound => StoreError::NotFound,
            DbError::InvalidReceipt(reason) => StoreError::InvalidReceipt(reason),
            other => StoreError::Db(other),
        }
    }
}

/// Failure that aborts a sync run. Per-order problems never surface here;
/// they are counted in [`crate::SyncSummary`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("tenant {0} not found")]
    TenantNotFound(String),

    #[error("tenant {0} has no upstream access token")]
    MissingCredentials(String),

    /// Upstream rejected the tenant's credentials. Retrying will not help
    /// until the token is refreshed.
    #[error("upstream rejected credentials for tenant {tenant}")]
    Unauthorized {
        tenant: String,
        #[source]
        source: CommerceError,
    },

    #[error("failed to fetch orders page: {0}")]
    Fetch(#[source] CommerceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SyncError::Unauthorized { .. })
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("tenant {0} not found")]
    TenantNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
