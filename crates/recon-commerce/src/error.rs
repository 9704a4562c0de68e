use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommerceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// 401/403. The tenant must re-authorize; retrying will not help.
    #[error("upstream rejected credentials (HTTP {status}) for {url}")]
    Unauthorized { status: u16, url: String },

    #[error("rate limited by upstream (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid commerce base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}

impl CommerceError {
    /// `true` for conditions worth retrying after a back-off delay: network
    /// failures, 429 and 5xx responses.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            CommerceError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            CommerceError::RateLimited { .. } => true,
            CommerceError::UnexpectedStatus { status, .. } => *status >= 500,
            CommerceError::Deserialize { .. }
            | CommerceError::Unauthorized { .. }
            | CommerceError::NotFound { .. }
            | CommerceError::InvalidBaseUrl { .. } => false,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CommerceError::Unauthorized { .. })
    }
}
