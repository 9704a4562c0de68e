use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Base URL of the upstream commerce REST API.
    pub commerce_base_url: String,
    pub commerce_request_timeout_secs: u64,
    pub commerce_user_agent: String,
    pub commerce_max_retries: u32,
    pub commerce_retry_backoff_base_ms: u64,
    /// Orders requested per upstream page.
    pub sync_page_size: u32,
    /// Pages fetched per sync invocation before handing the cursor back.
    pub sync_max_pages: u32,
    /// Pause between orders inside a page, to stay under upstream rate limits.
    pub sync_inter_order_delay_ms: u64,
    /// Six-field cron expression for the scheduled incremental sync.
    pub sync_cron: String,
    /// How far before the newest synced order an incremental run starts.
    pub sync_lookback_hours: u32,
    pub refund_max_attempts: u32,
    pub refund_retry_backoff_secs: u64,
    pub webhook_log_retention_days: u32,
    /// Requests each tenant may make to the protected API per minute.
    pub api_rate_limit_per_minute: u32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("commerce_base_url", &self.commerce_base_url)
            .field(
                "commerce_request_timeout_secs",
                &self.commerce_request_timeout_secs,
            )
            .field("commerce_user_agent", &self.commerce_user_agent)
            .field("commerce_max_retries", &self.commerce_max_retries)
            .field(
                "commerce_retry_backoff_base_ms",
                &self.commerce_retry_backoff_base_ms,
            )
            .field("sync_page_size", &self.sync_page_size)
            .field("sync_max_pages", &self.sync_max_pages)
            .field(
                "sync_inter_order_delay_ms",
                &self.sync_inter_order_delay_ms,
            )
            .field("sync_cron", &self.sync_cron)
            .field("sync_lookback_hours", &self.sync_lookback_hours)
            .field("refund_max_attempts", &self.refund_max_attempts)
            .field("refund_retry_backoff_secs", &self.refund_retry_backoff_secs)
            .field(
                "webhook_log_retention_days",
                &self.webhook_log_retention_days,
            )
            .field("api_rate_limit_per_minute", &self.api_rate_limit_per_minute)
            .finish()
    }
}
