use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files; useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup, no `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("RECON_ENV", "development"))?;

    let bind_addr = parse_addr("RECON_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("RECON_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("RECON_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("RECON_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("RECON_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let commerce_base_url = or_default("RECON_COMMERCE_BASE_URL", "https://www.wixapis.com");
    let commerce_request_timeout_secs = parse_u64("RECON_COMMERCE_REQUEST_TIMEOUT_SECS", "30")?;
    let commerce_user_agent = or_default("RECON_COMMERCE_USER_AGENT", "recon/0.1 (order-sync)");
    let commerce_max_retries = parse_u32("RECON_COMMERCE_MAX_RETRIES", "3")?;
    let commerce_retry_backoff_base_ms = parse_u64("RECON_COMMERCE_RETRY_BACKOFF_BASE_MS", "500")?;

    let sync_page_size = parse_u32("RECON_SYNC_PAGE_SIZE", "50")?;
    if sync_page_size == 0 || sync_page_size > 100 {
        return Err(invalid(
            "RECON_SYNC_PAGE_SIZE",
            format!("{sync_page_size} is outside 1..=100"),
        ));
    }
    let sync_max_pages = parse_u32("RECON_SYNC_MAX_PAGES", "10")?;
    if sync_max_pages == 0 {
        return Err(invalid("RECON_SYNC_MAX_PAGES", "must be at least 1".into()));
    }
    let sync_inter_order_delay_ms = parse_u64("RECON_SYNC_INTER_ORDER_DELAY_MS", "100")?;
    let sync_cron = or_default("RECON_SYNC_CRON", "0 */15 * * * *");
    let sync_lookback_hours = parse_u32("RECON_SYNC_LOOKBACK_HOURS", "24")?;

    let refund_max_attempts = parse_u32("RECON_REFUND_MAX_ATTEMPTS", "5")?;
    if refund_max_attempts == 0 {
        return Err(invalid(
            "RECON_REFUND_MAX_ATTEMPTS",
            "must be at least 1".into(),
        ));
    }
    let refund_retry_backoff_secs = parse_u64("RECON_REFUND_RETRY_BACKOFF_SECS", "300")?;
    let webhook_log_retention_days = parse_u32("RECON_WEBHOOK_LOG_RETENTION_DAYS", "30")?;
    let api_rate_limit_per_minute = parse_u32("RECON_API_RATE_LIMIT_PER_MINUTE", "120")?;
    if api_rate_limit_per_minute == 0 {
        return Err(invalid(
            "RECON_API_RATE_LIMIT_PER_MINUTE",
            "must be at least 1".into(),
        ));
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        commerce_base_url,
        commerce_request_timeout_secs,
        commerce_user_agent,
        commerce_max_retries,
        commerce_retry_backoff_base_ms,
        sync_page_size,
        sync_max_pages,
        sync_inter_order_delay_ms,
        sync_cron,
        sync_lookback_hours,
        refund_max_attempts,
        refund_retry_backoff_secs,
        webhook_log_retention_days,
        api_rate_limit_per_minute,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "RECON_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
