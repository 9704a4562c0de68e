//! Offline unit tests for recon-db pool configuration and row mapping.
//! These tests do not require a live database connection.

use chrono::{TimeZone, Utc};
use recon_core::{
    AppConfig, Environment, IngestSource, Order, PaymentStatus, Receipt, ReceiptType,
    RefundEventRecord, RefundEventStatus, ReturnPaymentType, SyncState, SyncStatus,
};
use recon_db::{DbError, OrderRow, PoolConfig, ReceiptRow, RefundEventRow, SyncStateRow};
use rust_decimal::Decimal;
use serde_json::json;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        commerce_base_url: "https://commerce.example.com".to_string(),
        commerce_request_timeout_secs: 30,
        commerce_user_agent: "ua".to_string(),
        commerce_max_retries: 3,
        commerce_retry_backoff_base_ms: 500,
        sync_page_size: 50,
        sync_max_pages: 10,
        sync_inter_order_delay_ms: 0,
        sync_cron: "0 */15 * * * *".to_string(),
        sync_lookback_hours: 24,
        refund_max_attempts: 5,
        refund_retry_backoff_secs: 300,
        webhook_log_retention_days: 30,
        api_rate_limit_per_minute: 120,
    }
}

fn order_row(source: &str) -> OrderRow {
    let seen = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
    OrderRow {
        tenant_id: "site-1".to_string(),
        order_id: "ord-1".to_string(),
        number: Some("1001".to_string()),
        status: Some("APPROVED".to_string()),
        payment_status: "PARTIALLY_REFUNDED".to_string(),
        currency: Some("EUR".to_string()),
        subtotal: Decimal::new(1000, 2),
        tax: Decimal::ZERO,
        shipping: Decimal::ZERO,
        discount: Decimal::ZERO,
        total: Decimal::new(1000, 2),
        customer_name: None,
        customer_email: None,
        created_at: Some(seen),
        updated_at: None,
        paid_at: None,
        archived: false,
        source: source.to_string(),
        raw: json!({ "id": "ord-1" }),
        first_seen_at: seen,
        last_seen_at: seen,
    }
}

fn receipt_row(receipt_type: &str, return_payment_type: Option<i16>) -> ReceiptRow {
    let issued_at = Utc.with_ymd_and_hms(2025, 4, 2, 0, 0, 0).unwrap();
    ReceiptRow {
        id: 11,
        tenant_id: "site-1".to_string(),
        order_id: "ord-1".to_string(),
        receipt_type: receipt_type.to_string(),
        event_key: "rf-1".to_string(),
        issued_at,
        payload: json!({}),
        reference_receipt_id: Some(10),
        refund_amount: Some(Decimal::new(-250, 2)),
        return_payment_type,
        created_at: issued_at,
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn order_row_maps_to_domain_order() {
    let order = Order::try_from(order_row("webhook")).expect("valid row");
    assert_eq!(order.id, "ord-1");
    assert_eq!(order.payment_status, PaymentStatus::PartiallyRefunded);
    assert_eq!(order.source, IngestSource::Webhook);
    assert_eq!(order.total, Decimal::new(1000, 2));
}

#[test]
fn order_row_with_unknown_source_is_rejected() {
    let err = Order::try_from(order_row("csv-import")).unwrap_err();
    assert!(matches!(err, DbError::InvalidRow { table: "orders", .. }));
}

#[test]
fn receipt_row_maps_return_payment_type() {
    let receipt = Receipt::try_from(receipt_row("refund", Some(2))).expect("valid row");
    assert_eq!(receipt.receipt_type, ReceiptType::Refund);
    assert_eq!(receipt.return_payment_type, Some(ReturnPaymentType::Card));
    assert_eq!(receipt.reference_receipt_id, Some(10));
}

#[test]
fn receipt_row_with_bad_values_is_rejected() {
    assert!(Receipt::try_from(receipt_row("invoice", None)).is_err());
    assert!(Receipt::try_from(receipt_row("refund", Some(7))).is_err());
}

#[test]
fn refund_event_row_maps_retry_bookkeeping() {
    let now = Utc.with_ymd_and_hms(2025, 4, 3, 0, 0, 0).unwrap();
    let row = RefundEventRow {
        id: 3,
        tenant_id: "site-1".to_string(),
        order_id: "ord-1".to_string(),
        event_key: "rf-1".to_string(),
        amount: Decimal::new(250, 2),
        refunded_at: now,
        status: "pending".to_string(),
        attempts: 2,
        last_error: Some("sale receipt missing".to_string()),
        next_eligible_at: now,
        failure_reason: None,
        receipt_id: None,
        created_at: now,
        updated_at: now,
    };
    let record = RefundEventRecord::try_from(row).expect("valid row");
    assert_eq!(record.status, RefundEventStatus::Pending);
    assert_eq!(record.attempts, 2);
    assert_eq!(record.event.event_key, "rf-1");
    assert_eq!(record.event.amount, Decimal::new(250, 2));
}

#[test]
fn sync_state_row_maps_cursor() {
    let row = SyncStateRow {
        tenant_id: "site-1".to_string(),
        page_cursor: Some("c-9".to_string()),
        status: "partial".to_string(),
        last_error: None,
        watermark: None,
        updated_at: Utc::now(),
    };
    let state = SyncState::try_from(row).expect("valid row");
    assert_eq!(state.status, SyncStatus::Partial);
    assert_eq!(state.cursor.as_deref(), Some("c-9"));
    assert!(state.updated_at.is_some());
}
