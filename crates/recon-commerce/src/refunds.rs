//! Derivation of refund events from order payloads.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use recon_core::{Order, PaymentStatus, RefundEvent};
use serde_json::Value;

use crate::extract::extract_money;
use crate::extract::paths::{array_at, first_str, first_timestamp};

/// Event key for a refund inferred from a fully refunded order that lists no
/// individual refunds.
pub const FULL_REFUND_KEY: &str = "full";

static REFUND_ARRAY_PATHS: [&str; 3] = [
    "refunds",
    "transactions.refunds",
    "orderTransactions.refunds",
];
static PAYMENT_ARRAY_PATHS: [&str; 2] = ["payments", "paymentInfo.payments"];
const REJECTED_REFUND_STATUSES: [&str; 5] =
    ["FAILED", "DECLINED", "CANCELED", "CANCELLED", "PENDING"];

/// Every refund recorded in `order.raw`, keyed by the upstream refund id.
///
/// Entries are read from the top-level refund arrays and from each payment's
/// own `refunds`. Failed or pending refunds and entries with no positive
/// amount are skipped. A fully refunded order without itemised refunds yields
/// a single [`FULL_REFUND_KEY`] event for the order total.
#[must_use]
pub fn extract_refund_events(order: &Order) -> Vec<RefundEvent> {
    let fallback_time = order.updated_at.or(order.paid_at).or(order.created_at);
    let mut seen = HashSet::new();
    let mut events = Vec::new();

    for entry in refund_entries(&order.raw) {
        if let Some(event) = parse_refund_entry(&order.id, entry, fallback_time) {
            if seen.insert(event.event_key.clone()) {
                events.push(event);
            }
        }
    }

    if events.is_empty() && order.payment_status == PaymentStatus::FullyRefunded {
        if let Some(refunded_at) = fallback_time {
            if order.total > rust_decimal::Decimal::ZERO {
                events.push(RefundEvent {
                    order_id: order.id.clone(),
                    event_key: FULL_REFUND_KEY.to_string(),
                    amount: order.total,
                    refunded_at,
                });
            }
        }
    }

    events
}

/// Reads one refund object. Returns `None` when the entry has no id, no
/// positive amount, a non-final status, or no usable timestamp.
#[must_use]
pub fn parse_refund_entry(
    order_id: &str,
    entry: &Value,
    fallback_time: Option<DateTime<Utc>>,
) -> Option<RefundEvent> {
    if let Some(status) = first_str(entry, &["status", "refundStatus", "details.status"]) {
        let status = status.to_ascii_uppercase();
        if REJECTED_REFUND_STATUSES.contains(&status.as_str()) {
            return None;
        }
    }

    let event_key = first_str(entry, &["id", "refundId", "transactionId"])?;
    let amount_node = entry
        .get("amount")
        .or_else(|| entry.get("total"))
        .or_else(|| entry.get("summary"))
        .unwrap_or(entry);
    let amount = extract_money(amount_node, None, None).amount?.abs();
    if amount.is_zero() {
        return None;
    }
    let refunded_at = first_timestamp(
        entry,
        &["createdDate", "dateCreated", "refundedAt", "refundDate"],
    )
    .or(fallback_time)?;

    Some(RefundEvent {
        order_id: order_id.to_string(),
        event_key,
        amount,
        refunded_at,
    })
}

fn refund_entries(raw: &Value) -> impl Iterator<Item = &Value> {
    let top_level = REFUND_ARRAY_PATHS
        .iter()
        .filter_map(|path| array_at(raw, path))
        .flatten();
    let per_payment = PAYMENT_ARRAY_PATHS
        .iter()
        .filter_map(|path| array_at(raw, path))
        .flatten()
        .filter_map(|payment| array_at(payment, "refunds"))
        .flatten();
    top_level.chain(per_payment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use recon_core::IngestSource;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn order(raw: Value, status: PaymentStatus) -> Order {
        Order {
            id: "ord-5".to_string(),
            number: None,
            status: None,
            payment_status: status,
            currency: Some("BGN".to_string()),
            subtotal: Decimal::ZERO,
            tax: Decimal::ZERO,
            shipping: Decimal::ZERO,
            discount: Decimal::ZERO,
            total: Decimal::new(3000, 2),
            customer_name: None,
            customer_email: None,
            created_at: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            updated_at: Some(Utc.with_ymd_and_hms(2025, 1, 5, 0, 0, 0).unwrap()),
            paid_at: None,
            archived: false,
            source: IngestSource::Backfill,
            raw,
        }
    }

    #[test]
    fn itemised_refunds_across_locations() {
        let raw = json!({
            "refunds": [{ "id": "r-1", "amount": { "amount": "10.00" }, "createdDate": "2025-01-03T00:00:00Z" }],
            "payments": [{ "id": "p-1", "refunds": [
                { "id": "r-2", "amount": "5,00" },
                { "id": "r-1", "amount": "10.00" }
            ] }]
        });
        let events = extract_refund_events(&order(raw, PaymentStatus::PartiallyRefunded));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_key, "r-1");
        assert_eq!(events[0].amount, Decimal::new(1000, 2));
        assert_eq!(
            events[0].refunded_at,
            Utc.with_ymd_and_hms(2025, 1, 3, 0, 0, 0).unwrap()
        );
        assert_eq!(events[1].event_key, "r-2");
        assert_eq!(
            events[1].refunded_at,
            Utc.with_ymd_and_hms(2025, 1, 5, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn failed_and_zero_refunds_are_skipped() {
        let raw = json!({ "refunds": [
            { "id": "r-1", "amount": "4", "status": "FAILED" },
            { "id": "r-2", "amount": "0" },
            { "amount": "3" }
        ] });
        assert!(extract_refund_events(&order(raw, PaymentStatus::PartiallyRefunded)).is_empty());
    }

    #[test]
    fn fully_refunded_without_items_yields_full_event() {
        let events = extract_refund_events(&order(json!({}), PaymentStatus::FullyRefunded));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_key, FULL_REFUND_KEY);
        assert_eq!(events[0].amount, Decimal::new(3000, 2));
    }

    #[test]
    fn paid_order_has_no_refunds() {
        assert!(extract_refund_events(&order(json!({}), PaymentStatus::Paid)).is_empty());
    }

    #[test]
    fn negative_amounts_are_normalised_positive() {
        let event = parse_refund_entry(
            "ord-1",
            &json!({ "refundId": "r-9", "amount": -12.5, "refundedAt": "2025-01-02T00:00:00Z" }),
            None,
        )
        .unwrap();
        assert_eq!(event.amount, Decimal::new(125, 1));
    }

    #[test]
    fn entry_without_time_or_fallback_is_dropped() {
        assert!(parse_refund_entry("ord-1", &json!({ "id": "r-1", "amount": 1 }), None).is_none());
    }
}
