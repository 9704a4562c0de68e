//! Pure extractors over heterogeneous upstream order payloads.
//!
//! Every function here is total: missing or malformed structure at any depth
//! yields `None` (or the supplied default), never a panic or an error. No
//! function performs I/O.

mod money;
mod payment;
pub mod paths;

use chrono::{DateTime, Utc};
use recon_core::PaymentStatus;
use serde_json::Value;

pub use money::{extract_money, parse_amount, Money};
pub use payment::{
    entry_ref, extract_payment_summary, extract_transaction_ref, is_accepted, primary_payment,
    summarize, PaymentMethod, PaymentSummary, SummaryRule,
};

use paths::{first_bool, first_some, first_str, first_timestamp, str_at};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[must_use]
pub fn extract_order_id(order: &Value) -> Option<String> {
    first_str(order, &["id", "_id", "orderId", "order_id"])
}

/// Human-readable order number, or `default` when none is present.
#[must_use]
pub fn extract_order_number(order: &Value, default: Option<&str>) -> Option<String> {
    first_str(
        order,
        &["number", "orderNumber", "order_number", "displayNumber"],
    )
    .or_else(|| default.map(str::to_string))
}

#[must_use]
pub fn extract_status(order: &Value) -> Option<String> {
    first_str(order, &["status", "orderStatus", "state"])
}

#[must_use]
pub fn extract_payment_status(order: &Value) -> PaymentStatus {
    first_str(
        order,
        &[
            "paymentStatus",
            "payment_status",
            "paymentInfo.status",
            "billingInfo.paymentStatus",
        ],
    )
    .map_or(PaymentStatus::Unknown, |s| PaymentStatus::parse(&s))
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Creation time from the payload, or `default`.
#[must_use]
pub fn extract_created_at(order: &Value, default: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    first_timestamp(
        order,
        &[
            "createdDate",
            "dateCreated",
            "createdAt",
            "created_at",
            "created",
        ],
    )
    .or(default)
}

#[must_use]
pub fn extract_updated_at(order: &Value) -> Option<DateTime<Utc>> {
    first_timestamp(
        order,
        &["updatedDate", "dateUpdated", "updatedAt", "updated_at"],
    )
}

/// When the order was paid. Falls back to the accepted payment's own
/// timestamp; never to the time of extraction.
#[must_use]
pub fn extract_paid_at(order: &Value) -> Option<DateTime<Utc>> {
    first_some(order, &[explicit_paid_at, accepted_payment_time])
}

fn explicit_paid_at(order: &Value) -> Option<DateTime<Utc>> {
    first_timestamp(
        order,
        &[
            "paidDate",
            "datePaid",
            "paidAt",
            "paid_at",
            "billingInfo.paidDate",
            "paymentInfo.paidDate",
        ],
    )
}

fn accepted_payment_time(order: &Value) -> Option<DateTime<Utc>> {
    primary_payment(order)
        .filter(|entry| is_accepted(entry))
        .and_then(payment_time)
}

/// Timestamp carried by a single payment entry.
#[must_use]
pub fn payment_time(entry: &Value) -> Option<DateTime<Utc>> {
    first_timestamp(
        entry,
        &[
            "regularPaymentDetails.paidDate",
            "paidDate",
            "createdDate",
            "dateCreated",
        ],
    )
}

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

#[must_use]
pub fn extract_currency(order: &Value) -> Option<String> {
    first_str(
        order,
        &[
            "currency",
            "currencyCode",
            "priceSummary.total.currency",
            "totals.currency",
        ],
    )
}

/// Money for one breakdown line (`"total"`, `"subtotal"`, `"tax"`,
/// `"shipping"`, `"discount"`), probing `priceSummary`, `totals`, then the
/// order root.
#[must_use]
pub fn extract_breakdown(order: &Value, line: &str) -> Money {
    let currency = extract_currency(order);
    let node = [
        format!("priceSummary.{line}"),
        format!("totals.{line}"),
        line.to_string(),
    ]
    .iter()
    .find_map(|path| paths::at(order, path))
    .cloned()
    .unwrap_or(Value::Null);
    extract_money(&node, None, currency.as_deref())
}

/// `true` when the payload carries any breakdown at all.
#[must_use]
pub fn has_totals(order: &Value) -> bool {
    ["priceSummary", "totals", "total", "totalPrice"]
        .iter()
        .any(|path| paths::at(order, path).is_some())
}

// ---------------------------------------------------------------------------
// Customer
// ---------------------------------------------------------------------------

/// `(name, email)` of the buyer.
#[must_use]
pub fn extract_customer(order: &Value) -> (Option<String>, Option<String>) {
    let name = first_some(order, &[full_name, split_name]);
    let email = first_str(
        order,
        &[
            "buyerInfo.email",
            "customer.email",
            "billingInfo.contactDetails.email",
            "billingInfo.email",
            "email",
        ],
    );
    (name, email)
}

fn full_name(order: &Value) -> Option<String> {
    first_str(
        order,
        &[
            "buyerInfo.fullName",
            "customer.name",
            "billingInfo.fullName",
            "customerName",
        ],
    )
}

fn split_name(order: &Value) -> Option<String> {
    ["buyerInfo", "billingInfo.contactDetails", "billingInfo.address.fullName", "customer"]
        .iter()
        .find_map(|prefix| {
            let first = str_at(order, &format!("{prefix}.firstName"));
            let last = str_at(order, &format!("{prefix}.lastName"));
            match (first, last) {
                (Some(f), Some(l)) => Some(format!("{f} {l}")),
                (Some(only), None) | (None, Some(only)) => Some(only),
                (None, None) => None,
            }
        })
}

// ---------------------------------------------------------------------------
// Delivery & archive state
// ---------------------------------------------------------------------------

#[must_use]
pub fn extract_delivery_method(order: &Value) -> Option<String> {
    first_str(
        order,
        &[
            "shippingInfo.title",
            "shippingInfo.logistics.deliveryTitle",
            "shippingInfo.deliveryOption",
            "shippingInfo.shippingMethod",
            "deliveryMethod",
            "shippingMethod.name",
            "shippingMethod",
            "shipping.method",
        ],
    )
}

/// Explicit archive flag, else any status-like field mentioning "archived".
#[must_use]
pub fn is_archived(order: &Value) -> bool {
    if let Some(flag) = first_bool(order, &["archived", "isArchived", "archive"]) {
        return flag;
    }
    ["status", "orderStatus", "archiveStatus", "fulfillmentStatus"]
        .iter()
        .filter_map(|path| str_at(order, path))
        .any(|status| status.to_ascii_lowercase().contains("archived"))
}

#[cfg(test)]
#[path = "../extract_test.rs"]
mod tests;
