//! Normalization from raw upstream order payloads to [`recon_core::Order`].
//!
//! Field derivation is delegated to [`crate::extract`]; this module assembles
//! the canonical record and maintains the `_derived` namespace inside the
//! stored payload.

use recon_core::{IngestSource, Order, DERIVED_KEY};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::extract::{
    extract_breakdown, extract_created_at, extract_currency, extract_customer,
    extract_delivery_method, extract_order_id, extract_order_number, extract_paid_at,
    extract_payment_status, extract_payment_summary, extract_status, extract_transaction_ref,
    extract_updated_at, is_archived, PaymentSummary,
};
use crate::types::PaymentRecord;

/// A payload that cannot become an [`Order`]. Callers count and skip it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("order payload is not ingestible: {reason}")]
pub struct NotIngestible {
    pub reason: &'static str,
}

/// Builds the canonical order for `raw`.
///
/// Deterministic: timestamps come only from the payload, and any existing
/// `_derived` object is discarded and rebuilt, so normalizing a stored payload
/// again yields the same record.
///
/// # Errors
///
/// Returns [`NotIngestible`] when the payload is not a JSON object or carries
/// no order id.
pub fn normalize_order(raw: &Value, source: IngestSource) -> Result<Order, NotIngestible> {
    let Value::Object(fields) = raw else {
        return Err(NotIngestible {
            reason: "payload is not an object",
        });
    };
    let mut upstream = fields.clone();
    upstream.remove(DERIVED_KEY);
    let upstream = Value::Object(upstream);

    let id = extract_order_id(&upstream).ok_or(NotIngestible {
        reason: "missing order id",
    })?;

    let (customer_name, customer_email) = extract_customer(&upstream);
    let total = extract_breakdown(&upstream, "total");
    let currency = extract_currency(&upstream).or_else(|| total.currency.clone());
    let amount = |line: &str| {
        extract_breakdown(&upstream, line)
            .amount
            .unwrap_or(Decimal::ZERO)
    };

    let mut derived = Map::new();
    if let Some(reference) = extract_transaction_ref(&upstream) {
        derived.insert("transactionRef".into(), Value::String(reference));
    }
    derived.insert(
        "paymentSummary".into(),
        summary_value(&extract_payment_summary(&upstream)),
    );
    if let Some(method) = extract_delivery_method(&upstream) {
        derived.insert("deliveryMethod".into(), Value::String(method));
    }

    let order = Order {
        number: extract_order_number(&upstream, None),
        status: extract_status(&upstream),
        payment_status: extract_payment_status(&upstream),
        currency,
        subtotal: amount("subtotal"),
        tax: amount("tax"),
        shipping: amount("shipping"),
        discount: amount("discount"),
        total: total.amount.unwrap_or(Decimal::ZERO),
        customer_name,
        customer_email,
        created_at: extract_created_at(&upstream, None),
        updated_at: extract_updated_at(&upstream),
        paid_at: extract_paid_at(&upstream),
        archived: is_archived(&upstream),
        source,
        raw: with_derived(upstream, derived),
        id,
    };
    Ok(order)
}

/// Fills a missing transaction reference, paid time and payment summary from
/// the upstream payment record. Values already on the order are kept.
///
/// Returns `true` when anything changed.
pub fn enrich_with_payment_record(order: &mut Order, record: &PaymentRecord) -> bool {
    let mut changed = false;

    if order.paid_at.is_none() {
        if let Some(paid_at) = record.paid_at {
            order.paid_at = Some(paid_at);
            changed = true;
        }
    }

    let has_ref = order.transaction_ref().is_some();
    let has_summary = order
        .derived()
        .and_then(|d| d.get("paymentSummary"))
        .and_then(|s| s.get("rule"))
        .and_then(Value::as_str)
        .is_some_and(|rule| rule != "noMatch");

    let Some(derived) = derived_mut(&mut order.raw) else {
        return changed;
    };
    if !has_ref {
        if let Some(reference) = &record.transaction_ref {
            derived.insert("transactionRef".into(), Value::String(reference.clone()));
            changed = true;
        }
    }
    if !has_summary {
        if let Some(summary) = record.payment_summary.as_ref().filter(|s| s.is_classified()) {
            derived.insert("paymentSummary".into(), summary_value(summary));
            changed = true;
        }
    }
    changed
}

/// `true` when a paid order still lacks data the payment record could supply.
#[must_use]
pub fn needs_payment_record(order: &Order) -> bool {
    order.payment_status.is_fully_paid()
        && (order.transaction_ref().is_none() || order.paid_at.is_none())
}

fn summary_value(summary: &PaymentSummary) -> Value {
    serde_json::to_value(summary).unwrap_or(Value::Null)
}

fn with_derived(upstream: Value, derived: Map<String, Value>) -> Value {
    match upstream {
        Value::Object(mut fields) => {
            fields.insert(DERIVED_KEY.to_string(), Value::Object(derived));
            Value::Object(fields)
        }
        other => other,
    }
}

fn derived_mut(raw: &mut Value) -> Option<&mut Map<String, Value>> {
    let fields = raw.as_object_mut()?;
    let derived = fields
        .entry(DERIVED_KEY)
        .or_insert_with(|| Value::Object(Map::new()));
    derived.as_object_mut()
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
