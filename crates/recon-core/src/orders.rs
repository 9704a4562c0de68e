use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key of the namespaced object the normalizer adds to the raw payload.
///
/// Holds `transactionRef`, `paymentSummary` and `deliveryMethod` when they
/// could be extracted. Everything else in the raw payload is upstream data.
pub const DERIVED_KEY: &str = "_derived";

/// Payment lifecycle of an order as reported by the commerce platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    PartiallyPaid,
    PartiallyRefunded,
    FullyRefunded,
    Canceled,
    Unknown,
}

impl PaymentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::PartiallyPaid => "PARTIALLY_PAID",
            PaymentStatus::PartiallyRefunded => "PARTIALLY_REFUNDED",
            PaymentStatus::FullyRefunded => "FULLY_REFUNDED",
            PaymentStatus::Canceled => "CANCELED",
            PaymentStatus::Unknown => "UNKNOWN",
        }
    }

    /// Lenient parse of the status strings seen across API versions.
    ///
    /// Unrecognised input maps to [`PaymentStatus::Unknown`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "PAID" | "FULLY_PAID" | "COMPLETED" | "APPROVED" => PaymentStatus::Paid,
            "PENDING" | "NOT_PAID" | "UNPAID" | "AWAITING_PAYMENT" | "PENDING_MERCHANT" => {
                PaymentStatus::Pending
            }
            "PARTIALLY_PAID" => PaymentStatus::PartiallyPaid,
            "PARTIALLY_REFUNDED" => PaymentStatus::PartiallyRefunded,
            "FULLY_REFUNDED" | "REFUNDED" => PaymentStatus::FullyRefunded,
            "CANCELED" | "CANCELLED" | "VOIDED" | "DECLINED" => PaymentStatus::Canceled,
            _ => PaymentStatus::Unknown,
        }
    }

    #[must_use]
    pub fn is_fully_paid(self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }

    #[must_use]
    pub fn is_refunded(self) -> bool {
        matches!(
            self,
            PaymentStatus::PartiallyRefunded | PaymentStatus::FullyRefunded
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which ingestion path produced the latest sighting of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestSource {
    Webhook,
    Backfill,
    Admin,
}

impl IngestSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            IngestSource::Webhook => "webhook",
            IngestSource::Backfill => "backfill",
            IngestSource::Admin => "admin",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "webhook" => Some(IngestSource::Webhook),
            "backfill" => Some(IngestSource::Backfill),
            "admin" => Some(IngestSource::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for IngestSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical order record, keyed by the upstream order id within a tenant.
///
/// Every timestamp comes from the upstream payload; none are defaulted to the
/// time of normalization. Money fields hold exactly what upstream reported,
/// so `total` may disagree with the breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub number: Option<String>,
    pub status: Option<String>,
    pub payment_status: PaymentStatus,
    pub currency: Option<String>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub archived: bool,
    pub source: IngestSource,
    /// Upstream payload plus the [`DERIVED_KEY`] namespace.
    pub raw: Value,
}

impl Order {
    /// The derived-fields namespace inside the raw payload, if present.
    #[must_use]
    pub fn derived(&self) -> Option<&Value> {
        self.raw.get(DERIVED_KEY)
    }

    #[must_use]
    pub fn transaction_ref(&self) -> Option<&str> {
        self.derived()
            .and_then(|d| d.get("transactionRef"))
            .and_then(Value::as_str)
    }

    #[must_use]
    pub fn delivery_method(&self) -> Option<&str> {
        self.derived()
            .and_then(|d| d.get("deliveryMethod"))
            .and_then(Value::as_str)
    }

    /// Payment method label (`card`, `offline`, `other`) from the derived summary.
    #[must_use]
    pub fn payment_method(&self) -> Option<&str> {
        self.derived()
            .and_then(|d| d.get("paymentSummary"))
            .and_then(|s| s.get("method"))
            .and_then(Value::as_str)
    }

    /// `true` when the order status mentions cancellation in any casing.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.to_ascii_lowercase().contains("cancel"))
    }

    /// Advisory check of `total = subtotal + tax + shipping - discount`.
    #[must_use]
    pub fn breakdown_matches_total(&self) -> bool {
        self.subtotal + self.tax + self.shipping - self.discount == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_with(raw: Value, status: Option<&str>) -> Order {
        Order {
            id: "ord-1".to_string(),
            number: Some("10001".to_string()),
            status: status.map(str::to_string),
            payment_status: PaymentStatus::Paid,
            currency: Some("BGN".to_string()),
            subtotal: Decimal::new(1000, 2),
            tax: Decimal::new(200, 2),
            shipping: Decimal::new(500, 2),
            discount: Decimal::ZERO,
            total: Decimal::new(1700, 2),
            customer_name: None,
            customer_email: None,
            created_at: None,
            updated_at: None,
            paid_at: None,
            archived: false,
            source: IngestSource::Backfill,
            raw,
        }
    }

    #[test]
    fn payment_status_parse_aliases() {
        assert_eq!(PaymentStatus::parse("paid"), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::parse("NOT_PAID"), PaymentStatus::Pending);
        assert_eq!(
            PaymentStatus::parse("partially-refunded"),
            PaymentStatus::PartiallyRefunded
        );
        assert_eq!(
            PaymentStatus::parse("Refunded"),
            PaymentStatus::FullyRefunded
        );
        assert_eq!(PaymentStatus::parse("cancelled"), PaymentStatus::Canceled);
        assert_eq!(PaymentStatus::parse("whatever"), PaymentStatus::Unknown);
    }

    #[test]
    fn payment_status_round_trips_through_as_str() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::PartiallyPaid,
            PaymentStatus::PartiallyRefunded,
            PaymentStatus::FullyRefunded,
            PaymentStatus::Canceled,
        ] {
            assert_eq!(PaymentStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn ingest_source_parse() {
        assert_eq!(IngestSource::parse("webhook"), Some(IngestSource::Webhook));
        assert_eq!(IngestSource::parse("cron"), None);
    }

    #[test]
    fn derived_accessors_read_namespace() {
        let order = order_with(
            json!({
                "id": "ord-1",
                DERIVED_KEY: {
                    "transactionRef": "tx-9",
                    "deliveryMethod": "Courier",
                    "paymentSummary": { "method": "card" }
                }
            }),
            Some("APPROVED"),
        );
        assert_eq!(order.transaction_ref(), Some("tx-9"));
        assert_eq!(order.delivery_method(), Some("Courier"));
        assert_eq!(order.payment_method(), Some("card"));
    }

    #[test]
    fn derived_accessors_absent_without_namespace() {
        let order = order_with(json!({ "id": "ord-1" }), None);
        assert!(order.transaction_ref().is_none());
        assert!(order.payment_method().is_none());
    }

    #[test]
    fn is_canceled_is_case_insensitive_substring() {
        assert!(order_with(json!({}), Some("CANCELED")).is_canceled());
        assert!(order_with(json!({}), Some("Cancelled by buyer")).is_canceled());
        assert!(!order_with(json!({}), Some("APPROVED")).is_canceled());
        assert!(!order_with(json!({}), None).is_canceled());
    }

    #[test]
    fn breakdown_matches_total_is_advisory() {
        let mut order = order_with(json!({}), None);
        assert!(order.breakdown_matches_total());
        order.total = Decimal::new(1, 0);
        assert!(!order.breakdown_matches_total());
    }
}
