use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::orders::Order;
use crate::refunds::RefundEvent;

/// Event key carried by every sale receipt. Refund receipts carry the key of
/// the refund event they were issued for.
pub const SALE_EVENT_KEY: &str = "sale";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptType {
    Sale,
    Refund,
}

impl ReceiptType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReceiptType::Sale => "sale",
            ReceiptType::Refund => "refund",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sale" => Some(ReceiptType::Sale),
            "refund" => Some(ReceiptType::Refund),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReceiptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the money went back to the customer on a refund (audit code 1–4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum ReturnPaymentType {
    Cash,
    Card,
    BankTransfer,
    Other,
}

impl ReturnPaymentType {
    #[must_use]
    pub fn code(self) -> i16 {
        match self {
            ReturnPaymentType::Cash => 1,
            ReturnPaymentType::Card => 2,
            ReturnPaymentType::BankTransfer => 3,
            ReturnPaymentType::Other => 4,
        }
    }

    #[must_use]
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(ReturnPaymentType::Cash),
            2 => Some(ReturnPaymentType::Card),
            3 => Some(ReturnPaymentType::BankTransfer),
            4 => Some(ReturnPaymentType::Other),
            _ => None,
        }
    }
}

impl TryFrom<i16> for ReturnPaymentType {
    type Error = String;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("return payment type {code} is not in 1..=4"))
    }
}

impl From<ReturnPaymentType> for i16 {
    fn from(value: ReturnPaymentType) -> Self {
        value.code()
    }
}

/// A persisted fiscal receipt. Only `issued` receipts exist; voiding deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i64,
    pub order_id: String,
    pub receipt_type: ReceiptType,
    pub event_key: String,
    pub issued_at: DateTime<Utc>,
    pub payload: Value,
    pub reference_receipt_id: Option<i64>,
    /// Negative for refunds, `None` for sales.
    pub refund_amount: Option<Decimal>,
    pub return_payment_type: Option<ReturnPaymentType>,
}

/// Insert model for [`Receipt`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewReceipt {
    pub order_id: String,
    pub receipt_type: ReceiptType,
    pub event_key: String,
    pub issued_at: DateTime<Utc>,
    pub payload: Value,
    pub reference_receipt_id: Option<i64>,
    pub refund_amount: Option<Decimal>,
}

impl NewReceipt {
    #[must_use]
    pub fn sale(order: &Order, issued_at: DateTime<Utc>) -> Self {
        Self {
            order_id: order.id.clone(),
            receipt_type: ReceiptType::Sale,
            event_key: SALE_EVENT_KEY.to_string(),
            issued_at,
            payload: snapshot(order),
            reference_receipt_id: None,
            refund_amount: None,
        }
    }

    /// Refund receipt for `event`, referencing the sale receipt `sale_receipt_id`.
    ///
    /// The amount is stored negated and the issue time is the refund's own
    /// timestamp.
    #[must_use]
    pub fn refund(order: &Order, sale_receipt_id: i64, event: &RefundEvent) -> Self {
        Self {
            order_id: order.id.clone(),
            receipt_type: ReceiptType::Refund,
            event_key: event.event_key.clone(),
            issued_at: event.refunded_at,
            payload: snapshot(order),
            reference_receipt_id: Some(sale_receipt_id),
            refund_amount: Some(-event.amount.abs()),
        }
    }
}

/// Copy of the order fields a receipt needs to be reproducible later.
fn snapshot(order: &Order) -> Value {
    json!({
        "orderId": order.id,
        "number": order.number,
        "status": order.status,
        "paymentStatus": order.payment_status,
        "currency": order.currency,
        "subtotal": order.subtotal,
        "tax": order.tax,
        "shipping": order.shipping,
        "discount": order.discount,
        "total": order.total,
        "customerName": order.customer_name,
        "customerEmail": order.customer_email,
        "createdAt": order.created_at,
        "paidAt": order.paid_at,
        "transactionRef": order.transaction_ref(),
        "paymentMethod": order.payment_method(),
        "deliveryMethod": order.delivery_method(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::{IngestSource, PaymentStatus, DERIVED_KEY};
    use chrono::TimeZone;

    fn order() -> Order {
        Order {
            id: "ord-7".to_string(),
            number: Some("10007".to_string()),
            status: Some("APPROVED".to_string()),
            payment_status: PaymentStatus::Paid,
            currency: Some("BGN".to_string()),
            subtotal: Decimal::new(2000, 2),
            tax: Decimal::ZERO,
            shipping: Decimal::ZERO,
            discount: Decimal::ZERO,
            total: Decimal::new(2000, 2),
            customer_name: Some("Ivan Petrov".to_string()),
            customer_email: None,
            created_at: None,
            updated_at: None,
            paid_at: None,
            archived: false,
            source: IngestSource::Webhook,
            raw: json!({ DERIVED_KEY: { "transactionRef": "tx-7" } }),
        }
    }

    #[test]
    fn return_payment_type_codes() {
        for code in 1..=4 {
            let parsed = ReturnPaymentType::from_code(code).expect("valid code");
            assert_eq!(parsed.code(), code);
        }
        assert!(ReturnPaymentType::from_code(0).is_none());
        assert!(ReturnPaymentType::from_code(5).is_none());
    }

    #[test]
    fn return_payment_type_serde_rejects_out_of_range() {
        assert!(serde_json::from_str::<ReturnPaymentType>("2").is_ok());
        assert!(serde_json::from_str::<ReturnPaymentType>("9").is_err());
    }

    #[test]
    fn sale_receipt_uses_sale_event_key_and_snapshot() {
        let issued_at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let receipt = NewReceipt::sale(&order(), issued_at);
        assert_eq!(receipt.receipt_type, ReceiptType::Sale);
        assert_eq!(receipt.event_key, SALE_EVENT_KEY);
        assert!(receipt.refund_amount.is_none());
        assert_eq!(receipt.payload["transactionRef"], "tx-7");
        assert_eq!(receipt.payload["orderId"], "ord-7");
    }

    #[test]
    fn refund_receipt_is_negative_and_uses_event_time() {
        let refunded_at = Utc.with_ymd_and_hms(2025, 3, 4, 8, 30, 0).unwrap();
        let event = RefundEvent {
            order_id: "ord-7".to_string(),
            event_key: "rf-1".to_string(),
            amount: Decimal::new(500, 2),
            refunded_at,
        };
        let receipt = NewReceipt::refund(&order(), 41, &event);
        assert_eq!(receipt.receipt_type, ReceiptType::Refund);
        assert_eq!(receipt.reference_receipt_id, Some(41));
        assert_eq!(receipt.refund_amount, Some(Decimal::new(-500, 2)));
        assert_eq!(receipt.issued_at, refunded_at);
        assert_eq!(receipt.event_key, "rf-1");
    }
}
