use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::paths::{array_at, first_bool, first_some, first_str};

/// Payment statuses that mean money actually moved.
const ACCEPTED_STATUSES: [&str; 7] = [
    "APPROVED",
    "COMPLETED",
    "SUCCEEDED",
    "PAID",
    "CAPTURED",
    "REFUNDED",
    "PARTIALLY_REFUNDED",
];

const PAYMENT_ARRAY_PATHS: [&str; 3] = ["payments", "paymentInfo.payments", "orderTransactions.payments"];

const OFFLINE_TOKENS: [&str; 7] = [
    "offline",
    "cash",
    "cod",
    "on delivery",
    "on_delivery",
    "manual",
    "наложен",
];
const CARD_TOKENS: [&str; 7] = [
    "card", "credit", "debit", "visa", "mastercard", "maestro", "amex",
];

static LAST4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\D*$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Offline,
    Other,
}

impl PaymentMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Offline => "offline",
            PaymentMethod::Other => "other",
        }
    }
}

/// Which classification rule produced a [`PaymentSummary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SummaryRule {
    OfflineFlag,
    OfflineToken,
    CardToken,
    CardDetails,
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub method: PaymentMethod,
    pub method_name: Option<String>,
    pub card_brand: Option<String>,
    pub card_last4: Option<String>,
    pub rule: SummaryRule,
}

impl PaymentSummary {
    #[must_use]
    pub fn is_classified(&self) -> bool {
        self.rule != SummaryRule::NoMatch
    }
}

// ---------------------------------------------------------------------------
// Transaction reference
// ---------------------------------------------------------------------------

/// Processor reference for the charge behind `order`, if any.
///
/// Order-level payment details win. Otherwise the first accepted entry of a
/// payments array is used, then the first entry of any status.
#[must_use]
pub fn extract_transaction_ref(order: &Value) -> Option<String> {
    first_some(
        order,
        &[
            provider_transaction_id,
            gateway_transaction_id,
            payment_details_id,
            accepted_payment_ref,
            first_payment_ref,
        ],
    )
}

fn provider_transaction_id(order: &Value) -> Option<String> {
    first_str(
        order,
        &[
            "paymentDetails.providerTransactionId",
            "regularPaymentDetails.providerTransactionId",
            "billingInfo.providerTransactionId",
        ],
    )
}

fn gateway_transaction_id(order: &Value) -> Option<String> {
    first_str(
        order,
        &[
            "paymentDetails.gatewayTransactionId",
            "regularPaymentDetails.gatewayTransactionId",
            "billingInfo.gatewayTransactionId",
        ],
    )
}

fn payment_details_id(order: &Value) -> Option<String> {
    first_str(
        order,
        &["paymentDetails.paymentId", "billingInfo.paymentId", "paymentId"],
    )
}

fn accepted_payment_ref(order: &Value) -> Option<String> {
    payment_entries(order)
        .filter(|entry| is_accepted(entry))
        .find_map(entry_ref)
}

fn first_payment_ref(order: &Value) -> Option<String> {
    payment_entries(order).next().and_then(entry_ref)
}

/// Reference carried by one payments-array entry.
#[must_use]
pub fn entry_ref(entry: &Value) -> Option<String> {
    first_str(
        entry,
        &[
            "regularPaymentDetails.providerTransactionId",
            "regularPaymentDetails.gatewayTransactionId",
            "providerTransactionId",
            "gatewayTransactionId",
            "transactionId",
            "paymentId",
            "id",
        ],
    )
}

fn payment_entries(order: &Value) -> impl Iterator<Item = &Value> {
    PAYMENT_ARRAY_PATHS
        .iter()
        .find_map(|path| array_at(order, path))
        .into_iter()
        .flatten()
}

/// `true` when the entry's status is one of the accepted ones.
#[must_use]
pub fn is_accepted(entry: &Value) -> bool {
    first_str(
        entry,
        &["status", "regularPaymentDetails.status", "paymentStatus"],
    )
    .is_some_and(|status| {
        let status = status.to_ascii_uppercase();
        ACCEPTED_STATUSES.contains(&status.as_str())
    })
}

/// The payment entry that best represents how the order was paid.
#[must_use]
pub fn primary_payment(order: &Value) -> Option<&Value> {
    payment_entries(order)
        .find(|entry| is_accepted(entry))
        .or_else(|| payment_entries(order).next())
}

// ---------------------------------------------------------------------------
// Payment summary
// ---------------------------------------------------------------------------

/// Classifies how `order` was paid. Never fails: unknown shapes produce an
/// `Other` summary with rule [`SummaryRule::NoMatch`].
#[must_use]
pub fn extract_payment_summary(order: &Value) -> PaymentSummary {
    match primary_payment(order) {
        Some(entry) => summarize(entry, Some(order)),
        None => summarize(order, None),
    }
}

/// Classifies a single payment entry, consulting `order` for fields the
/// entry lacks.
#[must_use]
pub fn summarize(entry: &Value, order: Option<&Value>) -> PaymentSummary {
    let lookup_str = |paths: &[&str]| {
        first_str(entry, paths).or_else(|| order.and_then(|o| first_str(o, paths)))
    };

    let offline_flag = first_bool(
        entry,
        &[
            "regularPaymentDetails.offlinePayment",
            "offlinePayment",
            "offline",
        ],
    )
    .or_else(|| order.and_then(|o| first_bool(o, &["paymentInfo.offline", "offlinePayment"])));
    let method_name = lookup_str(&[
        "regularPaymentDetails.paymentMethod",
        "paymentMethod.name",
        "paymentMethod",
        "method",
        "billingInfo.paymentMethod",
        "paymentInfo.method",
    ]);
    let card_brand = lookup_str(&[
        "regularPaymentDetails.creditCardDetails.brand",
        "creditCardDetails.brand",
        "cardDetails.brand",
        "card.brand",
        "cardBrand",
    ]);
    let card_last4 = lookup_str(&[
        "regularPaymentDetails.creditCardDetails.lastFourDigits",
        "creditCardDetails.lastFourDigits",
        "cardDetails.lastFourDigits",
        "card.last4",
        "cardLast4",
        "maskedCardNumber",
    ])
    .and_then(|raw| last_four(&raw));

    let (method, rule) = classify(
        offline_flag,
        method_name.as_deref(),
        card_brand.is_some() || card_last4.is_some(),
    );

    PaymentSummary {
        method,
        method_name,
        card_brand,
        card_last4,
        rule,
    }
}

fn classify(
    offline_flag: Option<bool>,
    method_name: Option<&str>,
    has_card_details: bool,
) -> (PaymentMethod, SummaryRule) {
    if offline_flag == Some(true) {
        return (PaymentMethod::Offline, SummaryRule::OfflineFlag);
    }
    if let Some(name) = method_name {
        let lowered = name.to_lowercase();
        if OFFLINE_TOKENS.iter().any(|t| lowered.contains(t)) {
            return (PaymentMethod::Offline, SummaryRule::OfflineToken);
        }
        if CARD_TOKENS.iter().any(|t| lowered.contains(t)) {
            return (PaymentMethod::Card, SummaryRule::CardToken);
        }
    }
    if has_card_details {
        return (PaymentMethod::Card, SummaryRule::CardDetails);
    }
    (PaymentMethod::Other, SummaryRule::NoMatch)
}

fn last_four(raw: &str) -> Option<String> {
    LAST4_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_transaction_id_wins() {
        let order = json!({
            "paymentDetails": {
                "providerTransactionId": "prov-1",
                "gatewayTransactionId": "gw-1"
            },
            "payments": [{ "id": "pay-1", "status": "APPROVED" }]
        });
        assert_eq!(extract_transaction_ref(&order).as_deref(), Some("prov-1"));
    }

    #[test]
    fn gateway_then_payment_id() {
        let order = json!({ "paymentDetails": { "gatewayTransactionId": "gw-1", "paymentId": "p-1" } });
        assert_eq!(extract_transaction_ref(&order).as_deref(), Some("gw-1"));
        let order = json!({ "paymentDetails": { "paymentId": "p-1" } });
        assert_eq!(extract_transaction_ref(&order).as_deref(), Some("p-1"));
    }

    #[test]
    fn accepted_payment_preferred_over_first_entry() {
        let order = json!({
            "payments": [
                { "id": "declined-1", "status": "DECLINED" },
                { "id": "ok-2", "regularPaymentDetails": { "status": "approved", "providerTransactionId": "prov-2" } }
            ]
        });
        assert_eq!(extract_transaction_ref(&order).as_deref(), Some("prov-2"));
    }

    #[test]
    fn falls_back_to_first_entry() {
        let order = json!({ "payments": [{ "id": "pending-1", "status": "PENDING" }] });
        assert_eq!(extract_transaction_ref(&order).as_deref(), Some("pending-1"));
    }

    #[test]
    fn missing_everything_yields_none() {
        assert!(extract_transaction_ref(&json!({})).is_none());
        assert!(extract_transaction_ref(&json!({ "payments": "broken" })).is_none());
        assert!(extract_transaction_ref(&json!(null)).is_none());
    }

    #[test]
    fn offline_flag_beats_card_name() {
        let order = json!({
            "payments": [{
                "status": "APPROVED",
                "regularPaymentDetails": { "offlinePayment": true, "paymentMethod": "CreditCard" }
            }]
        });
        let summary = extract_payment_summary(&order);
        assert_eq!(summary.method, PaymentMethod::Offline);
        assert_eq!(summary.rule, SummaryRule::OfflineFlag);
    }

    #[test]
    fn cod_token_is_offline() {
        let summary = extract_payment_summary(&json!({ "paymentMethod": "Cash on Delivery" }));
        assert_eq!(summary.method, PaymentMethod::Offline);
        assert_eq!(summary.rule, SummaryRule::OfflineToken);

        let summary = extract_payment_summary(&json!({ "paymentMethod": "Наложен платеж" }));
        assert_eq!(summary.method, PaymentMethod::Offline);
    }

    #[test]
    fn card_token_with_brand_and_last4() {
        let order = json!({
            "payments": [{
                "status": "COMPLETED",
                "regularPaymentDetails": {
                    "paymentMethod": "CreditCard",
                    "creditCardDetails": { "brand": "VISA", "lastFourDigits": "4242" }
                }
            }]
        });
        let summary = extract_payment_summary(&order);
        assert_eq!(summary.method, PaymentMethod::Card);
        assert_eq!(summary.rule, SummaryRule::CardToken);
        assert_eq!(summary.card_brand.as_deref(), Some("VISA"));
        assert_eq!(summary.card_last4.as_deref(), Some("4242"));
    }

    #[test]
    fn masked_number_yields_last4() {
        let summary = extract_payment_summary(&json!({ "maskedCardNumber": "**** **** **** 1881" }));
        assert_eq!(summary.method, PaymentMethod::Card);
        assert_eq!(summary.rule, SummaryRule::CardDetails);
        assert_eq!(summary.card_last4.as_deref(), Some("1881"));
    }

    #[test]
    fn unknown_shape_is_neutral() {
        let summary = extract_payment_summary(&json!({ "paymentMethod": "Voucher" }));
        assert_eq!(summary.method, PaymentMethod::Other);
        assert_eq!(summary.rule, SummaryRule::NoMatch);
        assert_eq!(summary.method_name.as_deref(), Some("Voucher"));
        assert!(!summary.is_classified());
    }
}
