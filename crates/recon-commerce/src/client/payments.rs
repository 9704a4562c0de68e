//! Payment record lookup for a single order.

use reqwest::Method;
use serde_json::Value;

use crate::error::CommerceError;
use crate::extract::{
    extract_transaction_ref, is_accepted, payment_time, primary_payment, summarize,
};
use crate::types::PaymentRecord;

use super::CommerceClient;

impl CommerceClient {
    /// Fetches the payment transactions recorded for `order_id` and condenses
    /// them into a [`PaymentRecord`]. An order unknown to the payment service
    /// yields an empty record.
    ///
    /// # Errors
    ///
    /// Same as [`CommerceClient::query_orders`], except 404 which maps to an
    /// empty record.
    pub async fn fetch_payment_record(
        &self,
        credentials: &str,
        order_id: &str,
    ) -> Result<PaymentRecord, CommerceError> {
        let url = self.endpoint(&["ecom", "v1", "payments", "orders", order_id])?;
        match self
            .send_json(Method::GET, url, credentials, None, "order payment record")
            .await
        {
            Ok(body) => Ok(parse_payment_record(&body)),
            Err(CommerceError::NotFound { .. }) => Ok(PaymentRecord::default()),
            Err(e) => Err(e),
        }
    }
}

/// Condenses an `orderTransactions` body into a [`PaymentRecord`].
///
/// The paid time is only taken from an accepted payment.
#[must_use]
pub fn parse_payment_record(body: &Value) -> PaymentRecord {
    let root = body.get("orderTransactions").unwrap_or(body);
    let primary = primary_payment(root);
    PaymentRecord {
        transaction_ref: extract_transaction_ref(root),
        paid_at: primary
            .filter(|entry| is_accepted(entry))
            .and_then(payment_time),
        payment_summary: primary.map(|entry| summarize(entry, None)),
    }
}
