//! The upstream order source as seen by the pipeline.

use async_trait::async_trait;
use recon_commerce::{CommerceClient, CommerceError, OrderPage, OrderQuery, PaymentRecord};
use serde_json::Value;

/// Read access to a tenant's orders on the commerce platform.
///
/// `credentials` is the tenant's opaque access token.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn query_orders(
        &self,
        credentials: &str,
        query: &OrderQuery,
    ) -> Result<OrderPage, CommerceError>;

    /// `Ok(None)` when the order does not exist upstream.
    async fn fetch_order_details(
        &self,
        credentials: &str,
        order_id: &str,
    ) -> Result<Option<Value>, CommerceError>;

    async fn fetch_payment_record_for_order(
        &self,
        credentials: &str,
        order_id: &str,
    ) -> Result<PaymentRecord, CommerceError>;
}

#[async_trait]
impl OrderSource for CommerceClient {
    async fn query_orders(
        &self,
        credentials: &str,
        query: &OrderQuery,
    ) -> Result<OrderPage, CommerceError> {
        CommerceClient::query_orders(self, credentials, query).await
    }

    async fn fetch_order_details(
        &self,
        credentials: &str,
        order_id: &str,
    ) -> Result<Option<Value>, CommerceError> {
        CommerceClient::fetch_order_details(self, credentials, order_id).await
    }

    async fn fetch_payment_record_for_order(
        &self,
        credentials: &str,
        order_id: &str,
    ) -> Result<PaymentRecord, CommerceError> {
        self.fetch_payment_record(credentials, order_id).await
    }
}
