//! Order search and single-order lookup.

use chrono::SecondsFormat;
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::error::CommerceError;
use crate::pagination::next_cursor;
use crate::types::{OrderPage, OrderQuery, OrderSearchResponse};

use super::CommerceClient;

impl CommerceClient {
    /// Fetches one page of orders sorted by creation date ascending.
    ///
    /// Without a cursor the request carries the start-date and payment-status
    /// filters. With a cursor only the cursor and page size are sent; the
    /// cursor encodes the original filter and sort.
    ///
    /// # Errors
    ///
    /// - [`CommerceError::Unauthorized`] on 401/403 (not retried).
    /// - [`CommerceError::RateLimited`], [`CommerceError::UnexpectedStatus`]
    ///   (5xx) or [`CommerceError::Http`] after retries are exhausted.
    /// - [`CommerceError::Deserialize`] if the body is not a search response.
    pub async fn query_orders(
        &self,
        credentials: &str,
        query: &OrderQuery,
    ) -> Result<OrderPage, CommerceError> {
        let url = self.endpoint(&["ecom", "v1", "orders", "search"])?;
        let body = search_body(query);
        let value = self
            .send_json(Method::POST, url, credentials, Some(&body), "order search page")
            .await?;
        let parsed: OrderSearchResponse =
            serde_json::from_value(value).map_err(|e| CommerceError::Deserialize {
                context: "order search page".to_owned(),
                source: e,
            })?;

        Ok(OrderPage {
            next_cursor: next_cursor(parsed.metadata.as_ref()),
            orders: parsed.orders,
        })
    }

    /// Fetches the full representation of one order. `Ok(None)` when the
    /// order does not exist upstream.
    ///
    /// # Errors
    ///
    /// Same as [`CommerceClient::query_orders`], except 404 which maps to
    /// `Ok(None)`.
    pub async fn fetch_order_details(
        &self,
        credentials: &str,
        order_id: &str,
    ) -> Result<Option<Value>, CommerceError> {
        let url = self.endpoint(&["ecom", "v1", "orders", order_id])?;
        match self
            .send_json(Method::GET, url, credentials, None, "order details")
            .await
        {
            Ok(Value::Null) | Err(CommerceError::NotFound { .. }) => Ok(None),
            Ok(mut body) => Ok(Some(match body.get_mut("order").map(Value::take) {
                Some(order) if !order.is_null() => order,
                _ => body,
            })),
            Err(e) => Err(e),
        }
    }
}

/// Request body for `POST /ecom/v1/orders/search`.
pub(crate) fn search_body(query: &OrderQuery) -> Value {
    let mut paging = Map::new();
    paging.insert("limit".into(), json!(query.limit));

    if let Some(cursor) = &query.cursor {
        paging.insert("cursor".into(), json!(cursor));
        return json!({ "search": { "cursorPaging": paging } });
    }

    let mut filter = Map::new();
    if let Some(start) = query.start_date {
        filter.insert(
            "createdDate".into(),
            json!({ "$gte": start.to_rfc3339_opts(SecondsFormat::Millis, true) }),
        );
    }
    if let Some(status) = query.payment_status {
        filter.insert("paymentStatus".into(), json!({ "$eq": status.as_str() }));
    }

    json!({
        "search": {
            "cursorPaging": paging,
            "filter": filter,
            "sort": [{ "fieldName": "createdDate", "order": "ASC" }]
        }
    })
}
