//! Request and response shapes for the commerce platform's order APIs.
//!
//! ## Observed shape of `POST /ecom/v1/orders/search`
//!
//! ```text
//! { "orders": [ ... ],
//!   "metadata": { "count": 50, "hasNext": true,
//!                 "cursors": { "next": "eyJ...", "prev": null } } }
//! ```
//!
//! Orders are kept as raw JSON: their shape varies between API versions and
//! apps, and all field derivation happens in [`crate::extract`].
//!
//! ### `cursors.next`
//! `null` or absent on the last page. Some stores return an empty string
//! instead; that is treated the same as `null`. A few return the cursor that
//! was just sent, see [`crate::pagination::is_stuck_cursor`].

use chrono::{DateTime, Utc};
use recon_core::PaymentStatus;
use serde::Deserialize;
use serde_json::Value;

use crate::extract::PaymentSummary;

#[derive(Debug, Deserialize)]
pub struct OrderSearchResponse {
    #[serde(default)]
    pub orders: Vec<Value>,
    #[serde(default)]
    pub metadata: Option<PagingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagingMetadata {
    #[serde(default)]
    pub has_next: Option<bool>,
    #[serde(default)]
    pub cursors: Option<Cursors>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Cursors {
    #[serde(default)]
    pub next: Option<String>,
}

/// Parameters for one page of the order search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    /// Lower bound on the creation date. Ignored once a cursor is supplied.
    pub start_date: Option<DateTime<Utc>>,
    pub cursor: Option<String>,
    pub limit: u32,
    /// Only return orders in this payment status. Ignored once a cursor is
    /// supplied.
    pub payment_status: Option<PaymentStatus>,
}

/// One page of raw orders plus the cursor for the next page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPage {
    pub orders: Vec<Value>,
    pub next_cursor: Option<String>,
}

/// What the payment service knows about an order's charge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentRecord {
    pub transaction_ref: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_summary: Option<PaymentSummary>,
}

impl PaymentRecord {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transaction_ref.is_none() && self.paid_at.is_none() && self.payment_summary.is_none()
    }
}
