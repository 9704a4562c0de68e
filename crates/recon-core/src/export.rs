use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::orders::Order;

/// One line of the audit export, sourced straight from the order record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub order_id: String,
    pub number: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub total_amount: Decimal,
    pub currency: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
}

impl From<&Order> for AuditRecord {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            number: order.number.clone(),
            created_at: order.created_at,
            paid_at: order.paid_at,
            total_amount: order.total,
            currency: order.currency.clone(),
            customer_name: order.customer_name.clone(),
            customer_email: order.customer_email.clone(),
        }
    }
}
