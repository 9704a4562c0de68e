//! Database operations for `orders`.

use chrono::{DateTime, Utc};
use recon_core::{IngestSource, Order, PaymentStatus};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub tenant_id: String,
    pub order_id: String,
    pub number: Option<String>,
    pub status: Option<String>,
    pub payment_status: String,
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
    pub source: String,
    pub raw: Value,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DbError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let source = IngestSource::parse(&row.source).ok_or_else(|| DbError::InvalidRow {
            table: "orders",
            reason: format!("unknown source \"{}\"", row.source),
        })?;
        Ok(Order {
            id: row.order_id,
            number: row.number,
            status: row.status,
            payment_status: PaymentStatus::parse(&row.payment_status),
            currency: row.currency,
            subtotal: row.subtotal,
            tax: row.tax,
            shipping: row.shipping,
            discount: row.discount,
            total: row.total,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            created_at: row.created_at,
            updated_at: row.updated_at,
            paid_at: row.paid_at,
            archived: row.archived,
            source,
            raw: row.raw,
        })
    }
}

const ORDER_COLUMNS: &str = "tenant_id, order_id, number, status, payment_status, currency, \
     subtotal, tax, shipping, discount, total, customer_name, customer_email, \
     created_at, updated_at, paid_at, archived, source, raw, first_seen_at, last_seen_at";

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Inserts or overwrites the order keyed by `(tenant_id, order.id)`.
///
/// Every column is replaced by the new sighting; only `first_seen_at`
/// survives. Returns `true` when the row was newly inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_order(pool: &PgPool, tenant_id: &str, order: &Order) -> Result<bool, DbError> {
    let inserted: bool = sqlx::query_scalar::<_, bool>(
        "INSERT INTO orders \
             (tenant_id, order_id, number, status, payment_status, currency, \
              subtotal, tax, shipping, discount, total, customer_name, customer_email, \
              created_at, updated_at, paid_at, archived, source, raw) \
         VALUES ($1, $2, $3, $4, $5, $6, \
                 $7, $8, $9, $10, $11, $12, $13, \
                 $14, $15, $16, $17, $18, $19) \
         ON CONFLICT (tenant_id, order_id) DO UPDATE SET \
             number         = EXCLUDED.number, \
             status         = EXCLUDED.status, \
             payment_status = EXCLUDED.payment_status, \
             currency       = EXCLUDED.currency, \
             subtotal       = EXCLUDED.subtotal, \
             tax            = EXCLUDED.tax, \
             shipping       = EXCLUDED.shipping, \
             discount       = EXCLUDED.discount, \
             total          = EXCLUDED.total, \
             customer_name  = EXCLUDED.customer_name, \
             customer_email = EXCLUDED.customer_email, \
             created_at     = EXCLUDED.created_at, \
             updated_at     = EXCLUDED.updated_at, \
             paid_at        = EXCLUDED.paid_at, \
             archived       = EXCLUDED.archived, \
             source         = EXCLUDED.source, \
             raw            = EXCLUDED.raw, \
             last_seen_at   = NOW() \
         RETURNING (xmax = 0) AS inserted",
    )
    .bind(tenant_id)
    .bind(&order.id)
    .bind(&order.number)
    .bind(&order.status)
    .bind(order.payment_status.as_str())
    .bind(&order.currency)
    .bind(order.subtotal)
    .bind(order.tax)
    .bind(order.shipping)
    .bind(order.discount)
    .bind(order.total)
    .bind(&order.customer_name)
    .bind(&order.customer_email)
    .bind(order.created_at)
    .bind(order.updated_at)
    .bind(order.paid_at)
    .bind(order.archived)
    .bind(order.source.as_str())
    .bind(&order.raw)
    .fetch_one(pool)
    .await?;

    Ok(inserted)
}

/// Returns one order, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order(
    pool: &PgPool,
    tenant_id: &str,
    order_id: &str,
) -> Result<Option<OrderRow>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE tenant_id = $1 AND order_id = $2"
    ))
    .bind(tenant_id)
    .bind(order_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Orders with `created_at` in `[start, end)`, oldest first. Orders with no
/// creation time are never included.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_orders_created_between(
    pool: &PgPool,
    tenant_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<OrderRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE tenant_id = $1 AND created_at >= $2 AND created_at < $3 \
         ORDER BY created_at, order_id"
    ))
    .bind(tenant_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
