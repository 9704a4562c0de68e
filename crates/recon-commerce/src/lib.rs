pub mod client;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod pagination;
pub mod refunds;
pub(crate) mod retry;
pub mod types;

pub use client::CommerceClient;
pub use error::CommerceError;
pub use extract::{Money, PaymentMethod, PaymentSummary, SummaryRule};
pub use normalize::{enrich_with_payment_record, normalize_order, NotIngestible};
pub use refunds::{extract_refund_events, parse_refund_entry, FULL_REFUND_KEY};
pub use types::{OrderPage, OrderQuery, PaymentRecord};
