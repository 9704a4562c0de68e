use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Longest wait between two attempts at issuing the same refund receipt.
const MAX_RETRY_DELAY_SECS: i64 = 24 * 60 * 60;

/// A single refund observed upstream, identified per order by `event_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundEvent {
    pub order_id: String,
    /// Upstream refund id, or `"full"` for a refund inferred from a fully
    /// refunded order with no itemised refund entries.
    pub event_key: String,
    /// Refunded amount as a positive decimal.
    pub amount: Decimal,
    pub refunded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundEventStatus {
    Pending,
    Issued,
    Failed,
}

impl RefundEventStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RefundEventStatus::Pending => "pending",
            RefundEventStatus::Issued => "issued",
            RefundEventStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(RefundEventStatus::Pending),
            "issued" => Some(RefundEventStatus::Issued),
            "failed" => Some(RefundEventStatus::Failed),
            _ => None,
        }
    }
}

/// Persisted refund event together with its bounded-retry bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundEventRecord {
    pub id: i64,
    pub event: RefundEvent,
    pub status: RefundEventStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub next_eligible_at: DateTime<Utc>,
    pub failure_reason: Option<String>,
    pub receipt_id: Option<i64>,
}

/// Bounded exponential retry schedule for deferred refund events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_secs: 300,
        }
    }
}

impl RetryPolicy {
    /// `true` once `attempts` failed attempts have used up the budget.
    #[must_use]
    pub fn is_exhausted(&self, attempts: i32) -> bool {
        i64::from(attempts) >= i64::from(self.max_attempts)
    }

    /// Earliest time the next attempt may run after `attempts` failures.
    ///
    /// Delay is `backoff_base_secs * 2^(attempts - 1)`, capped at one day.
    #[must_use]
    pub fn next_eligible_at(&self, now: DateTime<Utc>, attempts: i32) -> DateTime<Utc> {
        let exponent = u32::try_from(attempts.saturating_sub(1).max(0))
            .unwrap_or(0)
            .min(20);
        let base = i64::try_from(self.backoff_base_secs).unwrap_or(MAX_RETRY_DELAY_SECS);
        let delay = base
            .saturating_mul(1_i64 << exponent)
            .min(MAX_RETRY_DELAY_SECS);
        now + Duration::seconds(delay)
    }
}
