//! Retry with jittered exponential back-off for upstream commerce calls.
//!
//! Only errors for which [`CommerceError::is_transient`] holds are retried.
//! Authentication failures, 404s and malformed bodies are returned on the
//! first occurrence.

use std::future::Future;
use std::time::Duration;

use crate::error::CommerceError;

const MAX_DELAY_MS: u64 = 30_000;

/// Runs `operation`, retrying transient failures up to `max_retries` times.
///
/// | Retry | Sleep before it                        |
/// |-------|----------------------------------------|
/// | 1     | `backoff_base_ms` × 2⁰ ± 25 % jitter   |
/// | 2     | `backoff_base_ms` × 2¹ ± 25 % jitter   |
/// | 3     | `backoff_base_ms` × 2² ± 25 % jitter   |
///
/// Delay is capped at 30 s. With `max_retries = 3` the operation runs at most
/// four times. The last error is returned once retries are exhausted.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, CommerceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CommerceError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient commerce API error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
