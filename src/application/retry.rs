//! Caller-side retries for ledger operations.
//!
//! The ledger never retries on its own. Callers that want to ride out lock
//! contention wrap a call in [`with_retry`], which repeats it only while the
//! error is [`LedgerError::is_retryable`].

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use super::LedgerError;

/// Standard backoff for ledger writes.
///
/// - Min delay: 10ms
/// - Max delay: 1s
/// - Max attempts: 8
/// - Jitter enabled
pub fn ledger_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(10))
        .with_max_delay(Duration::from_secs(1))
        .with_max_times(8)
        .with_jitter()
}

/// Run `call`, retrying transient failures with [`ledger_backoff`].
///
/// Business outcomes such as insufficient funds are returned immediately.
pub async fn with_retry<T, F, Fut>(operation: &'static str, call: F) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    call.retry(ledger_backoff())
        .when(LedgerError::is_retryable)
        .notify(|err: &LedgerError, delay: Duration| {
            warn!(operation, error = %err, delay = ?delay, "Ledger call failed, retrying");
        })
        .await
}
