use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::lifecycle::OperationError;

/// Evaluate `predicate` until it reports `true`, sleeping `interval` between attempts.
/// An `Err` from the predicate ends the wait immediately.
pub async fn wait_for_state<F, Fut, E>(interval: Duration, mut predicate: F) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        if predicate().await? {
            debug!(attempt, "Desired state reached");
            return Ok(());
        }
        debug!(attempt, interval_secs = interval.as_secs(), "Desired state not reached yet");
        tokio::time::sleep(interval).await;
    }
}

/// Bound a whole operation; expiry becomes [`OperationError::Timeout`]
pub async fn with_deadline<T, Fut>(limit: Duration, operation: Fut) -> Result<T, OperationError>
where
    Fut: Future<Output = Result<T, OperationError>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(OperationError::Timeout { limit }),
    }
}
