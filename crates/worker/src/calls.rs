//! Timeout and retry guards around adapter calls.
//!
//! Every call into a port goes through [`CallPolicy`], so no call can block a
//! run indefinitely. Reads may be retried; writes never are, because a
//! repeated `create_item` would leave a duplicate issue behind.

use std::future::Future;
use std::time::Duration;

use reconciler::{AdapterError, RetryPolicy};

/// Default timeout applied to each adapter call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of extra attempts for a retryable read.
pub const DEFAULT_READ_RETRIES: u32 = 2;

/// Default base delay between read attempts when the server names none.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// How adapter calls are bounded and retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPolicy {
    /// Upper bound on a single call.
    pub timeout: Duration,
    /// Extra attempts for a read whose error is retryable.
    pub read_retries: u32,
    /// Base back-off; the n-th retry waits `n * retry_backoff` unless the
    /// error carries its own delay.
    pub retry_backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CALL_TIMEOUT,
            read_retries: DEFAULT_READ_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl CallPolicy {
    /// Runs `call` once, failing with [`AdapterError::TimedOut`] if it does not
    /// finish within [`CallPolicy::timeout`].
    ///
    /// A timed-out write may still have been applied by the Target.
    pub async fn bounded<T, Fut>(&self, operation: &str, call: Fut) -> Result<T, AdapterError>
    where
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::TimedOut {
                operation: operation.to_owned(),
                after: self.timeout,
            }),
        }
    }

    /// Runs a read-only call, retrying retryable failures up to
    /// [`CallPolicy::read_retries`] times.
    pub async fn read<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, AdapterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        let mut attempt = 0;
        loop {
            let err = match self.bounded(operation, call()).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            let RetryPolicy::Retryable { after } = err.retry_policy() else {
                return Err(err);
            };
            if attempt >= self.read_retries {
                return Err(err);
            }
            attempt += 1;
            let delay = after.unwrap_or(self.retry_backoff * attempt);
            tracing::warn!(operation, attempt, ?delay, error = %err, "retrying read");
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn quick() -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_millis(50),
            read_retries: 2,
            retry_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let result: Result<(), _> = quick()
            .bounded("create_item", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(
            result,
            Err(AdapterError::TimedOut { ref operation, .. }) if operation == "create_item"
        ));
    }

    #[tokio::test]
    async fn retryable_read_eventually_succeeds() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let result = quick()
            .read("list_items", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AdapterError::Unavailable {
                        message: "502".into(),
                        retry_after: None,
                    })
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let result: Result<(), _> = quick()
            .read("repo_exists", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(AdapterError::Unavailable {
                    message: "down".into(),
                    retry_after: None,
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn final_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let result: Result<(), _> = quick()
            .read("repo_exists", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(AdapterError::Unauthorized {
                    message: "Bad credentials".into(),
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
