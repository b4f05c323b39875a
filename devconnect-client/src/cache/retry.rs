use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ClientResult;

/// How often a failed request is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub retries: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Queries: two retries, one second apart.
    pub const QUERY: RetryPolicy = RetryPolicy {
        retries: 2,
        delay: Duration::from_secs(1),
    };

    /// Mutations are sent exactly once.
    pub const MUTATION: RetryPolicy = RetryPolicy {
        retries: 0,
        delay: Duration::ZERO,
    };

    /// Runs `op` until it succeeds, fails with a non-retryable error or the
    /// retries are used up. The last error is returned.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> ClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.retries && err.is_retryable() => {
                    attempt += 1;
                    warn!(error = %err, attempt, "request failed, retrying");
                    tokio::time::sleep(self.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::QUERY
    }
}
