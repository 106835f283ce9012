use std::future::Future;
use tokio::time::{sleep, Duration};

/// Fixed-delay retry policy for transient external failures.
///
/// A flat wait between attempts, no jitter: the dominant failure mode is
/// transient RPC unavailability, not congestion.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        assert!(max_attempts >= 1, "at least one attempt is required");
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `operation` until it succeeds or `max_attempts` is reached.
    /// `on_error` is invoked with every failure, including the last one,
    /// which is then returned to the caller.
    pub async fn run<T, E, F, Fut, H>(&self, mut operation: F, mut on_error: H) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        H: FnMut(&E),
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    on_error(&e);
                    if attempt >= self.max_attempts {
                        return Err(e);
                    }
                    sleep(self.delay).await;
                }
            }
        }
    }
}
