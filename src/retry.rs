use std::{future::Future, time::Duration};

use crate::error::ClaimerError;

/// Fixed-delay bounded retry shared by eligibility fetches, solver polling
/// and transaction submission.
#[derive(Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub is_retryable: fn(&eyre::Report) -> bool,
    /// Whether `delay` is waited out after this error before the next attempt.
    pub pauses_after: fn(&eyre::Report) -> bool,
}

fn always(_: &eyre::Report) -> bool {
    true
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            is_retryable: ClaimerError::is_transient,
            pauses_after: always,
        }
    }

    pub const fn pausing_only_after(mut self, pauses_after: fn(&eyre::Report) -> bool) -> Self {
        self.pauses_after = pauses_after;
        self
    }

    pub fn is_last(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    /// Runs `op` until it succeeds, returns a non-retryable error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    /// The error of the final attempt is returned as is.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> eyre::Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = eyre::Result<T>>,
    {
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if !self.is_last(attempt) && (self.is_retryable)(&err) => {
                    let delay = if (self.pauses_after)(&err) {
                        self.delay
                    } else {
                        Duration::ZERO
                    };

                    if ClaimerError::is_retry_signal(&err) {
                        tracing::info!("{label}: {err} (attempt {attempt}/{})", self.max_attempts);
                    } else {
                        tracing::warn!(
                            "{label} failed (attempt {attempt}/{}): {err}. Trying again in {delay:?}",
                            self.max_attempts
                        );
                    }

                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
