use rand::{RngExt, rng};
use std::time::Duration;

/// A simple retry policy with exponential backoff and jitter.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Jittered backoff delay for the given 1-based attempt number.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let max_delay = self.base_delay * (1u32 << attempt.min(16));
        let mut rng = rng();
        let jitter = rng.random_range(0..max_delay.as_millis().max(1) as u64);
        Duration::from_millis(jitter)
    }

    pub async fn retry_async<F, Fut, T, E>(&self, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(e);
                    }
                    tokio::time::sleep(self.delay_for(attempt)).await;
                }
            }
        }
    }
}
