use crate::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// How often and how patiently a store call is retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Short, deterministic schedule for local store reads.
    pub fn store_read() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    fn backoff(&self) -> Backoff<'_> {
        Backoff {
            config: self,
            next: self.initial_delay,
        }
    }
}

/// Delay schedule between attempts: geometric growth capped at `max_delay`,
/// plus up to 10% jitter when enabled.
struct Backoff<'a> {
    config: &'a RetryConfig,
    next: Duration,
}

impl Iterator for Backoff<'_> {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        let grown = current.as_secs_f64() * self.config.backoff_multiplier;
        self.next = Duration::from_secs_f64(grown).min(self.config.max_delay);

        if self.config.jitter {
            let extra = current.as_secs_f64() * 0.1 * rand::random::<f64>();
            return Some(current + Duration::from_secs_f64(extra));
        }
        Some(current)
    }
}

/// Runs `operation` until it succeeds, fails with an error that is not
/// retryable, or uses up `max_attempts`.
pub async fn retry_with_backoff<F, Fut, T>(config: &RetryConfig, operation_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delays = config.backoff();
    let mut attempt = 1;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("{} recovered on attempt {}", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => e,
        };

        if attempt >= config.max_attempts {
            error!("{} gave up after {} attempts: {}", operation_name, attempt, error);
            return Err(error);
        }

        let delay = delays.next().unwrap_or(config.max_delay);
        warn!("{} attempt {} failed ({}), retrying in {:?}", operation_name, attempt, error, delay);
        sleep(delay).await;
        attempt += 1;
    }
}

pub async fn retry_store_operation<F, Fut, T>(operation_name: &str, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with_backoff(&RetryConfig::store_read(), operation_name, operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxOfficeError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: false,
            ..RetryConfig::default()
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(35),
            jitter: false,
            ..RetryConfig::default()
        };
        let delays: Vec<u128> = config.backoff().take(4).map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![10, 20, 35, 35]);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_with_backoff(&quick(3), "flaky-read", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(BoxOfficeError::StoreUnavailable("timeout".to_string()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = retry_with_backoff(&quick(2), "down", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BoxOfficeError::StoreUnavailable("down".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn verdicts_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = retry_with_backoff(&quick(5), "missing", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BoxOfficeError::OrderNotFound("o-1".to_string()))
        })
        .await;

        assert!(matches!(result, Err(BoxOfficeError::OrderNotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
