//! Bounded retry with exponential backoff and a hard total deadline.
//!
//! The executor makes at most `max_retries + 1` attempts, doubling the delay
//! between attempts, and never sleeps past the remaining budget. Every
//! failure is recorded, so callers can report the full attempt history.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::GatewayError;

/// Retry behavior knobs.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum retries after the first attempt
    pub max_retries: u32,
    /// Hard ceiling on total elapsed time across all attempts and sleeps
    pub total_deadline: Duration,
    /// Delay before the first retry; doubles each attempt
    pub base_delay: Duration,
    /// Randomize delays by up to `jitter_factor` to avoid thundering herds
    pub use_jitter: bool,
    pub jitter_factor: f64,
    /// Custom retryability predicate; defaults to [`GatewayError::is_retryable`]
    pub retry_condition: Option<fn(&GatewayError) -> bool>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            total_deadline: Duration::from_secs(2),
            base_delay: Duration::from_millis(50),
            use_jitter: false,
            jitter_factor: 0.1,
            retry_condition: None,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_total_deadline(mut self, deadline: Duration) -> Self {
        self.total_deadline = deadline;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.use_jitter = true;
        self.jitter_factor = factor;
        self
    }

    pub fn with_retry_condition(mut self, condition: fn(&GatewayError) -> bool) -> Self {
        self.retry_condition = Some(condition);
        self
    }

    fn should_retry(&self, error: &GatewayError) -> bool {
        match self.retry_condition {
            Some(condition) => condition(error),
            None => error.is_retryable(),
        }
    }

    /// Backoff delay for a zero-based attempt index.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = 2u32.saturating_pow(attempt.min(16));
        let delay = self.base_delay.saturating_mul(exp);
        if self.use_jitter {
            let spread = delay.as_secs_f64() * self.jitter_factor;
            let jitter = rand::random::<f64>() * spread;
            delay + Duration::from_secs_f64(jitter)
        } else {
            delay
        }
    }
}

/// Result of a retried operation plus its attempt history.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, GatewayError>,
    /// Attempts actually made (at least 1 unless the deadline was already spent)
    pub attempts: u32,
    /// Wall-clock time across all attempts and backoff sleeps
    pub elapsed: Duration,
    /// Human-readable record of every failed attempt, in order
    pub errors: Vec<String>,
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs operations under a [`RetryConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute `op` until it succeeds, exhausts the retry budget, hits the
    /// deadline, or fails non-retryably.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let start = Instant::now();
        let mut errors = Vec::new();
        let mut attempts = 0u32;
        let mut last_error: Option<GatewayError> = None;

        for attempt in 0..=self.config.max_retries {
            if start.elapsed() >= self.config.total_deadline {
                warn!(
                    operation,
                    attempts, "retry deadline exceeded before next attempt"
                );
                break;
            }
            attempts = attempt + 1;

            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempts, "operation succeeded after retries");
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts,
                        elapsed: start.elapsed(),
                        errors,
                    };
                }
                Err(e) => {
                    errors.push(format!("attempt {attempts}: {e}"));
                    let retryable = self.config.should_retry(&e);
                    last_error = Some(e);
                    if !retryable {
                        debug!(operation, attempts, "error is not retryable, giving up");
                        break;
                    }
                    if attempt < self.config.max_retries {
                        let remaining = self.config.total_deadline.saturating_sub(start.elapsed());
                        if remaining.is_zero() {
                            break;
                        }
                        let delay = self.config.delay_for(attempt).min(remaining);
                        debug!(operation, attempts, delay_ms = delay.as_millis() as u64, "backing off");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        RetryOutcome {
            result: Err(last_error.unwrap_or_else(|| {
                GatewayError::Internal(format!("retry of '{operation}' made no attempts"))
            })),
            attempts,
            elapsed: start.elapsed(),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let executor = RetryExecutor::new(RetryConfig::default());
        let outcome = executor.execute("test", || async { Ok::<_, GatewayError>(7) }).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let executor = RetryExecutor::new(
            RetryConfig::new()
                .with_max_retries(4)
                .with_base_delay(Duration::from_millis(1)),
        );
        let outcome = executor
            .execute("test", move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(GatewayError::Connection("refused".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let executor = RetryExecutor::new(RetryConfig::new().with_max_retries(5));
        let outcome = executor
            .execute("test", move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(GatewayError::http(500, "boom"))
                }
            })
            .await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deadline_caps_total_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let executor = RetryExecutor::new(
            RetryConfig::new()
                .with_max_retries(5)
                .with_total_deadline(Duration::from_millis(200))
                .with_base_delay(Duration::from_millis(80)),
        );
        let outcome = executor
            .execute("test", move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(GatewayError::Timeout("slow".into()))
                }
            })
            .await;
        assert!(!outcome.is_success());
        // Backoff of 80ms then 160ms blows the 200ms budget well before the
        // six attempts the retry count alone would allow.
        assert!(outcome.attempts < 6, "attempts: {}", outcome.attempts);
        assert!(outcome.elapsed >= Duration::from_millis(200) || outcome.attempts <= 3);
        assert_eq!(outcome.errors.len(), outcome.attempts as usize);
    }

    #[tokio::test]
    async fn custom_condition_overrides_default() {
        let executor = RetryExecutor::new(
            RetryConfig::new()
                .with_max_retries(2)
                .with_base_delay(Duration::from_millis(1))
                .with_retry_condition(|e| matches!(e, GatewayError::Http { status: 503, .. })),
        );
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let outcome = executor
            .execute("test", move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(GatewayError::http(503, "busy"))
                }
            })
            .await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.attempts, 3);
    }
}
