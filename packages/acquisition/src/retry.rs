//! Retry policy for a single remote batch.
//!
//! A batch is attempted up to [`RetryPolicy::max_attempts`] times. Between
//! attempts the policy sleeps according to its [`Backoff`]; transport
//! failures (timeouts, connection errors, bad status) wait twice as long
//! as errors the service reported itself.

use std::future::Future;
use std::time::Duration;

use crate::AcquisitionError;

/// Default attempts per batch, first try included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay between attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay after every failed attempt.
    Fixed(Duration),
    /// `base * 2^(attempt - 1)`.
    Exponential(Duration),
}

impl Backoff {
    /// Delay after the given failed attempt (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential(base) => {
                base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
            }
        }
    }
}

/// How many times to attempt a batch and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included. Zero behaves as one.
    pub max_attempts: u32,
    /// Delay schedule.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::Fixed(DEFAULT_BACKOFF),
        }
    }
}

impl RetryPolicy {
    /// A fixed-delay policy.
    #[must_use]
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    /// Delay before the attempt following `attempt`, given the error it
    /// failed with.
    #[must_use]
    pub fn delay_after(&self, attempt: u32, error: &AcquisitionError) -> Duration {
        let delay = self.backoff.delay(attempt);
        if error.is_transport() {
            delay.saturating_mul(2)
        } else {
            delay
        }
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// the attempts run out. `op` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, AcquisitionError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AcquisitionError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        log::info!("{label}: succeeded on attempt {attempt}/{max_attempts}");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < max_attempts && e.is_retryable() => {
                    let delay = self.delay_after(attempt, &e);
                    log::warn!(
                        "{label}: attempt {attempt}/{max_attempts} failed: {e}. Retrying in {delay:?}..."
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    log::warn!("{label}: giving up after attempt {attempt}/{max_attempts}: {e}");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn remote_error() -> AcquisitionError {
        AcquisitionError::Remote {
            code: 500,
            message: "Error performing query operation".to_string(),
        }
    }

    #[test]
    fn backoff_schedules() {
        let fixed = Backoff::Fixed(Duration::from_secs(1));
        assert_eq!(fixed.delay(1), Duration::from_secs(1));
        assert_eq!(fixed.delay(5), Duration::from_secs(1));

        let exp = Backoff::Exponential(Duration::from_millis(500));
        assert_eq!(exp.delay(1), Duration::from_millis(500));
        assert_eq!(exp.delay(2), Duration::from_secs(1));
        assert_eq!(exp.delay(3), Duration::from_secs(2));
    }

    #[test]
    fn transport_errors_wait_longer() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1, &remote_error()), Duration::from_secs(1));
        let status = AcquisitionError::Status {
            status: 503,
            url: "http://example.test".to_string(),
        };
        assert_eq!(policy.delay_after(1, &status), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::ZERO);

        let result = policy
            .run("test", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(remote_error())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::ZERO);

        let result: Result<(), _> = policy
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(remote_error()) }
            })
            .await;

        assert!(matches!(result, Err(AcquisitionError::Remote { code: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::ZERO);

        let result: Result<(), _> = policy
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(AcquisitionError::Cancelled {
                        label: "test".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(AcquisitionError::Cancelled { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_base_delay_between_remote_errors() {
        let policy = RetryPolicy::default();
        let start = tokio::time::Instant::now();

        let result = policy
            .run("test", |attempt| async move {
                if attempt < 3 {
                    Err(remote_error())
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_double_delay_after_transport_error() {
        let policy = RetryPolicy::default();
        let start = tokio::time::Instant::now();

        let result = policy
            .run("test", |attempt| async move {
                if attempt == 1 {
                    Err(AcquisitionError::Status {
                        status: 503,
                        url: "http://example.test".to_string(),
                    })
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn no_wait_after_last_attempt() {
        let policy = RetryPolicy::default();
        let start = tokio::time::Instant::now();

        let result: Result<(), _> = policy.run("test", |_| async { Err(remote_error()) }).await;

        assert!(result.is_err());
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy::fixed(0, Duration::ZERO);
        let result = policy.run("test", |_| async { Ok(1) }).await;
        assert_eq!(result.unwrap(), 1);
    }
}
