//! Retry policy implementation.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::{DEFAULT_MAX_RETRY, DEFAULT_MAX_WAIT_TIME};
use crate::errors::{AdvertisingError, AdvertisingResult};

/// Unit of the exponential backoff: attempt `n` waits `2^n` of these.
pub const BASE_DELAY: Duration = Duration::from_millis(100);

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum attempts per logical request, the first one included.
    pub max_retry: u32,
    /// Upper bound of a single wait.
    pub max_wait_time: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry: DEFAULT_MAX_RETRY,
            max_wait_time: DEFAULT_MAX_WAIT_TIME,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_retry: u32, max_wait_time: Duration) -> Self {
        Self {
            max_retry,
            max_wait_time,
        }
    }

    /// A configuration that makes a single attempt.
    pub fn no_retries() -> Self {
        Self {
            max_retry: 1,
            ..Default::default()
        }
    }
}

/// Why an attempt should be repeated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    /// The request did not produce a response.
    Network(String),
    /// HTTP 429.
    RateLimited,
    /// HTTP 500.
    ServerError,
    /// HTTP 401; the token is refreshed before the next attempt.
    Unauthorized,
}

impl RetryReason {
    /// Maps a status code to a retry reason. Other statuses are not retried.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            401 => Some(RetryReason::Unauthorized),
            429 => Some(RetryReason::RateLimited),
            500 => Some(RetryReason::ServerError),
            _ => None,
        }
    }
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryReason::Network(message) => write!(f, "network error: {message}"),
            RetryReason::RateLimited => f.write_str("HTTP 429 Too Many Requests"),
            RetryReason::ServerError => f.write_str("HTTP 500 Internal Server Error"),
            RetryReason::Unauthorized => f.write_str("HTTP 401 Unauthorized"),
        }
    }
}

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    /// Finished; stop retrying.
    Complete(T),
    /// Try again, if attempts remain.
    Retry(RetryReason),
}

/// Hook run before retrying an unauthorized attempt.
#[async_trait]
pub trait Reauthenticate: Send + Sync {
    /// Obtains fresh credentials.
    async fn reauthenticate(&self) -> AdvertisingResult<()>;
}

/// Retry policy with deterministic exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a new retry policy.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Wait after failed attempt `attempt` (1-based): `min(max_wait_time, 2^attempt * 100ms)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        BASE_DELAY
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
            .min(self.config.max_wait_time)
    }

    /// Runs `operation` until it completes, fails fatally, or attempts run out.
    ///
    /// The closure receives the 1-based attempt number. An error returned by
    /// the closure is fatal and returned as is.
    #[instrument(skip_all, fields(max_retry = self.config.max_retry))]
    pub async fn execute<F, Fut, T>(
        &self,
        auth: &dyn Reauthenticate,
        mut operation: F,
    ) -> AdvertisingResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AdvertisingResult<Attempt<T>>>,
    {
        let mut attempt = 1;

        loop {
            let reason = match operation(attempt).await? {
                Attempt::Complete(value) => return Ok(value),
                Attempt::Retry(reason) => reason,
            };

            if attempt >= self.config.max_retry {
                return Err(AdvertisingError::RetryExhausted {
                    attempts: attempt,
                    last_failure: reason.to_string(),
                });
            }

            if reason == RetryReason::Unauthorized {
                auth.reauthenticate().await?;
            }

            let delay = self.delay_for(attempt);
            info!(
                attempt,
                max_retry = self.config.max_retry,
                delay_ms = delay.as_millis(),
                reason = %reason,
                "Retrying after error"
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[derive(Default)]
    struct CountingAuth {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Reauthenticate for CountingAuth {
        async fn reauthenticate(&self) -> AdvertisingResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct RejectingAuth;

    #[async_trait]
    impl Reauthenticate for RejectingAuth {
        async fn reauthenticate(&self) -> AdvertisingResult<()> {
            Err(AdvertisingError::auth("No refresh token"))
        }
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::new(RetryConfig::new(10, Duration::from_secs(1)));

        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for(4), Duration::from_secs(1));
        assert_eq!(policy.delay_for(40), Duration::from_secs(1));
    }

    #[test]
    fn test_reason_from_status() {
        assert_eq!(RetryReason::from_status(401), Some(RetryReason::Unauthorized));
        assert_eq!(RetryReason::from_status(429), Some(RetryReason::RateLimited));
        assert_eq!(RetryReason::from_status(500), Some(RetryReason::ServerError));
        assert_eq!(RetryReason::from_status(502), None);
        assert_eq!(RetryReason::from_status(404), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_after_max_retry_attempts() {
        let policy = RetryPolicy::new(RetryConfig::new(4, Duration::from_secs(120)));
        let auth = CountingAuth::default();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: AdvertisingResult<()> = policy
            .execute(&auth, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(Attempt::Retry(RetryReason::RateLimited)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(AdvertisingError::RetryExhausted { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("unexpected result: {other:?}"),
        }
        // 200 + 400 + 800 ms of backoff, no wait after the last attempt.
        assert_eq!(start.elapsed(), Duration::from_millis(1400));
        assert_eq!(auth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_reauthenticates_once_per_cycle() {
        let policy = RetryPolicy::default();
        let auth = CountingAuth::default();

        let value = policy
            .execute(&auth, |attempt| async move {
                Ok(if attempt < 3 {
                    Attempt::Retry(RetryReason::Unauthorized)
                } else {
                    Attempt::Complete(attempt)
                })
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(auth.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reauthentication_failure_is_fatal() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result: AdvertisingResult<()> = policy
            .execute(&RejectingAuth, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(Attempt::Retry(RetryReason::Unauthorized)) }
            })
            .await;

        assert!(result.unwrap_err().is_auth());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let policy = RetryPolicy::default();
        let auth = CountingAuth::default();
        let calls = AtomicU32::new(0);

        let result: AdvertisingResult<()> = policy
            .execute(&auth, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AdvertisingError::from_response(400, br#"{"details":"bad"}"#)) }
            })
            .await;

        assert_eq!(result.unwrap_err().status_code(), Some(400));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_config() {
        let policy = RetryPolicy::new(RetryConfig::no_retries());
        let auth = CountingAuth::default();

        let result: AdvertisingResult<()> = policy
            .execute(&auth, |_| async {
                Ok(Attempt::Retry(RetryReason::Network("reset".to_string())))
            })
            .await;

        match result {
            Err(AdvertisingError::RetryExhausted { attempts, last_failure }) => {
                assert_eq!(attempts, 1);
                assert_eq!(last_failure, "network error: reset");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
