//! Retry policy for GitHub requests.
//!
//! A [`RetryConfig`] describes a capped exponential schedule; [`with_retry`]
//! drives a fallible async operation through it with `backon`, retrying only
//! errors that [`FetchError::is_retryable`] considers transient.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::crawl::progress::{CrawlProgress, ProgressCallback, emit};
use crate::github::error::{FetchError, short_error_message};

/// Attempts per request, counting the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 50;

/// Delay before the first retry.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Upper bound on any single backoff delay.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Configuration for retry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Whether to add random jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            with_jitter: false,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            min_delay,
            max_delay,
            max_attempts: max_attempts.max(1),
            with_jitter: false,
        }
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Delay before retry number `attempt` (1-based), ignoring jitter.
    ///
    /// `min_delay * 2^(attempt-1)`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.min_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let retries = self.max_attempts.saturating_sub(1) as usize;
        let mut builder = ExponentialBuilder::default()
            .with_factor(2.0)
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Execute an operation, retrying transient failures.
///
/// Each retry emits [`CrawlProgress::RetryBackoff`] and a debug log line.
/// When the last attempt still fails with a retryable error, the error is
/// wrapped in [`FetchError::RetriesExhausted`] carrying the attempt count.
/// Permanent errors are returned unchanged after a single attempt.
///
/// # Example
///
/// ```ignore
/// use ghdata::retry::{RetryConfig, with_retry};
///
/// let body = with_retry(
///     &RetryConfig::default(),
///     || async { client.send_once(&request).await },
///     "https://api.github.com/repos/octo/repo/issues",
///     None,
/// )
/// .await?;
/// ```
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
    target: &str,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    let result = retry_op
        .retry(config.clone().into_backoff())
        .notify(|err: &FetchError, dur: Duration| {
            let current_attempt = attempt.load(Ordering::SeqCst);
            emit(
                on_progress,
                CrawlProgress::RetryBackoff {
                    target: target.to_string(),
                    attempt: current_attempt,
                    retry_after_ms: dur.as_millis() as u64,
                    error: short_error_message(err),
                },
            );
            tracing::debug!(
                "Request to {} failed, retrying in {:?} (attempt {}): {}",
                target,
                dur,
                current_attempt,
                short_error_message(err)
            );
        })
        .when(FetchError::is_retryable)
        .await;

    result.map_err(|err| {
        if err.is_retryable() {
            FetchError::RetriesExhausted {
                attempts: attempt.load(Ordering::SeqCst),
                source: Box::new(err),
            }
        } else {
            err
        }
    })
}
