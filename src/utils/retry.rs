//! Retry logic with exponential backoff for transient failures
//!
//! The Risco cloud produces sporadic failures and session churn, so every
//! remote call goes through [`retry_with_backoff`]. Waits start at
//! `initial_delay`, double per attempt and never exceed `max_delay`. By
//! default there is no attempt ceiling; callers that cannot block forever set
//! `max_retries` or `max_elapsed`.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::constants::{BACKOFF_INITIAL_SECS, BACKOFF_MAX_SECS};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the initial attempt).
    /// `None` retries until success.
    pub max_retries: Option<u32>,
    /// Give up once this much time has been spent retrying
    pub max_elapsed: Option<Duration>,
    /// Delay before the first retry (also the lower bound for every delay)
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (typically 2.0)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            max_elapsed: None,
            initial_delay: Duration::from_secs(BACKOFF_INITIAL_SECS),
            max_delay: Duration::from_secs(BACKOFF_MAX_SECS),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a configuration with no retries (fail fast)
    pub fn no_retry() -> Self {
        Self {
            max_retries: Some(0),
            max_elapsed: None,
            initial_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            backoff_multiplier: 1.0,
        }
    }

    /// Cap the number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Cap the total time spent retrying
    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = Some(max_elapsed);
        self
    }

    fn exhausted(&self, retries_done: u32) -> bool {
        self.max_retries.is_some_and(|max| retries_done >= max)
    }
}

/// Delay sequence for one retried call
#[derive(Debug)]
struct Backoff {
    next: Duration,
    min: Duration,
    max: Duration,
    multiplier: f64,
}

impl Backoff {
    fn new(config: &RetryConfig) -> Self {
        let max = config.max_delay.max(config.initial_delay);
        Self {
            next: config.initial_delay,
            min: config.initial_delay,
            max,
            multiplier: config.backoff_multiplier,
        }
    }

    /// Returns the delay to wait now and advances to the next one.
    fn next_delay(&mut self) -> Duration {
        let current = self.next;

        let grown_ms = (self.next.as_millis() as f64 * self.multiplier) as u64;
        let base = Duration::from_millis(grown_ms).min(self.max);

        // ±20% jitter, kept inside [min, max]
        let jitter_factor = rand::thread_rng().gen_range(0.8..=1.2);
        let jittered = Duration::from_millis((base.as_millis() as f64 * jitter_factor) as u64);
        self.next = jittered.clamp(self.min, self.max);

        current
    }
}

/// Retry an async operation with exponential backoff
///
/// # Arguments
///
/// * `config` - Retry configuration
/// * `operation` - Async closure that returns Result<T, E>
/// * `is_retryable` - Function to determine if an error is worth retrying
///
/// # Example
///
/// ```ignore
/// use risco_cloud::utils::retry::{retry_with_backoff, RetryConfig};
///
/// let overview = retry_with_backoff(
///     RetryConfig::default(),
///     || manager.authenticated_post(Endpoint::Overview, WireForm::new()),
///     RiscoError::is_retryable,
/// ).await?;
/// ```
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    config: RetryConfig,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let started = Instant::now();
    let mut backoff = Backoff::new(&config);
    let mut retries: u32 = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !is_retryable(&err) || config.exhausted(retries) {
                    return Err(err);
                }

                let delay = backoff.next_delay();
                if let Some(limit) = config.max_elapsed {
                    if started.elapsed() + delay > limit {
                        tracing::warn!(
                            attempts = retries + 1,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Giving up: retry time budget spent"
                        );
                        return Err(err);
                    }
                }

                retries += 1;
                tracing::warn!(
                    attempt = retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Remote call failed, backing off"
                );
                sleep(delay).await;
            }
        }
    }
}
