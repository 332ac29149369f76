// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry with exponential backoff for Kubernetes API calls.
//!
//! Transient API errors (429, 5xx, connection failures) are retried with jittered
//! exponential backoff. Permanent errors (other 4xx) fail on the first attempt.
//!
//! The retry budget is 30 seconds. A Corefile write that still fails after that
//! is dropped; the next ConfigMap snapshot resets the rewrite table.

use anyhow::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Initial retry interval (100ms)
const INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum interval between retries (5 seconds)
const MAX_INTERVAL_SECS: u64 = 5;

/// Maximum total time to spend retrying (30 seconds)
const MAX_ELAPSED_TIME_SECS: u64 = 30;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Interval handed out by the next call to [`Self::next_backoff`], before jitter
    pub current_interval: Duration,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// Total budget, measured from construction
    pub max_elapsed_time: Option<Duration>,
    pub multiplier: f64,
    /// Jitter range as a fraction of the interval (0.1 = ±10%)
    pub randomization_factor: f64,
    start_time: Instant,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
            start_time: Instant::now(),
        }
    }

    /// Next interval to wait, or `None` once the elapsed budget is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        let interval = self.current_interval;
        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(self.apply_jitter(interval))
    }

    /// Whether the elapsed budget is spent.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.max_elapsed_time
            .is_some_and(|max| self.start_time.elapsed() >= max)
    }

    /// Time since the backoff was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let jittered = rand::thread_rng().gen_range((secs - delta)..=(secs + delta));

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Backoff used for Corefile write-back.
///
/// # Retry Schedule
///
/// Roughly 100ms, 200ms, 400ms, 800ms, 1.6s, 3.2s, then 5s intervals until
/// 30 seconds have elapsed.
#[must_use]
pub fn default_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(MAX_INTERVAL_SECS),
        Some(Duration::from_secs(MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Retry a Kubernetes API call with [`default_backoff`].
///
/// # Errors
///
/// Returns the last error if it is not retryable or the backoff budget runs out.
///
/// # Example
///
/// ```no_run
/// use k8s_openapi::api::core::v1::ConfigMap;
/// use kube::{Api, Client};
/// use keights::reconcilers::retry::retry_api_call;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = Client::try_default().await?;
/// let api: Api<ConfigMap> = Api::namespaced(client, "kube-system");
///
/// let configmap = retry_api_call(
///     || async { api.get("coredns").await },
///     "get configmap kube-system/coredns"
/// ).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_api_call<T, F, Fut>(operation: F, operation_name: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
{
    retry_with_backoff(operation, operation_name, default_backoff()).await
}

/// Retry a Kubernetes API call with a caller-supplied backoff.
///
/// # Errors
///
/// Returns the last error if it is not retryable or `backoff` runs out.
pub async fn retry_with_backoff<T, F, Fut>(
    mut operation: F,
    operation_name: &str,
    mut backoff: ExponentialBackoff,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let e = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?backoff.elapsed(),
                        "Kubernetes API call succeeded after retries"
                    );
                } else {
                    debug!(operation = operation_name, "Kubernetes API call succeeded");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !is_retryable_error(&e) {
            error!(
                operation = operation_name,
                error = %e,
                "Non-retryable Kubernetes API error, failing immediately"
            );
            return Err(e.into());
        }

        let Some(duration) = backoff.next_backoff() else {
            error!(
                operation = operation_name,
                attempt = attempt,
                elapsed = ?backoff.elapsed(),
                error = %e,
                "Backoff exhausted, giving up"
            );
            return Err(anyhow::anyhow!(
                "{operation_name} failed after {attempt} attempts: {e}"
            ));
        };

        warn!(
            operation = operation_name,
            attempt = attempt,
            retry_after = ?duration,
            error = %e,
            "Retryable Kubernetes API error, will retry"
        );
        tokio::time::sleep(duration).await;
    }
}

/// Whether a Kubernetes error is transient.
///
/// 429 and 5xx API responses and service (connection) errors are retried.
/// Everything else, including conflicts and missing resources, is not.
pub(crate) fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(api_err) => api_err.code == 429 || (500..600).contains(&api_err.code),
        kube::Error::Service(_) => true,
        _ => false,
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
