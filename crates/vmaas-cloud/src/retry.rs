//! Bounded retry executor
//!
//! Every remote call made by the controllers goes through [`retry`]. A
//! [`RetryPolicy`] bounds the loop three ways (attempt count, fixed delay,
//! overall timeout) and whichever limit is reached first wins. Attempts run
//! strictly one after another on the calling task.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Delay, timeout and attempt bound for one logical remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Wait between two attempts
    #[serde(rename = "delay_secs", with = "duration_secs")]
    pub delay: Duration,

    /// Wall-clock budget measured from the first attempt
    #[serde(rename = "timeout_secs", with = "duration_secs")]
    pub timeout: Duration,

    /// Maximum number of attempts
    pub count: u32,
}

impl RetryPolicy {
    pub const fn new(delay: Duration, timeout: Duration, count: u32) -> Self {
        Self {
            delay,
            timeout,
            count,
        }
    }

    /// Policy used while waiting for a cloned instance to become listable
    pub const fn clone_wait() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(600), 10)
    }

    /// Reject policies that can never perform more than one attempt
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(CloudError::InvalidConfig(
                "retry count must be at least 1".to_string(),
            ));
        }
        if self.count > 1 && self.timeout <= self.delay {
            return Err(CloudError::InvalidConfig(format!(
                "retry timeout ({}s) must exceed retry delay ({}s)",
                self.timeout.as_secs(),
                self.delay.as_secs()
            )));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(3), Duration::from_secs(60), 3)
    }
}

/// The two independently configured policies used by the controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicies {
    /// Applied to every remote call unless stated otherwise
    #[serde(default)]
    pub default: RetryPolicy,

    /// Applied to the clone visibility poll
    #[serde(default = "RetryPolicy::clone_wait")]
    pub clone: RetryPolicy,
}

impl RetryPolicies {
    pub fn validate(&self) -> Result<()> {
        self.default
            .validate()
            .map_err(|e| CloudError::InvalidConfig(format!("default policy: {}", e)))?;
        self.clone
            .validate()
            .map_err(|e| CloudError::InvalidConfig(format!("clone policy: {}", e)))
    }
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            default: RetryPolicy::default(),
            clone: RetryPolicy::clone_wait(),
        }
    }
}

/// Run `operation` until it succeeds or `policy` is exhausted
///
/// Returns the first successful value. When attempts run out, or the next
/// attempt could only start after the timeout, the error of the last
/// attempt is returned unchanged. An attempt still running when the timeout
/// elapses is dropped; the previous attempt's error is returned, or a
/// [`CloudError::Transport`] timeout if there was none. Cancellation ends the
/// loop at once with [`CloudError::Cancelled`].
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.count.max(1);
    // An unrepresentable deadline means the timeout never bounds the loop
    let deadline = Instant::now().checked_add(policy.timeout);
    let mut attempt = 0;
    let mut last_error: Option<CloudError> = None;

    loop {
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CloudError::Cancelled),
            _ = sleep_until_deadline(deadline) => {
                tracing::debug!(
                    "Attempt {} still running when timeout of {:?} elapsed",
                    attempt,
                    policy.timeout
                );
                return Err(last_error.unwrap_or_else(|| {
                    CloudError::Transport(format!(
                        "no response within {}s",
                        policy.timeout.as_secs()
                    ))
                }));
            }
            outcome = operation() => outcome,
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => e,
        };

        if attempt >= max_attempts {
            tracing::debug!("Giving up after {} attempts: {}", attempt, err);
            return Err(err);
        }

        let next_attempt = match Instant::now().checked_add(policy.delay) {
            Some(next) if deadline.is_none_or(|deadline| next <= deadline) => next,
            _ => {
                tracing::debug!(
                    "Giving up after {} attempts, timeout of {:?} reached: {}",
                    attempt,
                    policy.timeout,
                    err
                );
                return Err(err);
            }
        };

        tracing::warn!(
            attempt,
            max_attempts,
            "Attempt failed, retrying in {:?}: {}",
            policy.delay,
            err
        );
        last_error = Some(err);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CloudError::Cancelled),
            _ = tokio::time::sleep_until(next_attempt) => {}
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
