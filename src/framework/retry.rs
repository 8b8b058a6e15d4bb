//! Conflict retry and polling
//!
//! `retry_on_conflict` wraps the read-modify-write cycle used for updates: the
//! closure re-reads the object, mutates it and submits it. A 409 from the API
//! server means another writer won the race; the closure is simply run again
//! after a short backoff.
//!
//! `poll` / `poll_immediate` evaluate an async boolean condition at a fixed
//! interval until it holds or the timeout expires.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Backoff schedule: `steps` attempts, waiting `duration` after the first failure
/// and multiplying the wait by `factor` after each subsequent one
#[derive(Clone, Debug, PartialEq)]
pub struct Backoff {
    /// Maximum number of attempts
    pub steps: u32,
    /// Wait after the first failed attempt
    pub duration: Duration,
    /// Multiplier applied to the wait after each step (1.0 = constant)
    pub factor: f64,
    /// Random extra wait, as a fraction of the current wait (0.0 to 1.0)
    pub jitter: f64,
    /// Upper bound on the un-jittered wait
    pub cap: Option<Duration>,
}

impl Backoff {
    /// Schedule used for conflict retries: five attempts, ~10ms apart
    pub fn default_retry() -> Self {
        Self {
            steps: 5,
            duration: Duration::from_millis(10),
            factor: 1.0,
            jitter: 0.1,
            cap: None,
        }
    }

    /// Steeper schedule for calls that are expected to contend: 10ms, 50ms, 250ms
    pub fn default_backoff() -> Self {
        Self {
            steps: 4,
            duration: Duration::from_millis(10),
            factor: 5.0,
            jitter: 0.1,
            cap: None,
        }
    }

    /// Un-jittered wait after failed attempt `attempt` (0-based)
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = if self.factor > 0.0 { self.factor } else { 1.0 };
        let secs = self.duration.as_secs_f64() * factor.powi(attempt as i32);
        let delay = Duration::from_secs_f64(secs.max(0.0));
        match self.cap {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Wait after failed attempt `attempt`, with jitter applied
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let extra = rand::rng().random_range(0.0..1.0) * self.jitter * base.as_secs_f64();
        base + Duration::from_secs_f64(extra)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::default_retry()
    }
}

/// Run `op` until it succeeds, retrying errors for which `retriable` holds
///
/// A non-retriable error is returned immediately. When the schedule is
/// exhausted the last retriable error is returned.
pub async fn retry_on_error<T, E, F, Fut, R>(
    backoff: &Backoff,
    retriable: R,
    mut op: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let steps = backoff.steps.max(1);
    let mut attempt = 0u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if retriable(&e) && attempt + 1 < steps => {
                let delay = backoff.delay_for_attempt(attempt);
                debug!(
                    attempt = attempt + 1,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Retriable error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if retriable(&e) {
                    warn!(attempts = attempt + 1, error = %e, "Giving up after retries");
                }
                return Err(e);
            }
        }
    }
}

/// Run a get-mutate-update closure, retrying when the update conflicts
pub async fn retry_on_conflict<T, F, Fut>(backoff: &Backoff, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_on_error(backoff, Error::is_conflict, op).await
}

/// Evaluate `condition` immediately, then every `interval`, until it returns true
///
/// An error from the condition aborts the poll.
pub async fn poll_immediate<F, Fut>(
    interval: Duration,
    timeout: Duration,
    what: &str,
    condition: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    poll_until(interval, timeout, what, true, condition).await
}

/// Like [`poll_immediate`], but waits one interval before the first evaluation
pub async fn poll<F, Fut>(interval: Duration, timeout: Duration, what: &str, condition: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    poll_until(interval, timeout, what, false, condition).await
}

async fn poll_until<F, Fut>(
    interval: Duration,
    timeout: Duration,
    what: &str,
    immediate: bool,
    mut condition: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + timeout;

    if !immediate {
        tokio::time::sleep(interval).await;
    }

    loop {
        if condition().await? {
            return Ok(());
        }
        if Instant::now() + interval > deadline {
            return Err(Error::timeout(what, timeout));
        }
        tokio::time::sleep(interval).await;
    }
}
