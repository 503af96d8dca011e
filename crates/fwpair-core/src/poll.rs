// ── Bounded polling ──
//
// Registration, pairing and deployment all wait on asynchronous controller
// work. They share this one primitive: check, then sleep on a growing
// interval until the wait budget is spent.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::error::CoreError;

/// How often and for how long to wait on a remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Delay before the second check.
    #[serde(with = "secs")]
    pub interval: Duration,
    /// Total wait budget measured from the first check.
    #[serde(with = "secs")]
    pub max_wait: Duration,
    /// Interval multiplier applied after every pending check (1.0 = fixed).
    pub backoff: f64,
    /// Upper bound for the grown interval.
    #[serde(with = "secs")]
    pub max_interval: Duration,
}

impl PollPolicy {
    /// Fixed-interval policy.
    pub const fn fixed(interval: Duration, max_wait: Duration) -> Self {
        Self {
            interval,
            max_wait,
            backoff: 1.0,
            max_interval: interval,
        }
    }

    /// Device registration: slow, the device pulls its initial policy.
    pub const fn registration() -> Self {
        Self::fixed(Duration::from_secs(30), Duration::from_secs(30 * 60))
    }

    /// HA pair formation.
    pub const fn pairing() -> Self {
        Self::fixed(Duration::from_secs(10), Duration::from_secs(30 * 60))
    }

    /// Deployment job completion.
    pub const fn deployment() -> Self {
        Self::fixed(Duration::from_secs(10), Duration::from_secs(10 * 60))
    }

    /// Unusable factors (NaN, infinite, overflowing) saturate at `max_interval`.
    fn next_interval(&self, current: Duration) -> Duration {
        if self.backoff <= 1.0 {
            return current;
        }
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff)
            .map_or(self.max_interval, |grown| grown.min(self.max_interval))
    }
}

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    Ready(T),
    Pending,
}

/// Run `check` until it reports [`Poll::Ready`] or `policy.max_wait` elapses.
///
/// Check errors end the wait immediately. Exhausting the budget yields
/// [`CoreError::Timeout`] naming `what`.
pub async fn poll_until<T>(
    policy: &PollPolicy,
    what: &str,
    mut check: impl AsyncFnMut() -> Result<Poll<T>, CoreError>,
) -> Result<T, CoreError> {
    let started = Instant::now();
    let mut interval = policy.interval;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        if let Poll::Ready(value) = check().await? {
            debug!(what, attempt, "poll ready");
            return Ok(value);
        }

        let waited = started.elapsed();
        if waited >= policy.max_wait {
            return Err(CoreError::Timeout {
                operation: what.to_owned(),
                waited,
            });
        }

        let sleep = interval.min(policy.max_wait - waited);
        debug!(what, attempt, waited_secs = waited.as_secs(), "still pending");
        tokio::time::sleep(sleep).await;
        interval = policy.next_interval(interval);
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
