// src/retry.rs
//! Bounded retry with exponential backoff.
//!
//! One combinator shared by the translation and source-fetch call sites:
//! - `max_retries` additional attempts after the first,
//! - sleep `base_delay * 2^attempt` between attempts,
//! - a terminal-error predicate that stops retrying immediately (e.g. a
//!   translation quota error, where waiting cannot help).

use std::future::Future;
use std::time::Duration;

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Backoff before retry number `attempt` (0-based): `base * 2^attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }
}

/// Run `op` until it succeeds, a terminal error occurs, or the retry budget
/// is spent. Returns the last error when the budget runs out.
///
/// `op` receives the 0-based attempt number.
pub async fn retry<T, E, F, Fut, P>(policy: RetryPolicy, is_terminal: P, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if is_terminal(&err) || attempt >= policy.max_retries {
                    return Err(err);
                }
                tokio::time::sleep(policy.backoff_delay(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let p = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(p.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(p.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(p.backoff_delay(2), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let out: Result<u32, &str> = retry(fast_policy(), |_| false, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err("transient")
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(out, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let out: Result<(), &str> = retry(
            fast_policy(),
            |e| *e == "terminal",
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("terminal") }
            },
        )
        .await;
        assert_eq!(out, Err("terminal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn budget_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let out: Result<(), u32> = retry(fast_policy(), |_| false, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(attempt) }
        })
        .await;
        // first call + 3 retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(out, Err(3));
    }
}
