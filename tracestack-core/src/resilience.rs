// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Resilience primitives (retry policy + bulkhead).

use rand::random;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{AcquireError, Semaphore, SemaphorePermit};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl RetryPolicy {
    pub fn exponential() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }

    /// Single attempt, no backoff
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let jitter_factor = 1.0 + (random::<f64>() - 0.5) * 2.0 * self.jitter;
        let jittered = (base * jitter_factor).max(0.0);
        let clamped = jittered.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(clamped)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_attempts` is used up. The last error is returned.
    pub async fn run<F, Fut, T, E, R>(&self, is_retryable: R, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < attempts && is_retryable(&e) => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::debug!(attempt, error = %e, ?delay, "Retrying after error");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Bulkhead bounding how many calls run at once against a backend.
///
/// Callers wait for a permit rather than being rejected.
pub struct Bulkhead {
    semaphore: Semaphore,
    name: String,
}

impl Bulkhead {
    pub fn new(name: impl Into<String>, max_concurrent: usize) -> Self {
        Self {
            semaphore: Semaphore::new(max_concurrent.max(1)),
            name: name.into(),
        }
    }

    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, AcquireError> {
        self.semaphore.acquire().await
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_is_clamped() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::exponential()
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<u32, String> = RetryPolicy::exponential()
            .run(
                |_| true,
                move || async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(format!("attempt {}", n))
                    } else {
                        Ok(n)
                    }
                },
            )
            .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausts() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), String> = RetryPolicy::exponential()
            .run(
                |_| true,
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("down".to_string())
                },
            )
            .await;
        assert_eq!(result, Err("down".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), String> = RetryPolicy::exponential()
            .run(
                |e: &String| e != "fatal",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("fatal".to_string())
                },
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bulkhead_limits_permits() {
        let bulkhead = Bulkhead::new("segments", 2);
        let a = bulkhead.acquire().await.unwrap();
        let _b = bulkhead.acquire().await.unwrap();
        assert_eq!(bulkhead.available(), 0);
        drop(a);
        assert_eq!(bulkhead.available(), 1);
        assert_eq!(bulkhead.name(), "segments");
    }
}
