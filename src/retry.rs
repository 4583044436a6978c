/*!
 * Copyright (c) 2026 Ming Lyu, aka mingcheng
 *
 * This source code is licensed under the MIT License,
 * which is located in the LICENSE file in the source tree's root directory.
 *
 * File: retry.rs
 * Author: mingcheng <mingcheng@apache.org>
 * File Created: 2026-03-02 11:05:19
 *
 * Modified By: mingcheng <mingcheng@apache.org>
 * Last Modified: 2026-03-05 09:41:52
 */

use crate::error::ProvisionError;
use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Constant-delay retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Fixed wait between attempts.
    pub delay: Duration,
    /// Upper bound for a single attempt, if any.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(1000),
            attempt_timeout: None,
        }
    }
}

pub fn is_cancellation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::Cancelled)
    )
}

async fn run_attempt<T, Fut>(
    attempt: Fut,
    limit: Option<Duration>,
    cancel: &CancellationToken,
) -> anyhow::Result<T>
where
    Fut: Future<Output = anyhow::Result<T>>,
{
    let bounded = async {
        match limit {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .unwrap_or_else(|_| Err(ProvisionError::TimedOut(limit).into())),
            None => attempt.await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProvisionError::Cancelled.into()),
        outcome = bounded => outcome,
    }
}

/// Run `operation`, retrying failures after a fixed delay until the budget is spent.
///
/// At most `retries + 1` invocations and exactly `retries` waits happen before the
/// last error is returned. Cancellation is never retried.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut remaining = policy.retries;
    let mut attempt = 1u32;

    loop {
        if cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled.into());
        }

        let err = match run_attempt(operation(), policy.attempt_timeout, cancel).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if remaining == 0 || is_cancellation(&err) {
            return Err(err);
        }

        warn!(
            "Attempt {} failed: {:#}. Retrying in {:?} ({} left)",
            attempt, err, policy.delay, remaining
        );
        remaining -= 1;
        attempt += 1;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProvisionError::Cancelled.into()),
            _ = tokio::time::sleep(policy.delay) => {}
        }
    }
}

/// Poll `fetch` until it yields a non-empty list or `max_attempts` is reached.
///
/// Fetch errors, including an attempt cut off by `attempt_timeout`, count as an
/// empty attempt. Running out of attempts is not an error: the caller gets an
/// empty list.
pub async fn poll_until_nonempty<T, F, Fut>(
    max_attempts: u32,
    interval: Duration,
    attempt_timeout: Option<Duration>,
    cancel: &CancellationToken,
    mut fetch: F,
) -> anyhow::Result<Vec<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<T>>>,
{
    for attempt in 1..=max_attempts {
        info!("Attempt {}/{} to check emails...", attempt, max_attempts);

        match run_attempt(fetch(), attempt_timeout, cancel).await {
            Ok(items) if !items.is_empty() => {
                info!("{} email(s) found!", items.len());
                return Ok(items);
            }
            Ok(_) => debug!("Inbox still empty"),
            Err(e) => {
                if is_cancellation(&e) {
                    return Err(e);
                }
                warn!("Error checking emails: {:#}", e);
            }
        }

        if attempt < max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProvisionError::Cancelled.into()),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    warn!("Timeout exceeded. No emails received.");
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy(retries: u32, delay_ms: u64) -> RetryPolicy {
        RetryPolicy {
            retries,
            delay: Duration::from_millis(delay_ms),
            attempt_timeout: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausts_budget_with_exact_delays() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: anyhow::Result<()> = retry_with_backoff(
            &policy(3, 1000),
            &CancellationToken::new(),
            || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(anyhow::anyhow!("failure {}", n))
                }
            },
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(3000));
        assert_eq!(result.unwrap_err().to_string(), "failure 4");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_on_first_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result = retry_with_backoff(&policy(3, 500), &CancellationToken::new(), || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 2 {
                    Err(anyhow::anyhow!("not yet"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_zero_budget_runs_once() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: anyhow::Result<()> =
            retry_with_backoff(&policy(0, 1000), &CancellationToken::new(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("down"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_attempt_timeout() {
        let limited = RetryPolicy {
            retries: 1,
            delay: Duration::from_millis(10),
            attempt_timeout: Some(Duration::from_secs(5)),
        };

        let result: anyhow::Result<()> =
            retry_with_backoff(&limited, &CancellationToken::new(), || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProvisionError>(),
            Some(ProvisionError::TimedOut(d)) if *d == Duration::from_secs(5)
        ));
    }

    #[tokio::test]
    async fn test_retry_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicU32::new(0));

        let result: anyhow::Result<()> = retry_with_backoff(&policy(3, 0), &cancel, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert!(matches!(
            result.unwrap_err().downcast_ref::<ProvisionError>(),
            Some(ProvisionError::Cancelled)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_cancelled_during_delay() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let calls = Arc::new(AtomicU32::new(0));

        let result: anyhow::Result<()> = retry_with_backoff(&policy(5, 1000), &cancel, || {
            let calls = calls.clone();
            let trigger = trigger.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                trigger.cancel();
                Err(anyhow::anyhow!("fails and cancels"))
            }
        })
        .await;

        assert!(matches!(
            result.unwrap_err().downcast_ref::<ProvisionError>(),
            Some(ProvisionError::Cancelled)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_returns_empty_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));

        let items: Vec<u32> =
            poll_until_nonempty(3, Duration::ZERO, None, &CancellationToken::new(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Vec::new())
                }
            })
            .await
            .unwrap();

        assert!(items.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_returns_first_nonempty_list() {
        let calls = Arc::new(AtomicU32::new(0));

        let items = poll_until_nonempty(3, Duration::ZERO, None, &CancellationToken::new(), || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(if n == 2 { vec![n, n * 10] } else { Vec::new() })
            }
        })
        .await
        .unwrap();

        assert_eq!(items, vec![2, 20]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_poll_absorbs_fetch_errors() {
        let calls = Arc::new(AtomicU32::new(0));

        let items = poll_until_nonempty(3, Duration::ZERO, None, &CancellationToken::new(), || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(anyhow::anyhow!("provider hiccup"))
                } else {
                    Ok(vec!["mail"])
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(items, vec!["mail"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_sleeps_between_attempts_only() {
        let started = Instant::now();

        let items: Vec<u8> =
            poll_until_nonempty(4, Duration::from_secs(5), None, &CancellationToken::new(), || async {
                Ok(Vec::new())
            })
            .await
            .unwrap();

        assert!(items.is_empty());
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_hung_attempt_counts_as_empty() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let items = poll_until_nonempty(
            3,
            Duration::from_secs(5),
            Some(Duration::from_secs(2)),
            &CancellationToken::new(),
            || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n == 1 {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                    }
                    Ok(if n == 3 { vec![n] } else { Vec::new() })
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(items, vec![3]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(12));
    }

    #[tokio::test]
    async fn test_poll_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: anyhow::Result<Vec<u8>> =
            poll_until_nonempty(3, Duration::from_secs(1), None, &cancel, || async { Ok(Vec::new()) })
                .await;

        assert!(matches!(
            result.unwrap_err().downcast_ref::<ProvisionError>(),
            Some(ProvisionError::Cancelled)
        ));
    }
}
