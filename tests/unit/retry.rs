//! Unit tests for conflict retry and polling
//!
//! These run on paused tokio time, so backoff sleeps and poll intervals
//! complete instantly while `Instant` arithmetic still reflects them.

use std::fmt;
use std::time::Duration;

use kube_conformance::Error;
use kube_conformance::framework::{Backoff, poll, poll_immediate, retry_on_error};
use tokio::time::Instant;

#[derive(Debug, PartialEq)]
enum TestError {
    Conflict(u32),
    Fatal,
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::Conflict(n) => write!(f, "conflict on attempt {n}"),
            TestError::Fatal => f.write_str("fatal"),
        }
    }
}

fn is_conflict(e: &TestError) -> bool {
    matches!(e, TestError::Conflict(_))
}

mod retry_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_conflicts() {
        let mut calls = 0u32;
        let result = retry_on_error(&Backoff::default_retry(), is_conflict, || {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt < 3 {
                    Err(TestError::Conflict(attempt))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retriable_error_returns_immediately() {
        let mut calls = 0u32;
        let result: Result<(), _> = retry_on_error(&Backoff::default_retry(), is_conflict, || {
            calls += 1;
            async { Err(TestError::Fatal) }
        })
        .await;

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_conflict() {
        let mut calls = 0u32;
        let result: Result<(), _> = retry_on_error(&Backoff::default_retry(), is_conflict, || {
            calls += 1;
            let attempt = calls;
            async move { Err(TestError::Conflict(attempt)) }
        })
        .await;

        assert_eq!(result, Err(TestError::Conflict(5)));
        assert_eq!(calls, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule_is_slept() {
        let backoff = Backoff {
            jitter: 0.0,
            ..Backoff::default_backoff()
        };
        let start = Instant::now();
        let result: Result<(), _> = retry_on_error(&backoff, is_conflict, || async {
            Err(TestError::Conflict(0))
        })
        .await;

        assert!(result.is_err());
        // 10ms + 50ms + 250ms between four attempts
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(310), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(320), "{elapsed:?}");
    }

    #[test]
    fn test_default_schedules() {
        let retry = Backoff::default_retry();
        assert_eq!(retry.steps, 5);
        assert_eq!(retry.duration, Duration::from_millis(10));
        assert_eq!(Backoff::default(), retry);

        let backoff = Backoff::default_backoff();
        assert_eq!(backoff.steps, 4);
        assert_eq!(backoff.base_delay(2), Duration::from_millis(250));
    }
}

mod poll_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_poll_immediate_checks_before_sleeping() {
        let start = Instant::now();
        poll_immediate(Duration::from_secs(1), Duration::from_secs(10), "ready", || async {
            Ok(true)
        })
        .await
        .unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_sleeps_one_interval_first() {
        let start = Instant::now();
        poll(Duration::from_secs(2), Duration::from_secs(20), "ready", || async {
            Ok(true)
        })
        .await
        .unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_condition_holds() {
        let mut calls = 0u32;
        poll_immediate(Duration::from_secs(1), Duration::from_secs(10), "third check", || {
            calls += 1;
            let done = calls == 3;
            async move { Ok(done) }
        })
        .await
        .unwrap();
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out() {
        let start = Instant::now();
        let err = poll_immediate(
            Duration::from_secs(1),
            Duration::from_secs(5),
            "never",
            || async { Ok(false) },
        )
        .await
        .unwrap_err();

        match err {
            Error::Timeout { what, timeout } => {
                assert_eq!(what, "never");
                assert_eq!(timeout, Duration::from_secs(5));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(start.elapsed() <= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_condition_error_aborts() {
        let mut calls = 0u32;
        let err = poll_immediate(Duration::from_secs(1), Duration::from_secs(10), "failing", || {
            calls += 1;
            async { Err(Error::Precondition("gone".to_string())) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Precondition(_)));
        assert_eq!(calls, 1);
    }
}
