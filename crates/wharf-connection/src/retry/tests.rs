//! Tests for the retry module

use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wharf_core::{Context, ContextError, ErrorCode, WharfError};

fn fixed(min_ms: u64, max_ms: u64, factor: f64) -> ExponentialBackoff {
    ExponentialBackoff::new(ExponentialBackoffConfig {
        min: Duration::from_millis(min_ms),
        max: Duration::from_millis(max_ms),
        factor,
        jitter: false,
    })
}

fn transient(call: u32) -> WharfError {
    WharfError::OpenFailed {
        resource: "test",
        source: format!("refused on call {}", call).into(),
    }
}

mod backoff_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exponential_growth_and_cap() {
        let backoff = fixed(1_000, 30_000, 2.0);

        let expected = [
            (0, 1),
            (1, 2),
            (2, 4),
            (3, 8),
            (4, 16),
            (5, 30),
            (10, 30),
        ];
        for (attempt, secs) in expected {
            assert_eq!(
                backoff.next_delay(attempt),
                Duration::from_secs(secs),
                "attempt {}",
                attempt
            );
        }
    }

    #[test]
    fn test_exponential_huge_attempt_stays_at_max() {
        let backoff = fixed(1_000, 30_000, 2.0);
        assert_eq!(backoff.next_delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_exponential_large_max_keeps_growing() {
        let backoff = fixed(1_000, u64::MAX, 2.0);
        assert_eq!(backoff.next_delay(40), Duration::from_secs(1 << 40));
        assert_eq!(backoff.next_delay(u32::MAX), backoff.max_delay());
    }

    #[test]
    fn test_exponential_jitter_saturates_near_duration_max() {
        let backoff = ExponentialBackoff::new(ExponentialBackoffConfig {
            min: Duration::from_secs(1),
            max: Duration::MAX,
            factor: 2.0,
            jitter: true,
        });

        for _ in 0..50 {
            let delay = backoff.next_delay(2_000);
            assert!(delay >= Duration::MAX / 3, "delay {:?} collapsed", delay);
        }
    }

    #[test]
    fn test_exponential_jitter_range() {
        let backoff = ExponentialBackoff::new(ExponentialBackoffConfig {
            min: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: true,
        });

        for _ in 0..100 {
            let delay = backoff.next_delay(1);
            assert!(
                delay >= Duration::from_secs(1) && delay <= Duration::from_secs(3),
                "delay {:?} should be between 1s and 3s",
                delay
            );
        }
    }

    #[test]
    fn test_exponential_jitter_may_exceed_max() {
        let backoff = ExponentialBackoff::new(ExponentialBackoffConfig {
            min: Duration::from_secs(1),
            max: Duration::from_secs(4),
            factor: 2.0,
            jitter: true,
        });

        for _ in 0..100 {
            let delay = backoff.next_delay(10);
            assert!(delay >= Duration::from_secs(2) && delay <= Duration::from_secs(6));
        }
    }

    #[test]
    fn test_exponential_defaults() {
        let backoff = ExponentialBackoff::default();
        assert_eq!(backoff.min_delay(), Duration::from_millis(500));
        assert_eq!(backoff.max_delay(), Duration::from_secs(30));
        assert_eq!(backoff.factor(), 2.0);
        assert!(backoff.has_jitter());

        let delay = backoff.next_delay(0);
        assert!(delay >= Duration::from_millis(250) && delay <= Duration::from_millis(750));
    }

    #[test]
    fn test_exponential_normalization() {
        let zeroed = ExponentialBackoff::new(ExponentialBackoffConfig {
            min: Duration::ZERO,
            max: Duration::ZERO,
            factor: 0.0,
            jitter: false,
        });
        assert_eq!(zeroed.min_delay(), Duration::from_millis(500));
        assert_eq!(zeroed.max_delay(), Duration::from_secs(30));
        assert_eq!(zeroed.factor(), 2.0);

        let shrinking = fixed(100, 1_000, 0.5);
        assert_eq!(shrinking.factor(), 1.0);
        assert_eq!(shrinking.next_delay(5), Duration::from_millis(100));

        let inverted = fixed(2_000, 1_000, 2.0);
        assert_eq!(inverted.max_delay(), Duration::from_secs(2));
        assert_eq!(inverted.next_delay(3), Duration::from_secs(2));
    }

    #[test]
    fn test_linear_growth_and_cap() {
        let backoff = LinearBackoff::new(Duration::from_secs(2), Duration::from_secs(10));

        let expected = [(0, 2), (1, 4), (2, 6), (3, 8), (4, 10), (5, 10)];
        for (attempt, secs) in expected {
            assert_eq!(backoff.next_delay(attempt), Duration::from_secs(secs));
        }
        assert_eq!(backoff.next_delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_linear_defaults() {
        let zero_increment = LinearBackoff::new(Duration::ZERO, Duration::from_secs(5));
        assert_eq!(zero_increment.next_delay(0), Duration::from_secs(1));

        let low_max = LinearBackoff::new(Duration::from_secs(10), Duration::from_secs(5));
        assert_eq!(low_max.max_delay(), Duration::from_secs(10));
        assert_eq!(low_max.next_delay(0), Duration::from_secs(10));
    }

    #[test]
    fn test_constant() {
        let backoff = ConstantBackoff::new(Duration::from_secs(5));
        for attempt in 0..10 {
            assert_eq!(backoff.next_delay(attempt), Duration::from_secs(5));
        }

        let zero = ConstantBackoff::new(Duration::ZERO);
        assert_eq!(zero.next_delay(0), Duration::from_secs(1));
    }

    #[test]
    fn test_reset_is_noop() {
        let strategies: Vec<Arc<dyn Backoff>> = vec![
            Arc::new(fixed(500, 30_000, 2.0)),
            Arc::new(ConstantBackoff::new(Duration::from_secs(1))),
            Arc::new(LinearBackoff::new(Duration::from_secs(1), Duration::from_secs(10))),
        ];
        for strategy in strategies {
            let before = strategy.next_delay(2);
            strategy.reset();
            assert_eq!(strategy.next_delay(2), before);
        }
    }

    #[test]
    fn test_shared_across_threads() {
        let backoff: Arc<dyn Backoff> = Arc::new(ExponentialBackoff::default());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let backoff = Arc::clone(&backoff);
                std::thread::spawn(move || {
                    for attempt in 0..100 {
                        let delay = backoff.next_delay(attempt);
                        assert!(delay <= Duration::from_secs(45));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}

mod policy_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_strategy_is_invalid() {
        let config = RetryConfig {
            max_attempts: 3,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, WharfError::RetryConfig(_)));
        assert_eq!(err.code(), ErrorCode::Invalid);
    }

    #[test]
    fn test_zero_attempts_is_valid() {
        let config = RetryConfig::new(0, ExponentialBackoff::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_hides_callback() {
        let config = RetryConfig::new(2, ConstantBackoff::new(Duration::from_millis(1)))
            .with_on_retry(|_, _| {});
        let debug = format!("{:?}", config);
        assert!(debug.contains("max_attempts: 2"));
        assert!(debug.contains("<callback>"));
    }
}

mod executor_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn constant(max_attempts: u32) -> RetryConfig {
        RetryConfig::new(max_attempts, ConstantBackoff::new(Duration::from_millis(100)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let calls = AtomicU32::new(0);
        let value = retry(&Context::background(), &constant(3), |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("ok")
        })
        .await
        .unwrap();

        assert_eq!(value, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retries() {
        let calls = AtomicU32::new(0);
        let result = retry(&Context::background(), &constant(3), |_| async {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < 3 { Err(transient(call)) } else { Ok(call) }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_wraps_last_error() {
        let calls = AtomicU32::new(0);
        let err = retry(&Context::background(), &constant(3), |_| async {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err::<(), _>(transient(call))
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(matches!(err, WharfError::AttemptsExhausted { attempts: 4, .. }));
        assert_eq!(err.to_string(), "operation failed after 4 attempts");
        match err.root_cause() {
            WharfError::OpenFailed { source, .. } => {
                assert_eq!(source.to_string(), "refused on call 4")
            }
            other => panic!("unexpected root cause: {:?}", other),
        }
        assert_eq!(err.code(), ErrorCode::InfraError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_returns_error_unchanged() {
        let calls = AtomicU32::new(0);
        let err = retry(&Context::background(), &constant(0), |_| async {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err::<(), _>(transient(call))
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, WharfError::OpenFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_retry_indices() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let config = constant(3).with_on_retry(move |attempt, err| {
            recorder.lock().unwrap().push((attempt, err.to_string()));
        });

        let result = retry(&Context::background(), &config, |_| async {
            Err::<(), _>(transient(0))
        })
        .await;

        assert!(result.is_err());
        let seen = seen.lock().unwrap();
        let indices: Vec<u32> = seen.iter().map(|(attempt, _)| *attempt).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(seen.iter().all(|(_, msg)| msg == "failed to open test connection"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_makes_no_attempts() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 3,
            ..Default::default()
        };

        let err = retry(&Context::background(), &config, |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, WharfError::RetryConfig(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_cancelled_context_runs_once() {
        let ctx = Context::background();
        ctx.cancel();

        let calls = AtomicU32::new(0);
        let err = retry(&ctx, &constant(3), |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(transient(0))
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, WharfError::Context(ContextError::Cancelled)));
        assert!(err.is_cancellation());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_cancelled_context_reports_failed_attempt() {
        let ctx = Context::background();
        ctx.cancel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let config = constant(3).with_on_retry(move |attempt, _| {
            recorder.lock().unwrap().push(attempt);
        });
        let started = tokio::time::Instant::now();

        let err = retry(&ctx, &config, |_| async { Err::<(), _>(transient(0)) })
            .await
            .unwrap_err();

        assert!(err.is_cancellation());
        assert_eq!(*seen.lock().unwrap(), vec![0]);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let ctx = Context::background();
        let canceller = ctx.clone();
        let config = constant(10).with_on_retry(move |attempt, _| {
            if attempt == 1 {
                canceller.cancel();
            }
        });

        let calls = AtomicU32::new(0);
        let err = retry(&ctx, &config, |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(transient(0))
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(err, WharfError::Context(ContextError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_backoff_short() {
        let ctx = Context::background().with_timeout(Duration::from_millis(250));
        let started = tokio::time::Instant::now();

        let calls = AtomicU32::new(0);
        let err = retry(&ctx, &constant(10), |_| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(transient(0))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, WharfError::Context(ContextError::DeadlineExceeded)));
        assert_eq!(err.code(), ErrorCode::DeadlineExceeded);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() <= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_receives_context() {
        let ctx = Context::background().with_timeout(Duration::from_secs(5));
        let deadline = ctx.deadline();

        let seen = retry(&ctx, &constant(0), |attempt_ctx| async move {
            Ok(attempt_ctx.deadline())
        })
        .await
        .unwrap();

        assert_eq!(seen, deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logged_policy_warns_per_retry() {
        let config = RetryConfig::logged(
            "postgres",
            2,
            ExponentialBackoffConfig {
                min: Duration::from_millis(10),
                max: Duration::from_millis(100),
                factor: 2.0,
                jitter: false,
            },
        );
        let seen = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&seen);
        let config = RetryConfig {
            on_retry: config.on_retry.clone().map(|inner| {
                Arc::new(move |attempt: u32, err: &WharfError| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    inner(attempt, err);
                }) as RetryCallback
            }),
            ..config
        };

        let result = retry(&Context::background(), &config, |_| async {
            Err::<(), _>(transient(0))
        })
        .await;

        assert!(matches!(
            result,
            Err(WharfError::AttemptsExhausted { attempts: 3, .. })
        ));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
