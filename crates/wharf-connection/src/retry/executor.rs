use std::future::Future;

use wharf_core::{Context, Result, WharfError};

use super::policy::RetryConfig;

/// Run `operation` until it succeeds, retries run out, or `ctx` finishes.
///
/// The first attempt always runs. After a failure:
/// - if retries remain, `on_retry` is called with the failed attempt;
/// - if `ctx` is cancelled or past its deadline, that error is returned and
///   takes precedence over exhaustion;
/// - if no retries remain, the last error is returned as-is when
///   `max_attempts` is 0 and wrapped in [`WharfError::AttemptsExhausted`]
///   otherwise;
/// - else the strategy's delay is slept, racing `ctx`.
///
/// An invalid config fails before any attempt.
pub async fn retry<T, F, Fut>(ctx: &Context, config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut(Context) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let strategy = config.validate()?;
    strategy.reset();

    let mut attempt: u32 = 0;
    loop {
        if let Some(err) = ctx.err().filter(|_| attempt > 0) {
            return Err(err.into());
        }

        let err = match operation(ctx.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let exhausted = attempt >= config.max_attempts;
        if let Some(on_retry) = config.on_retry.as_ref().filter(|_| !exhausted) {
            on_retry(attempt, &err);
        }

        if let Some(cancelled) = ctx.err() {
            tracing::debug!(attempt, error = %err, "retry aborted by context");
            return Err(cancelled.into());
        }

        if exhausted {
            if config.max_attempts == 0 {
                return Err(err);
            }
            return Err(WharfError::AttemptsExhausted {
                attempts: config.max_attempts.saturating_add(1),
                source: Box::new(err),
            });
        }

        let delay = strategy.next_delay(attempt);
        tracing::debug!(attempt, delay = ?delay, "waiting before retry");
        tokio::select! {
            biased;
            cancelled = ctx.done() => return Err(cancelled.into()),
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }
}
