use tokio::time::{Instant, sleep_until};
use wharf_core::Context;

use super::connection::ResilientConnection;
use super::driver::ResourceDriver;

/// Health monitor loop: one `health_check` per period until `ctx` finishes.
///
/// The first check runs one full period after start, and each later one a
/// period after the previous tick. A period too large to schedule never ticks.
pub(super) async fn run<D: ResourceDriver>(conn: ResilientConnection<D>, ctx: Context) {
    let name = conn.name();
    let period = conn.settings().health_check_period;
    tracing::info!(resource = name, period = ?period, "health monitor started");

    let mut next_tick = Instant::now().checked_add(period);
    let mut consecutive_failures: u32 = 0;

    while let Some(tick) = next_tick {
        tokio::select! {
            biased;
            _ = ctx.done() => break,
            _ = sleep_until(tick) => {}
        }
        next_tick = Instant::now().checked_add(period);

        match conn.health_check(&ctx).await {
            Ok(()) => {
                if consecutive_failures > 0 {
                    tracing::info!(
                        resource = name,
                        failed_checks = consecutive_failures,
                        "health check recovered"
                    );
                }
                consecutive_failures = 0;
            }
            Err(err) if err.is_cancellation() => break,
            Err(err) => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                tracing::error!(
                    resource = name,
                    error = %err,
                    consecutive_failures,
                    "health check failed"
                );
            }
        }
    }

    if next_tick.is_none() {
        ctx.done().await;
    }
    tracing::info!(resource = name, "health monitor stopped");
}
