//! Usage: Bounded readiness wait (sleep-then-probe loop over an injected probe).

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadyOutcome {
    Ready,
    TimedOut,
}

/// Polls `probe` up to `attempts` times, sleeping `interval` before each try.
/// Total wall-clock bound: `attempts * interval` (plus probe overhead).
pub(crate) async fn wait_until_ready<F, Fut>(
    attempts: u32,
    interval: Duration,
    mut probe: F,
) -> ReadyOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..attempts {
        tokio::time::sleep(interval).await;
        if probe().await {
            return ReadyOutcome::Ready;
        }
    }
    ReadyOutcome::TimedOut
}
