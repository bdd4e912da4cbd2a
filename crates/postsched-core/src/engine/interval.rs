//! Repeat-every-N primitive shared by the background loops

use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

/// Run `task` now and then once per `period` until shutdown
///
/// - The first cycle starts immediately.
/// - A cycle that overruns pushes the schedule back instead of triggering a
///   burst of catch-up cycles.
/// - Shutdown is only observed between cycles; a cycle in progress always
///   completes. Dropping the sender counts as a shutdown signal.
///
/// Without a shutdown receiver the loop never returns.
///
/// # Returns
///
/// The number of cycles that ran.
pub async fn run_every<F, Fut>(
    period: Duration,
    mut shutdown_rx: Option<oneshot::Receiver<()>>,
    mut task: F,
) -> u64
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut cycles = 0;
    loop {
        match shutdown_rx.as_mut() {
            Some(rx) => {
                tokio::select! {
                    biased;
                    _ = rx => break,
                    _ = ticker.tick() => {}
                }
            }
            None => {
                ticker.tick().await;
            }
        }

        task().await;
        cycles += 1;
    }

    cycles
}
