use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::engine::Engine;
use crate::model::StatusMap;
use crate::observability;

/// Receives the full status map whenever some room changed.
pub trait StatusSink: Send + Sync {
    fn render(&self, statuses: &StatusMap);
}

impl<F> StatusSink for F
where
    F: Fn(&StatusMap) + Send + Sync,
{
    fn render(&self, statuses: &StatusMap) {
        self(statuses)
    }
}

/// Owner of a running refresh loop.
pub struct RefreshHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Ask the loop to stop. Calling it again does nothing.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the loop to exit. Call [`Self::stop`] first or this waits forever.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!("refresh loop ended abnormally: {e}");
        }
    }
}

/// Periodically recompute statuses and hand changed maps to `sink`.
///
/// The first tick fires one full `period` after start; the load that
/// preceded this call already computed the current statuses. Ticks missed
/// while the runtime was busy are delayed rather than fired in a burst.
pub fn start_real_time_updates(
    engine: Arc<Engine>,
    clock: Arc<dyn Clock>,
    period: Duration,
    sink: Arc<dyn StatusSink>,
) -> RefreshHandle {
    let token = CancellationToken::new();
    let task = tokio::spawn(refresh_loop(engine, clock, period, sink, token.clone()));
    RefreshHandle { token, task }
}

async fn refresh_loop(
    engine: Arc<Engine>,
    clock: Arc<dyn Clock>,
    period: Duration,
    sink: Arc<dyn StatusSink>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("refresh loop started, every {}ms", period.as_millis());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(statuses) = engine.tick(clock.now_ms()).await {
                    metrics::counter!(observability::RENDERS_TOTAL).increment(1);
                    sink.render(&statuses);
                }
            }
            _ = token.cancelled() => {
                info!("refresh loop stopped");
                break;
            }
        }
    }
}
