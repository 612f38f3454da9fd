use crate::core::event::EventKind;
use crate::core::event_bus::EventBus;
use crate::core::line::Line;
use crate::core::snapshot::SnapshotManager;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Capture the line into `snapshots` every `interval` until cancelled.
///
/// A failed capture is logged and skipped; the next tick tries again.
pub async fn run_snapshot_ticker(
    line: Arc<Line>,
    snapshots: Arc<SnapshotManager>,
    bus: Arc<EventBus>,
    interval: Duration,
    cancel: CancellationToken,
) {
    info!("[Snapshots] Ticker started, interval {:?}", interval);
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => match snapshots.capture_from(&line) {
                Ok(stored) => bus.publish(EventKind::SnapshotCaptured { stored }),
                Err(e) => error!("[Snapshots] Capture skipped: {}", e),
            },
        }
    }
    info!("[Snapshots] Ticker stopped");
}
