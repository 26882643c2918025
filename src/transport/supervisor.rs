use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{EventStreamTransport, PollingTransport, Transport, TransportEvent, UpdateSource};

/// Owns the transport lifecycle: `Disconnected -> Connecting -> Live(push) |
/// Live(poll)`.
///
/// The two channels run sequentially in one task, so exactly one is live at
/// any time and a (re)connect can never leave a stale subscription behind.
/// Flipping the shutdown watch cancels whichever loop is live.
pub struct TransportSupervisor;

impl TransportSupervisor {
    pub fn spawn(
        source: Arc<dyn UpdateSource>,
        poll_period: Duration,
        include_log: bool,
        tx: mpsc::Sender<TransportEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut push = EventStreamTransport::new(Arc::clone(&source));
            info!(mode = ?push.mode(), "Connecting push channel");
            match push.run(&tx, &mut shutdown).await {
                Ok(()) => return,
                Err(err) => {
                    warn!(error = ?err, "Push channel unavailable, falling back to polling")
                }
            }
            if *shutdown.borrow() {
                return;
            }

            let mut poll = PollingTransport::new(source, poll_period, include_log);
            info!(
                mode = ?poll.mode(),
                period_secs = poll_period.as_secs(),
                "Polling transport live"
            );
            if let Err(err) = poll.run(&tx, &mut shutdown).await {
                warn!(error = ?err, "Polling transport stopped");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gshare_client::{Snapshot, StateDto};
    use crate::transport::testing::FakeSource;

    fn snapshot() -> Snapshot {
        Snapshot::from_dto(StateDto::default())
    }

    #[tokio::test(start_paused = true)]
    async fn push_outage_fails_over_to_polling() {
        let source = Arc::new(FakeSource::new());
        // Push first paint succeeds, then every event wait fails and the
        // supervisor switches to polling, which keeps delivering snapshots.
        source.push_snapshot(snapshot());
        source.push_log("log");
        source.push_snapshot(snapshot());
        source.push_snapshot(snapshot());

        let (tx, mut rx) = mpsc::channel(32);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = TransportSupervisor::spawn(
            source.clone(),
            Duration::from_secs(1),
            false,
            tx,
            shutdown_rx,
        );

        // Enough paused time for the push retry budget and a few poll ticks.
        tokio::time::sleep(Duration::from_secs(20)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let mut snapshots = 0;
        let mut logs = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                TransportEvent::Snapshot(_) => snapshots += 1,
                TransportEvent::Log(_) => logs += 1,
                TransportEvent::Transcode(_) => {}
            }
        }
        assert_eq!(snapshots, 3);
        assert_eq!(logs, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_the_live_transport() {
        let source = Arc::new(FakeSource::new());
        source.push_snapshot(snapshot());
        source.push_log("log");
        // One successful wait that reports no activity keeps the push
        // channel alive until shutdown.
        for _ in 0..200 {
            source.push_wait(crate::gshare_client::EventWaitResult::default());
        }

        let (tx, _rx) = mpsc::channel(32);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = TransportSupervisor::spawn(
            source,
            Duration::from_secs(1),
            false,
            tx,
            shutdown_rx,
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
