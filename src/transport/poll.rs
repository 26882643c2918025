use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::types::AgentError;

use super::{Transport, TransportEvent, TransportMode, UpdateSource};

/// Fallback channel: fixed-period state fetch, with an optional log fetch
/// per tick. A failed tick just waits for the next one.
pub struct PollingTransport {
    source: Arc<dyn UpdateSource>,
    period: Duration,
    include_log: bool,
}

impl PollingTransport {
    pub fn new(source: Arc<dyn UpdateSource>, period: Duration, include_log: bool) -> Self {
        Self {
            source,
            period: period.max(Duration::from_millis(100)),
            include_log,
        }
    }
}

#[async_trait]
impl Transport for PollingTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Poll
    }

    async fn run(
        &mut self,
        tx: &mpsc::Sender<TransportEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), AgentError> {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                _ = ticker.tick() => {
                    match self.source.fetch_snapshot().await {
                        Ok(snapshot) => {
                            if tx.send(TransportEvent::Snapshot(snapshot)).await.is_err() {
                                return Ok(());
                            }
                        }
                        Err(err) => {
                            debug!(error = ?err, "Periodic state fetch failed, waiting for next tick");
                            continue;
                        }
                    }

                    if self.include_log {
                        match self.source.fetch_log().await {
                            Ok(log) => {
                                if tx.send(TransportEvent::Log(log)).await.is_err() {
                                    return Ok(());
                                }
                            }
                            Err(err) => debug!(error = ?err, "Periodic log fetch failed"),
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gshare_client::{Snapshot, StateDto};

    fn snapshot() -> Snapshot {
        Snapshot::from_dto(StateDto::default())
    }

    #[tokio::test(start_paused = true)]
    async fn polls_each_tick_and_survives_failures() {
        let source = Arc::new(super::super::testing::FakeSource::new());
        source.push_snapshot(snapshot());
        // Second tick has nothing queued -> fetch fails -> loop keeps going.
        source.push_snapshot(snapshot());

        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let mut transport = PollingTransport::new(source.clone(), Duration::from_secs(1), false);

        let driver = tokio::spawn(async move { transport.run(&tx, &mut shutdown_rx).await });

        // Three periods: two successful fetches and one failed one in between.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        shutdown_tx.send(true).unwrap();
        let result = driver.await.unwrap();
        assert!(result.is_ok());

        let mut snapshots = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, TransportEvent::Snapshot(_)) {
                snapshots += 1;
            }
        }
        assert_eq!(snapshots, 2);
        assert!(source.fetch_count() >= 3);
    }
}
