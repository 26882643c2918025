use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::warn;

use crate::types::AgentError;

use super::{Transport, TransportEvent, TransportMode, UpdateSource};

/// Server-side long-poll timeout for one event-wait round.
const WAIT_TIMEOUT: Duration = Duration::from_secs(30);

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Consecutive wait failures tolerated before giving the channel up.
const FAILURE_BUDGET: u32 = 5;

/// Push-style channel: long-polls the server event stream and fetches fresh
/// content whenever activity is reported.
pub struct EventStreamTransport {
    source: Arc<dyn UpdateSource>,
}

impl EventStreamTransport {
    pub fn new(source: Arc<dyn UpdateSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Transport for EventStreamTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Push
    }

    async fn run(
        &mut self,
        tx: &mpsc::Sender<TransportEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), AgentError> {
        // First paint: request state and log immediately instead of waiting
        // out a full event round. An initial state failure means the channel
        // never came up; the supervisor falls back.
        let snapshot = self.source.fetch_snapshot().await?;
        if tx.send(TransportEvent::Snapshot(snapshot)).await.is_err() {
            return Ok(());
        }
        match self.source.fetch_log().await {
            Ok(log) => {
                if tx.send(TransportEvent::Log(log)).await.is_err() {
                    return Ok(());
                }
            }
            Err(err) => warn!(error = ?err, "Initial log fetch failed"),
        }

        let mut since = 0u64;
        let mut failures = 0u32;
        loop {
            tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                result = self.source.wait_for_activity(since, WAIT_TIMEOUT) => match result {
                    Ok(wait) => {
                        failures = 0;
                        since = wait.last_event_id;

                        for progress in wait.transcode {
                            if tx.send(TransportEvent::Transcode(progress)).await.is_err() {
                                return Ok(());
                            }
                        }
                        if wait.state_changed {
                            match self.source.fetch_snapshot().await {
                                Ok(snapshot) => {
                                    if tx.send(TransportEvent::Snapshot(snapshot)).await.is_err() {
                                        return Ok(());
                                    }
                                }
                                Err(err) => warn!(error = ?err, "State fetch after event failed"),
                            }
                        }
                        if wait.log_changed {
                            match self.source.fetch_log().await {
                                Ok(log) => {
                                    if tx.send(TransportEvent::Log(log)).await.is_err() {
                                        return Ok(());
                                    }
                                }
                                Err(err) => warn!(error = ?err, "Log fetch after event failed"),
                            }
                        }
                    }
                    Err(err) => {
                        failures += 1;
                        warn!(error = ?err, failures, "Event stream wait failed");
                        if failures >= FAILURE_BUDGET {
                            return Err(err);
                        }
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gshare_client::{EventWaitResult, Snapshot, StateDto};

    fn snapshot() -> Snapshot {
        Snapshot::from_dto(StateDto::default())
    }

    #[tokio::test(start_paused = true)]
    async fn first_paint_precedes_event_rounds() {
        let source = Arc::new(super::super::testing::FakeSource::new());
        source.push_snapshot(snapshot());
        source.push_log("hello log");

        let (tx, mut rx) = mpsc::channel(16);
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let mut transport = EventStreamTransport::new(source.clone());

        // All waits fail: after the budget the transport reports the outage.
        let result = transport.run(&tx, &mut shutdown_rx).await;
        assert!(result.is_err());

        assert!(matches!(rx.recv().await, Some(TransportEvent::Snapshot(_))));
        assert!(matches!(
            rx.recv().await,
            Some(TransportEvent::Log(text)) if text == "hello log"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn activity_triggers_fetch_and_advances_cursor() {
        let source = Arc::new(super::super::testing::FakeSource::new());
        source.push_snapshot(snapshot());
        source.push_log("log-1");
        source.push_wait(EventWaitResult {
            last_event_id: 7,
            state_changed: true,
            log_changed: false,
            transcode: Vec::new(),
        });
        source.push_snapshot(snapshot());

        let (tx, mut rx) = mpsc::channel(16);
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let mut transport = EventStreamTransport::new(source.clone());

        let result = transport.run(&tx, &mut shutdown_rx).await;
        assert!(result.is_err());

        let mut snapshots = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, TransportEvent::Snapshot(_)) {
                snapshots += 1;
            }
        }
        assert_eq!(snapshots, 2);

        let cursors = source.wait_cursors.lock().unwrap().clone();
        assert_eq!(cursors[0], 0);
        assert!(cursors[1..].iter().all(|since| *since == 7));
    }
}
