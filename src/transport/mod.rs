mod poll;
mod push;
mod supervisor;

pub use poll::PollingTransport;
pub use push::EventStreamTransport;
pub use supervisor::TransportSupervisor;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::gshare_client::{EventWaitResult, Snapshot, TranscodeProgress};
use crate::types::AgentError;

/// Everything a transport needs from the server, substitutable with a fake
/// in tests.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<Snapshot, AgentError>;
    async fn fetch_log(&self) -> Result<String, AgentError>;
    async fn wait_for_activity(
        &self,
        since: u64,
        timeout: Duration,
    ) -> Result<EventWaitResult, AgentError>;
}

/// Updates flowing from the active transport to the session, in receipt
/// order. Last received wins; nothing is coalesced or merged.
#[derive(Debug)]
pub enum TransportEvent {
    Snapshot(Snapshot),
    Log(String),
    Transcode(TranscodeProgress),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Push,
    Poll,
}

/// One update channel. Exactly one transport is live at any time; the
/// supervisor owns the switchover.
#[async_trait]
pub trait Transport: Send {
    fn mode(&self) -> TransportMode;

    /// Drive the channel until shutdown (Ok) or channel failure (Err).
    async fn run(
        &mut self,
        tx: &mpsc::Sender<TransportEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), AgentError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::gshare_client::{EventWaitResult, Snapshot};
    use crate::types::AgentError;

    use super::UpdateSource;

    /// Scripted update source: each call pops the next queued result.
    #[derive(Default)]
    pub struct FakeSource {
        pub snapshots: Mutex<VecDeque<Result<Snapshot, AgentError>>>,
        pub logs: Mutex<VecDeque<Result<String, AgentError>>>,
        pub waits: Mutex<VecDeque<Result<EventWaitResult, AgentError>>>,
        pub snapshot_fetches: AtomicUsize,
        pub wait_cursors: Mutex<Vec<u64>>,
    }

    impl FakeSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_snapshot(&self, snapshot: Snapshot) {
            self.snapshots.lock().unwrap().push_back(Ok(snapshot));
        }

        pub fn push_log(&self, text: &str) {
            self.logs.lock().unwrap().push_back(Ok(text.to_string()));
        }

        pub fn push_wait(&self, wait: EventWaitResult) {
            self.waits.lock().unwrap().push_back(Ok(wait));
        }

        pub fn fetch_count(&self) -> usize {
            self.snapshot_fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UpdateSource for FakeSource {
        async fn fetch_snapshot(&self) -> Result<Snapshot, AgentError> {
            self.snapshot_fetches.fetch_add(1, Ordering::SeqCst);
            self.snapshots
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AgentError::Server("no snapshot queued".to_string())))
        }

        async fn fetch_log(&self) -> Result<String, AgentError> {
            self.logs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AgentError::Server("no log queued".to_string())))
        }

        async fn wait_for_activity(
            &self,
            since: u64,
            _timeout: Duration,
        ) -> Result<EventWaitResult, AgentError> {
            self.wait_cursors.lock().unwrap().push(since);
            self.waits
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AgentError::Server("event stream down".to_string())))
        }
    }
}
