use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::commands::{CommandDispatcher, CommandKey, CommandOutcome, ControlApi, UserCommand};
use crate::config::Config;
use crate::gshare_client::{MonitorMode, Snapshot};
use crate::transport::{TransportEvent, UpdateSource};
use crate::types::AgentError;
use crate::view::log_panel::LogPanelState;
use crate::view::reconciler::{partition_entries, ListReconciler};
use crate::view::relative_time::{TimeFormatter, NO_INFO_LABEL, UNKNOWN_SENTINEL};
use crate::view::status::StatusProjector;
use crate::view::surface::{Bucket, HeaderField, RenderOp, Severity, Surface};
use crate::view::visibility::VisibilityTracker;

/// Events arriving from the attached front panel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FrontEvent {
    Visibility { key: String, visible: bool },
    LogHover { hovered: bool },
    LogScrolled { scrolled: bool },
    SetAutoUpdateLog { enabled: bool },
    Command(UserCommand),
    RequestTranscodeRules,
    Shutdown,
}

/// Scalar dashboard state the refresher and reconciler read between
/// snapshots.
#[derive(Debug)]
pub struct SessionState {
    pub monitor_mode: MonitorMode,
    pub check_interval_secs: u64,
    pub scan_in_progress: bool,
    pub last_check_time: String,
    pub last_shutdown_time: String,
    pub vm_on: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            monitor_mode: MonitorMode::Event,
            check_interval_secs: 60,
            scan_in_progress: false,
            last_check_time: String::new(),
            last_shutdown_time: UNKNOWN_SENTINEL.to_string(),
            vm_on: false,
        }
    }
}

struct CommandDone {
    key: CommandKey,
    control_id: String,
    result: Result<CommandOutcome, AgentError>,
}

/// The single event loop tying transport, view components and commands
/// together. All view mutation funnels through here, so per-container
/// reconcile passes and the pending-lock table never race.
pub struct ViewSession<S: Surface> {
    state: SessionState,
    formatter: TimeFormatter,
    reconciler: ListReconciler,
    tracker: VisibilityTracker,
    projector: StatusProjector,
    log: LogPanelState,
    dispatcher: CommandDispatcher,
    source: Arc<dyn UpdateSource>,
    control: Arc<dyn ControlApi>,
    surface: S,
    settle_delay: Duration,
    defer_threshold: usize,
    staggered: bool,
}

impl<S: Surface> ViewSession<S> {
    pub fn new(
        config: &Config,
        source: Arc<dyn UpdateSource>,
        control: Arc<dyn ControlApi>,
        surface: S,
    ) -> Self {
        let formatter = TimeFormatter::new(config.utc_offset_minutes);
        Self {
            state: SessionState::default(),
            formatter,
            reconciler: ListReconciler::new(config.chunk_size, formatter),
            tracker: VisibilityTracker::new(),
            projector: StatusProjector::new(),
            log: LogPanelState::new(config.auto_update_log),
            dispatcher: CommandDispatcher::new(),
            source,
            control,
            surface,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            defer_threshold: config.defer_threshold.max(1),
            staggered: false,
        }
    }

    /// Run until the front disconnects or asks for shutdown. Flips the
    /// shutdown watch on the way out so the transport supervisor winds down
    /// with the session.
    pub async fn run(
        mut self,
        mut transport_rx: mpsc::Receiver<TransportEvent>,
        mut front_rx: mpsc::Receiver<FrontEvent>,
        shutdown: watch::Sender<bool>,
    ) {
        match self.control.fetch_log_level().await {
            Ok(level) => self.surface.apply(RenderOp::SetLogLevel { level }),
            Err(err) => debug!(error = ?err, "Log level unavailable"),
        }

        let (done_tx, mut done_rx) = mpsc::channel::<CommandDone>(8);
        let mut refresh = tokio::time::interval(Duration::from_secs(1));
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut transport_open = true;

        'outer: loop {
            if self.reconciler.has_pending() {
                // A pass is draining: fold in whatever is already queued,
                // advance one chunk, then yield the thread.
                while let Ok(event) = transport_rx.try_recv() {
                    self.on_transport_event(event);
                }
                loop {
                    match front_rx.try_recv() {
                        Ok(FrontEvent::Shutdown) => break 'outer,
                        Ok(event) => self.on_front_event(event, &done_tx).await,
                        Err(_) => break,
                    }
                }
                while let Ok(done) = done_rx.try_recv() {
                    self.on_command_done(done).await;
                }
                let staggered = self.staggered;
                self.step_reconcilers(staggered);
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                event = transport_rx.recv(), if transport_open => match event {
                    Some(event) => self.on_transport_event(event),
                    None => {
                        warn!("Transport channel closed");
                        transport_open = false;
                    }
                },
                event = front_rx.recv() => match event {
                    Some(FrontEvent::Shutdown) | None => break,
                    Some(event) => self.on_front_event(event, &done_tx).await,
                },
                Some(done) = done_rx.recv() => self.on_command_done(done).await,
                _ = refresh.tick() => self.on_refresh_tick(Utc::now()),
            }
        }

        let _ = shutdown.send(true);
    }

    fn step_reconcilers(&mut self, staggered: bool) {
        let now = Utc::now();
        let Self {
            reconciler,
            tracker,
            surface,
            ..
        } = self;
        reconciler.step_all(tracker, surface, now, staggered);
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Snapshot(snapshot) => self.apply_snapshot(snapshot),
            TransportEvent::Log(text) => {
                self.log.apply_log(text, &mut self.surface);
            }
            TransportEvent::Transcode(progress) => self
                .surface
                .apply(RenderOp::SetTranscodeProgress { progress }),
        }
    }

    /// Apply one snapshot: indicators first, then headers, then the entry
    /// lists. Snapshots apply in receipt order, last write wins.
    fn apply_snapshot(&mut self, snapshot: Snapshot) {
        {
            let Self {
                projector,
                dispatcher,
                surface,
                ..
            } = self;
            projector.apply(
                &snapshot,
                |kind| dispatcher.is_service_locked(kind),
                surface,
            );
        }

        self.state.monitor_mode = snapshot.monitor_mode;
        self.state.check_interval_secs = snapshot.check_interval_secs;
        self.state.scan_in_progress = snapshot.initial_scan_in_progress;
        self.state.last_check_time = snapshot.last_check_time.clone();
        self.state.last_shutdown_time = snapshot.last_shutdown_time.clone();
        self.state.vm_on = snapshot.vm.is_on();

        self.emit_headers(&snapshot, Utc::now());

        let (mountable, mounted) = partition_entries(&snapshot.folders, &self.formatter);
        self.staggered = snapshot.folders.len() > self.defer_threshold;
        let scanning = self.state.scan_in_progress;
        self.reconciler.begin(Bucket::Mountable, mountable, scanning);
        self.reconciler.begin(Bucket::Mounted, mounted, scanning);
    }

    fn emit_headers(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) {
        let last_check_label = self.formatter.relative(&snapshot.last_check_time, now);
        let shutdown_label = shutdown_label(&self.formatter, &snapshot.last_shutdown_time, now);
        let relay_seen = snapshot
            .relay_last_seen
            .as_ref()
            .map(|seen| self.formatter.relative(seen, now));

        let surface = &mut self.surface;
        surface.apply(RenderOp::SetHeader {
            field: HeaderField::LastCheck,
            text: last_check_label,
        });
        surface.apply(RenderOp::SetHeader {
            field: HeaderField::LastCheckRaw,
            text: snapshot.last_check_time.clone(),
        });
        surface.apply(RenderOp::SetHeader {
            field: HeaderField::LastAction,
            text: snapshot.last_action.clone(),
        });
        surface.apply(RenderOp::SetHeader {
            field: HeaderField::CpuUsage,
            text: format!("{:.1}%", snapshot.cpu_usage),
        });
        surface.apply(RenderOp::SetHeader {
            field: HeaderField::LowCpuStreak,
            text: format!("{}/{}", snapshot.low_cpu_streak, snapshot.low_cpu_threshold),
        });
        surface.apply(RenderOp::SetHeader {
            field: HeaderField::Uptime,
            text: snapshot.uptime.clone(),
        });
        surface.apply(RenderOp::SetHeader {
            field: HeaderField::LastShutdown,
            text: shutdown_label,
        });
        surface.apply(RenderOp::SetHeader {
            field: HeaderField::LastShutdownRaw,
            text: snapshot.last_shutdown_time.clone(),
        });
        surface.apply(RenderOp::SetHeader {
            field: HeaderField::MonitorMode,
            text: self.state.monitor_mode.label().to_string(),
        });
        if let Some(text) = relay_seen {
            surface.apply(RenderOp::SetHeader {
                field: HeaderField::RelayLastSeen,
                text,
            });
        }
    }

    /// Fixed 1-second tick: header relative labels, check progress, and the
    /// visible entries only.
    fn on_refresh_tick(&mut self, now: DateTime<Utc>) {
        if !self.state.last_check_time.is_empty() {
            let text = self.formatter.relative(&self.state.last_check_time, now);
            self.surface.apply(RenderOp::SetHeader {
                field: HeaderField::LastCheck,
                text,
            });

            if self.state.vm_on {
                if let Some(parsed) = self.formatter.parse(&self.state.last_check_time) {
                    let elapsed = now.signed_duration_since(parsed).num_seconds().max(0) as f64;
                    let interval = self.state.check_interval_secs.max(1) as f64;
                    let percent = ((elapsed / interval) * 100.0).min(100.0).round() as u8;
                    self.surface.apply(RenderOp::SetCheckProgress { percent });
                }
            }
        }

        if !self.state.last_shutdown_time.is_empty() {
            let text = shutdown_label(&self.formatter, &self.state.last_shutdown_time, now);
            self.surface.apply(RenderOp::SetHeader {
                field: HeaderField::LastShutdown,
                text,
            });
        }

        let Self {
            reconciler,
            tracker,
            surface,
            ..
        } = self;
        reconciler.refresh_visible(tracker, now, surface);
    }

    async fn on_front_event(&mut self, event: FrontEvent, done_tx: &mpsc::Sender<CommandDone>) {
        match event {
            FrontEvent::Visibility { key, visible } => self.tracker.set_visible(&key, visible),
            FrontEvent::LogHover { hovered } => self.log.set_hovered(hovered),
            FrontEvent::LogScrolled { scrolled } => self.log.set_scrolled(scrolled),
            FrontEvent::SetAutoUpdateLog { enabled } => self.log.set_auto_update(enabled),
            FrontEvent::Command(command) => self.dispatch(command, done_tx),
            FrontEvent::RequestTranscodeRules => match self.control.fetch_transcode_rules().await {
                Ok(rules) => self.surface.apply(RenderOp::TranscodeRules { rules }),
                Err(err) => self.surface.apply(RenderOp::Notify {
                    severity: Severity::Error,
                    message: err.to_string(),
                }),
            },
            // Handled by the run loop.
            FrontEvent::Shutdown => {}
        }
    }

    fn dispatch(&mut self, command: UserCommand, done_tx: &mpsc::Sender<CommandDone>) {
        if !self.dispatcher.begin(&command) {
            debug!(target = %command.control_id(), "Command already pending, ignoring trigger");
            return;
        }

        let control_id = command.control_id();
        self.surface.apply(RenderOp::SetControlBusy {
            target: control_id.clone(),
            busy: true,
            label: Some(command.busy_label().to_string()),
        });

        let control = Arc::clone(&self.control);
        let done_tx = done_tx.clone();
        let settle = self.settle_delay;
        let key = command.lock_key();
        tokio::spawn(async move {
            let result = control.execute(&command).await;
            // The backend mutation is asynchronous relative to the
            // acknowledgment; give its state time to converge before the
            // follow-up fetch. Failures release immediately so a retry is
            // possible.
            if result.is_ok() {
                tokio::time::sleep(settle).await;
            }
            let _ = done_tx
                .send(CommandDone {
                    key,
                    control_id,
                    result,
                })
                .await;
        });
    }

    async fn on_command_done(&mut self, done: CommandDone) {
        self.dispatcher.release(&done.key);
        self.surface.apply(RenderOp::SetControlBusy {
            target: done.control_id,
            busy: false,
            label: None,
        });

        match done.result {
            Ok(outcome) => {
                if !outcome.message.is_empty() {
                    self.surface.apply(RenderOp::Notify {
                        severity: Severity::Info,
                        message: outcome.message,
                    });
                }
                match self.source.fetch_snapshot().await {
                    Ok(snapshot) => self.apply_snapshot(snapshot),
                    Err(err) => warn!(error = ?err, "Post-command state fetch failed"),
                }
            }
            Err(err) => self.surface.apply(RenderOp::Notify {
                severity: Severity::Error,
                message: err.to_string(),
            }),
        }
    }
}

fn shutdown_label(formatter: &TimeFormatter, raw: &str, now: DateTime<Utc>) -> String {
    if raw.trim() == UNKNOWN_SENTINEL {
        NO_INFO_LABEL.to_string()
    } else {
        formatter.relative(raw, now)
    }
}
