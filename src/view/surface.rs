use std::io::Write;

use serde::Serialize;
use tracing::warn;

use crate::gshare_client::{ServiceKind, ServiceState, TranscodeProgress, TranscodeRule};

/// The two entry containers: folders that can be mounted and folders that are
/// currently exposed through the share.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Mountable,
    Mounted,
}

impl Bucket {
    /// The action the entry's toggle control performs in this container.
    pub fn action(self) -> EntryAction {
        match self {
            Bucket::Mountable => EntryAction::Mount,
            Bucket::Mounted => EntryAction::Unmount,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryAction {
    Mount,
    Unmount,
}

/// Panels whose interactivity depends on a service being up.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    VmControls,
    Share,
}

/// Scalar header fields of the dashboard.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HeaderField {
    LastCheck,
    LastCheckRaw,
    LastAction,
    CpuUsage,
    LowCpuStreak,
    Uptime,
    LastShutdown,
    LastShutdownRaw,
    RelayLastSeen,
    MonitorMode,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Error,
}

/// One mutation of the rendered dashboard. The view model mirrors these; the
/// front applies them verbatim.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderOp {
    CreateEntry {
        container: Bucket,
        key: String,
        time_label: String,
        raw_mtime: String,
        action: EntryAction,
    },
    UpdateEntryTime {
        container: Bucket,
        key: String,
        time_label: String,
        raw_mtime: String,
    },
    RemoveEntry {
        container: Bucket,
        key: String,
    },
    SetEmptyState {
        container: Bucket,
        visible: bool,
    },
    SetIndicator {
        service: ServiceKind,
        state: ServiceState,
        label: String,
    },
    SetPanelEnabled {
        panel: Panel,
        enabled: bool,
    },
    SetCheckProgress {
        percent: u8,
    },
    SetHeader {
        field: HeaderField,
        text: String,
    },
    ReplaceLog {
        text: String,
    },
    SetLogLevel {
        level: String,
    },
    SetControlBusy {
        target: String,
        busy: bool,
        label: Option<String>,
    },
    Notify {
        severity: Severity,
        message: String,
    },
    SetTranscodeProgress {
        progress: TranscodeProgress,
    },
    TranscodeRules {
        rules: Vec<TranscodeRule>,
    },
}

/// Sink for render operations. The session and view components never touch
/// the front directly; emitting an op is the final side-effecting step.
pub trait Surface {
    fn apply(&mut self, op: RenderOp);
}

/// Writes render ops as JSON lines, one op per line, for the attached front.
pub struct JsonlSurface<W: Write> {
    writer: W,
}

impl JsonlSurface<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            writer: std::io::stdout(),
        }
    }
}

impl<W: Write> JsonlSurface<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> Surface for JsonlSurface<W> {
    fn apply(&mut self, op: RenderOp) {
        match serde_json::to_string(&op) {
            Ok(line) => {
                if let Err(err) = writeln!(self.writer, "{}", line) {
                    warn!(error = ?err, "Failed to write render op");
                }
            }
            Err(err) => warn!(error = ?err, "Failed to serialize render op"),
        }
    }
}

/// Test surface that records every applied op.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSurface {
    pub ops: Vec<RenderOp>,
}

#[cfg(test)]
impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&RenderOp) -> bool,
    {
        self.ops.iter().filter(|op| predicate(op)).count()
    }
}

#[cfg(test)]
impl Surface for RecordingSurface {
    fn apply(&mut self, op: RenderOp) {
        self.ops.push(op);
    }
}
