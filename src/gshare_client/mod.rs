mod api;
mod client;
mod models;

pub use api::{EventWaitResult, StateDto, TranscodeRule};
pub use client::GshareClient;
pub use models::{
    FolderEntry, MonitorMode, ServiceKind, ServiceState, Snapshot, TranscodePhase,
    TranscodeProgress,
};
