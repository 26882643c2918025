mod snapshot;

pub use snapshot::{
    FolderEntry, MonitorMode, ServiceKind, ServiceState, Snapshot, TranscodePhase,
    TranscodeProgress,
};
