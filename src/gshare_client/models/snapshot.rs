use serde::{Deserialize, Serialize};

use crate::gshare_client::api::StateDto;

/// Reported state of one backend service.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    On,
    Off,
    Unknown,
}

impl ServiceState {
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("ON") => ServiceState::On,
            Some("OFF") => ServiceState::Off,
            _ => ServiceState::Unknown,
        }
    }

    pub fn is_on(self) -> bool {
        matches!(self, ServiceState::On)
    }

    pub fn label(self) -> &'static str {
        match self {
            ServiceState::On => "ON",
            ServiceState::Off => "OFF",
            ServiceState::Unknown => "--",
        }
    }
}

/// The services the dashboard tracks an indicator for.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Vm,
    Share,
    NetworkMount,
    Relay,
}

/// How the backend watches its folders.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MonitorMode {
    Event,
    Polling,
}

impl MonitorMode {
    fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("polling") => MonitorMode::Polling,
            _ => MonitorMode::Event,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MonitorMode::Event => "event",
            MonitorMode::Polling => "polling",
        }
    }
}

/// One monitored folder: path is the stable identity across snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub path: String,
    pub mtime: String,
    pub mounted: bool,
}

/// One complete server-reported state, immutable once received.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub last_check_time: String,
    pub last_action: String,
    pub vm: ServiceState,
    pub share: ServiceState,
    pub network_mount: ServiceState,
    pub relay: ServiceState,
    pub relay_last_seen: Option<String>,
    pub cpu_usage: f64,
    pub low_cpu_streak: u32,
    pub low_cpu_threshold: u32,
    pub uptime: String,
    pub last_shutdown_time: String,
    pub check_interval_secs: u64,
    pub monitor_mode: MonitorMode,
    pub initial_scan_in_progress: bool,
    pub folders: Vec<FolderEntry>,
}

impl Snapshot {
    pub fn from_dto(dto: StateDto) -> Self {
        let mut folders: Vec<FolderEntry> = dto
            .monitored_folders
            .into_iter()
            .map(|(path, info)| FolderEntry {
                path,
                mtime: info.mtime,
                mounted: info.is_mounted,
            })
            .collect();
        // Map iteration order is arbitrary; give downstream a stable base
        // order before the recency sort.
        folders.sort_by(|a, b| a.path.cmp(&b.path));

        Self {
            last_check_time: dto.last_check_time,
            last_action: dto.last_action,
            vm: ServiceState::from_flag(dto.vm_status.as_deref()),
            share: ServiceState::from_flag(dto.smb_status.as_deref()),
            network_mount: ServiceState::from_flag(dto.nfs_status.as_deref()),
            relay: ServiceState::from_flag(dto.relay_status.as_deref()),
            relay_last_seen: dto.relay_last_seen,
            cpu_usage: dto.cpu_usage,
            low_cpu_streak: dto.low_cpu_count,
            low_cpu_threshold: dto.threshold_count,
            uptime: dto.uptime,
            last_shutdown_time: dto.last_shutdown_time,
            check_interval_secs: dto.check_interval.max(1),
            monitor_mode: MonitorMode::from_flag(dto.monitor_mode.as_deref()),
            initial_scan_in_progress: dto.initial_scan_in_progress,
            folders,
        }
    }
}

/// Phase of a backend transcoding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscodePhase {
    Idle,
    Scanning,
    Converting,
    #[serde(other)]
    Unknown,
}

/// Progress counters pushed while a transcoding run is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeProgress {
    pub phase: TranscodePhase,
    #[serde(default)]
    pub done: u32,
    #[serde(default)]
    pub total: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_state_maps_flags() {
        assert_eq!(ServiceState::from_flag(Some("ON")), ServiceState::On);
        assert_eq!(ServiceState::from_flag(Some("OFF")), ServiceState::Off);
        assert_eq!(ServiceState::from_flag(Some("degraded")), ServiceState::Unknown);
        assert_eq!(ServiceState::from_flag(None), ServiceState::Unknown);
    }

    #[test]
    fn snapshot_tolerates_missing_fields() {
        let dto: StateDto = serde_json::from_str("{}").unwrap();
        let snapshot = Snapshot::from_dto(dto);
        assert_eq!(snapshot.vm, ServiceState::Unknown);
        assert_eq!(snapshot.check_interval_secs, 60);
        assert!(snapshot.folders.is_empty());
        assert!(!snapshot.initial_scan_in_progress);
    }

    #[test]
    fn snapshot_flattens_folder_map() {
        let raw = r#"{
            "vm_status": "ON",
            "monitor_mode": "polling",
            "monitored_folders": {
                "media/tv": {"mtime": "2025-06-01 10:00:00", "is_mounted": true},
                "media/movies": {"mtime": "-", "is_mounted": false}
            }
        }"#;
        let snapshot = Snapshot::from_dto(serde_json::from_str(raw).unwrap());
        assert_eq!(snapshot.vm, ServiceState::On);
        assert_eq!(snapshot.monitor_mode, MonitorMode::Polling);
        assert_eq!(snapshot.folders.len(), 2);
        assert_eq!(snapshot.folders[0].path, "media/movies");
        assert_eq!(snapshot.folders[0].mtime, "-");
        assert!(snapshot.folders[1].mounted);
    }
}
