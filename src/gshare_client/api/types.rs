use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gshare_client::models::TranscodeProgress;

/// Raw state payload as served by `update_state`.
///
/// Every field is tolerated independently so a partial snapshot never aborts
/// the rest of the update.
#[derive(Debug, Deserialize, Default)]
pub struct StateDto {
    #[serde(default)]
    pub last_check_time: String,
    #[serde(default)]
    pub last_action: String,
    #[serde(default)]
    pub vm_status: Option<String>,
    #[serde(default)]
    pub smb_status: Option<String>,
    #[serde(default)]
    pub nfs_status: Option<String>,
    #[serde(default)]
    pub relay_status: Option<String>,
    #[serde(default)]
    pub relay_last_seen: Option<String>,
    #[serde(default)]
    pub cpu_usage: f64,
    #[serde(default)]
    pub low_cpu_count: u32,
    #[serde(default)]
    pub threshold_count: u32,
    #[serde(default)]
    pub uptime: String,
    #[serde(default)]
    pub last_shutdown_time: String,
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    #[serde(default)]
    pub monitor_mode: Option<String>,
    #[serde(default)]
    pub initial_scan_in_progress: bool,
    #[serde(default)]
    pub monitored_folders: HashMap<String, FolderDto>,
}

fn default_check_interval() -> u64 {
    60
}

/// Per-folder payload inside `monitored_folders`.
#[derive(Debug, Deserialize, Clone)]
pub struct FolderDto {
    #[serde(default = "default_mtime")]
    pub mtime: String,
    #[serde(default)]
    pub is_mounted: bool,
}

fn default_mtime() -> String {
    "-".to_string()
}

/// One event from the server event stream.
#[derive(Debug, Deserialize)]
pub struct ServerEvent {
    pub id: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl ServerEvent {
    pub fn is_state_update(&self) -> bool {
        self.event_type == "state_update"
    }

    pub fn is_log_update(&self) -> bool {
        self.event_type == "log_update"
    }

    pub fn transcode_progress(&self) -> Option<TranscodeProgress> {
        if self.event_type != "transcoding_progress" {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }
}

/// Response payload of the `events` endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct EventBatchDto {
    #[serde(default)]
    pub last_event_id: u64,
    #[serde(default)]
    pub events: Vec<ServerEvent>,
}

/// One transcoding rule as stored by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeRule {
    pub name: String,
    #[serde(default)]
    pub folder_pattern: String,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub tool_options: String,
    #[serde(default)]
    pub delete_original: bool,
    #[serde(default)]
    pub output_pattern: String,
}
