use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;

use crate::gshare_client::{ServiceKind, TranscodeRule};
use crate::types::AgentError;

/// User-triggered actions, as sent by the front.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum UserCommand {
    ToggleMount { folder: String },
    StartVm,
    ShutdownVm,
    ActivateShare,
    DeactivateShare,
    RetryMount,
    RestartService,
    ClearLog,
    TrimLog { lines: u32 },
    SetLogLevel { level: String },
    UpdateTranscodeRules { rules: Vec<TranscodeRule> },
    StartTranscodeScan,
    CancelTranscodeScan,
    ToggleFlag { name: String },
}

/// Lock key: one in-flight command per key at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandKey {
    Folder(String),
    Vm,
    Share,
    NetworkMount,
    Service,
    Log,
    TranscodeRules,
    TranscodeScan,
    Flag(String),
}

impl UserCommand {
    pub fn lock_key(&self) -> CommandKey {
        match self {
            UserCommand::ToggleMount { folder } => CommandKey::Folder(folder.clone()),
            UserCommand::StartVm | UserCommand::ShutdownVm => CommandKey::Vm,
            UserCommand::ActivateShare | UserCommand::DeactivateShare => CommandKey::Share,
            UserCommand::RetryMount => CommandKey::NetworkMount,
            UserCommand::RestartService => CommandKey::Service,
            UserCommand::ClearLog
            | UserCommand::TrimLog { .. }
            | UserCommand::SetLogLevel { .. } => CommandKey::Log,
            UserCommand::UpdateTranscodeRules { .. } => CommandKey::TranscodeRules,
            UserCommand::StartTranscodeScan | UserCommand::CancelTranscodeScan => {
                CommandKey::TranscodeScan
            }
            UserCommand::ToggleFlag { name } => CommandKey::Flag(name.clone()),
        }
    }

    /// Identifier of the control the front should disable while pending.
    pub fn control_id(&self) -> String {
        match self.lock_key() {
            CommandKey::Folder(path) => format!("folder:{path}"),
            CommandKey::Vm => "vm".to_string(),
            CommandKey::Share => "share".to_string(),
            CommandKey::NetworkMount => "network_mount".to_string(),
            CommandKey::Service => "service".to_string(),
            CommandKey::Log => "log".to_string(),
            CommandKey::TranscodeRules => "transcode_rules".to_string(),
            CommandKey::TranscodeScan => "transcode_scan".to_string(),
            CommandKey::Flag(name) => format!("flag:{name}"),
        }
    }

    pub fn busy_label(&self) -> &'static str {
        match self {
            UserCommand::ToggleMount { .. } => "working",
            UserCommand::StartVm | UserCommand::StartTranscodeScan => "starting",
            UserCommand::ShutdownVm => "stopping",
            UserCommand::ActivateShare => "activating",
            UserCommand::DeactivateShare => "deactivating",
            UserCommand::RetryMount => "retrying",
            UserCommand::RestartService => "restarting",
            UserCommand::ClearLog => "clearing",
            UserCommand::TrimLog { .. } => "trimming",
            UserCommand::SetLogLevel { .. } => "applying",
            UserCommand::UpdateTranscodeRules { .. } => "saving",
            UserCommand::CancelTranscodeScan => "canceling",
            UserCommand::ToggleFlag { .. } => "toggling",
        }
    }
}

/// Successful command acknowledgment from the server.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub message: String,
}

/// Server control surface, substitutable with a fake in tests.
#[async_trait]
pub trait ControlApi: Send + Sync {
    async fn execute(&self, command: &UserCommand) -> Result<CommandOutcome, AgentError>;
    async fn fetch_log_level(&self) -> Result<String, AgentError>;
    async fn fetch_transcode_rules(&self) -> Result<Vec<TranscodeRule>, AgentError>;
}

/// Per-entity pending locks. The disabled control keeps a second trigger
/// unreachable through the UI; `begin` enforces the invariant regardless.
#[derive(Debug, Default)]
pub struct CommandDispatcher {
    pending: HashSet<CommandKey>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for a command. Returns `false` — a strict no-op, not a
    /// queue — when the key is already held.
    pub fn begin(&mut self, command: &UserCommand) -> bool {
        self.pending.insert(command.lock_key())
    }

    pub fn release(&mut self, key: &CommandKey) {
        self.pending.remove(key);
    }

    pub fn is_locked(&self, key: &CommandKey) -> bool {
        self.pending.contains(key)
    }

    /// Whether a service's own toggle is mid-flight, for the projector skip.
    pub fn is_service_locked(&self, kind: ServiceKind) -> bool {
        let key = match kind {
            ServiceKind::Vm => CommandKey::Vm,
            ServiceKind::Share => CommandKey::Share,
            ServiceKind::NetworkMount => CommandKey::NetworkMount,
            ServiceKind::Relay => return false,
        };
        self.pending.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_for_same_key_is_refused() {
        let mut dispatcher = CommandDispatcher::new();
        let command = UserCommand::ToggleMount {
            folder: "media/tv".to_string(),
        };

        assert!(dispatcher.begin(&command));
        assert!(!dispatcher.begin(&command));

        dispatcher.release(&command.lock_key());
        assert!(dispatcher.begin(&command));
    }

    #[test]
    fn different_folders_lock_independently() {
        let mut dispatcher = CommandDispatcher::new();
        let a = UserCommand::ToggleMount {
            folder: "a".to_string(),
        };
        let b = UserCommand::ToggleMount {
            folder: "b".to_string(),
        };

        assert!(dispatcher.begin(&a));
        assert!(dispatcher.begin(&b));
    }

    #[test]
    fn start_and_shutdown_share_the_vm_lock() {
        let mut dispatcher = CommandDispatcher::new();
        assert!(dispatcher.begin(&UserCommand::StartVm));
        assert!(!dispatcher.begin(&UserCommand::ShutdownVm));
        assert!(dispatcher.is_service_locked(ServiceKind::Vm));
        assert!(!dispatcher.is_service_locked(ServiceKind::Share));
    }

    #[test]
    fn front_command_json_decodes() {
        let command: UserCommand =
            serde_json::from_str(r#"{"command": "toggle_mount", "folder": "media/tv"}"#).unwrap();
        assert_eq!(
            command,
            UserCommand::ToggleMount {
                folder: "media/tv".to_string()
            }
        );
        assert_eq!(command.control_id(), "folder:media/tv");

        let command: UserCommand =
            serde_json::from_str(r#"{"command": "trim_log", "lines": 500}"#).unwrap();
        assert_eq!(command, UserCommand::TrimLog { lines: 500 });
    }
}
