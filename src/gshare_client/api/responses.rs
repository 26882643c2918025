use serde::Deserialize;

use crate::gshare_client::models::TranscodeProgress;
use crate::types::AgentError;

use super::types::TranscodeRule;

/// Status-discriminated response shared by every command endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct CommandResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl CommandResponse {
    /// Map the server's status discriminator onto a `Result`, surfacing the
    /// message verbatim either way.
    pub fn into_result(self) -> Result<String, AgentError> {
        if self.status == "success" {
            Ok(self.message)
        } else {
            Err(AgentError::Server(self.message))
        }
    }
}

/// Response of the log-level getter.
#[derive(Debug, Deserialize, Default)]
pub struct LogLevelResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub current_level: String,
}

/// Response of the transcoding rule-set getter.
#[derive(Debug, Deserialize, Default)]
pub struct TranscodeRulesResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub rules: Vec<TranscodeRule>,
}

/// Result of one long-poll round against the event stream.
#[derive(Debug, Default)]
pub struct EventWaitResult {
    pub last_event_id: u64,
    pub state_changed: bool,
    pub log_changed: bool,
    pub transcode: Vec<TranscodeProgress>,
}
