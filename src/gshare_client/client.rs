use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::commands::{CommandOutcome, ControlApi, UserCommand};
use crate::config::Config;
use crate::transport::UpdateSource;
use crate::types::AgentError;

use super::api::{
    CommandResponse, EventBatchDto, EventStreamQuery, EventWaitResult, LogLevelResponse, StateDto,
    TranscodeRule, TranscodeRulesResponse,
};
use super::models::Snapshot;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Slack added on top of the server-side event-wait timeout so the HTTP
/// request outlives the long poll.
const EVENT_WAIT_GRACE: Duration = Duration::from_secs(5);

/// HTTP client for the GShare control server.
#[derive(Clone)]
pub struct GshareClient {
    http: Client,
    base: Url,
}

impl GshareClient {
    /// Prepare a client for the configured server, honoring the
    /// `GSHARE_SERVER_URL` override.
    pub fn connect(config: &Config) -> Result<Self, AgentError> {
        let mut base_url = config.server_url.clone();
        if let Ok(custom) = env::var("GSHARE_SERVER_URL") {
            let trimmed = custom.trim();
            if !trimmed.is_empty() {
                base_url = trimmed.to_string();
            }
        }

        let base = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|err| AgentError::Config(format!("invalid server URL `{base_url}`: {err}")))?;

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(AgentError::Http)?;

        Ok(Self { http, base })
    }

    /// Build a URL from path segments; segments are percent-encoded, so
    /// folder paths survive the round trip.
    fn url(&self, segments: &[&str]) -> Result<Url, AgentError> {
        let mut url = self.base.clone();
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|()| AgentError::Config("server URL cannot be a base".to_string()))?;
            parts.pop_if_empty();
            for segment in segments {
                parts.push(segment);
            }
        }
        Ok(url)
    }

    async fn get_json<T>(&self, segments: &[&str]) -> Result<T, AgentError>
    where
        T: DeserializeOwned,
    {
        self.get_json_with_query(segments, &(), None).await
    }

    async fn get_json_with_query<T, Q>(
        &self,
        segments: &[&str],
        query: &Q,
        timeout: Option<Duration>,
    ) -> Result<T, AgentError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.url(segments)?;
        let mut request = self.http.get(url).query(query);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await.map_err(AgentError::Http)?;

        if !response.status().is_success() {
            return Err(AgentError::Server(format!(
                "{} returned {}",
                segments.join("/"),
                response.status()
            )));
        }

        response.json::<T>().await.map_err(AgentError::Http)
    }

    async fn get_text(&self, segments: &[&str]) -> Result<String, AgentError> {
        let url = self.url(segments)?;
        let response = self.http.get(url).send().await.map_err(AgentError::Http)?;

        if !response.status().is_success() {
            return Err(AgentError::Server(format!(
                "{} returned {}",
                segments.join("/"),
                response.status()
            )));
        }

        response.text().await.map_err(AgentError::Http)
    }

    /// Issue a GET command endpoint and unwrap the status discriminator.
    async fn command(&self, segments: &[&str]) -> Result<String, AgentError> {
        let response: CommandResponse = self.get_json(segments).await?;
        response.into_result()
    }

    async fn post_command<B>(&self, segments: &[&str], body: &B) -> Result<String, AgentError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(segments)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(AgentError::Http)?;

        if !response.status().is_success() {
            return Err(AgentError::Server(format!(
                "{} returned {}",
                segments.join("/"),
                response.status()
            )));
        }

        response
            .json::<CommandResponse>()
            .await
            .map_err(AgentError::Http)?
            .into_result()
    }
}

#[async_trait]
impl UpdateSource for GshareClient {
    async fn fetch_snapshot(&self) -> Result<Snapshot, AgentError> {
        let dto: StateDto = self.get_json(&["update_state"]).await?;
        Ok(Snapshot::from_dto(dto))
    }

    async fn fetch_log(&self) -> Result<String, AgentError> {
        self.get_text(&["update_log"]).await
    }

    async fn wait_for_activity(
        &self,
        since: u64,
        timeout: Duration,
    ) -> Result<EventWaitResult, AgentError> {
        let timeout_secs = timeout.as_secs().clamp(1, 300);
        let query = EventStreamQuery {
            since,
            timeout: timeout_secs,
        };
        let batch: EventBatchDto = self
            .get_json_with_query(
                &["events"],
                &query,
                Some(Duration::from_secs(timeout_secs) + EVENT_WAIT_GRACE),
            )
            .await?;

        let mut result = EventWaitResult {
            last_event_id: batch.last_event_id.max(since),
            ..EventWaitResult::default()
        };
        for event in &batch.events {
            if event.id > result.last_event_id {
                result.last_event_id = event.id;
            }
            if event.is_state_update() {
                result.state_changed = true;
            }
            if event.is_log_update() {
                result.log_changed = true;
            }
            if let Some(progress) = event.transcode_progress() {
                result.transcode.push(progress);
            }
        }

        Ok(result)
    }
}

#[async_trait]
impl ControlApi for GshareClient {
    async fn execute(&self, command: &UserCommand) -> Result<CommandOutcome, AgentError> {
        let message = match command {
            UserCommand::ToggleMount { folder } => {
                self.command(&["toggle_mount", folder.as_str()]).await?
            }
            UserCommand::StartVm => self.command(&["start_vm"]).await?,
            UserCommand::ShutdownVm => self.command(&["shutdown_vm"]).await?,
            UserCommand::ActivateShare => self.command(&["activate_share"]).await?,
            UserCommand::DeactivateShare => self.command(&["deactivate_share"]).await?,
            UserCommand::RetryMount => self.command(&["retry_mount"]).await?,
            UserCommand::RestartService => self.command(&["restart_service"]).await?,
            UserCommand::ClearLog => self.command(&["clear_log"]).await?,
            UserCommand::TrimLog { lines } => {
                let lines = lines.to_string();
                self.command(&["trim_log", lines.as_str()]).await?
            }
            UserCommand::SetLogLevel { level } => {
                self.command(&["set_log_level", level.as_str()]).await?
            }
            UserCommand::UpdateTranscodeRules { rules } => {
                self.post_command(&["update_transcode_rules"], rules).await?
            }
            UserCommand::StartTranscodeScan => self.command(&["start_transcode_scan"]).await?,
            UserCommand::CancelTranscodeScan => self.command(&["cancel_transcode_scan"]).await?,
            UserCommand::ToggleFlag { name } => {
                self.command(&["toggle_flag", name.as_str()]).await?
            }
        };
        Ok(CommandOutcome { message })
    }

    async fn fetch_log_level(&self) -> Result<String, AgentError> {
        let response: LogLevelResponse = self.get_json(&["get_log_level"]).await?;
        if response.status == "success" {
            Ok(response.current_level)
        } else {
            Err(AgentError::Server("log level unavailable".to_string()))
        }
    }

    async fn fetch_transcode_rules(&self) -> Result<Vec<TranscodeRule>, AgentError> {
        let response: TranscodeRulesResponse = self.get_json(&["get_transcode_rules"]).await?;
        if response.status == "success" {
            Ok(response.rules)
        } else {
            Err(AgentError::Server(response.message))
        }
    }
}
