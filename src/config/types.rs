use serde::{Deserialize, Serialize};

/// Configuration for the dashboard agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the GShare control server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Period of the fallback polling transport, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Fixed UTC offset assumed for naive server timestamps, in minutes.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    /// Entries processed per reconciler chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Combined entry count above which the second container's pass is
    /// deferred to a later scheduling tick.
    #[serde(default = "default_defer_threshold")]
    pub defer_threshold: usize,

    /// Delay between a successful command and the follow-up state fetch,
    /// in milliseconds.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Whether incoming log text is applied to the log panel automatically.
    #[serde(default = "default_auto_update_log")]
    pub auto_update_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            poll_interval_secs: default_poll_interval_secs(),
            utc_offset_minutes: default_utc_offset_minutes(),
            chunk_size: default_chunk_size(),
            defer_threshold: default_defer_threshold(),
            settle_delay_ms: default_settle_delay_ms(),
            auto_update_log: default_auto_update_log(),
        }
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_utc_offset_minutes() -> i32 {
    9 * 60
}

fn default_chunk_size() -> usize {
    40
}

fn default_defer_threshold() -> usize {
    150
}

fn default_settle_delay_ms() -> u64 {
    1800
}

fn default_auto_update_log() -> bool {
    true
}
