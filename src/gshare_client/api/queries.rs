use serde::Serialize;

/// Query parameters for the long-polled event stream.
#[derive(Serialize)]
pub struct EventStreamQuery {
    pub since: u64,
    pub timeout: u64,
}
