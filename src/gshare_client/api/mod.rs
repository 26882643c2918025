mod queries;
mod responses;
mod types;

pub use queries::EventStreamQuery;
pub use responses::{CommandResponse, EventWaitResult, LogLevelResponse, TranscodeRulesResponse};
pub use types::{EventBatchDto, FolderDto, ServerEvent, StateDto, TranscodeRule};
