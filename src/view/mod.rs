pub mod log_panel;
pub mod reconciler;
pub mod relative_time;
pub mod status;
pub mod surface;
pub mod visibility;
