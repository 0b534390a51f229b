//! Host notification events.
//!
//! The runtime never polls the host; it emits these events through an
//! [`EventEmitter`](event_emitter_rs::EventEmitter) with a JSON-encoded
//! [`ScormEvent`] payload so the page controller can react out-of-band.

use serde::{Deserialize, Serialize};

/// The table of contents should be refreshed (fired after every commit and
/// finish, regardless of outcome).
pub const UPDATE_TOC_EVENT: &str = "scorm_update_toc";
/// Navigation should advance to the next SCO.
pub const LAUNCH_NEXT_SCO_EVENT: &str = "scorm_launch_next_sco";
/// Navigation should return to the previous SCO.
pub const LAUNCH_PREV_SCO_EVENT: &str = "scorm_launch_prev_sco";
/// Online persistence failed and the runtime switched to offline storage.
pub const GO_OFFLINE_EVENT: &str = "scorm_go_offline";

/// Correlation identifiers carried by every host notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScormEvent {
    pub scorm_id: u64,
    pub sco_id: u32,
    pub attempt: u32,
}
