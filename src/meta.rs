use std::fmt;

use serde::{Deserialize, Serialize};

/// The mode a SCORM attempt is being played in.
///
/// The string form is what `cmi.core.lesson_mode` reports to content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayMode {
    Normal,
    Browse,
    Review,
}

impl PlayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayMode::Normal => "normal",
            PlayMode::Browse => "browse",
            PlayMode::Review => "review",
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for the SCORM activity whose attempt is being played.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScormMeta {
    /// Activity id, used to correlate host notifications.
    pub id: u64,
    /// Auto-advance flag as stored by the host ("1" advances to the next SCO
    /// on finish when the content set no navigation event).
    pub auto: String,
    /// Whether a successful write schedules a deferred commit.
    pub autocommit: bool,
    /// Strict SCORM 1.2 string limits. When false the CMIString256/4096
    /// formats relax to 64000 characters.
    pub standard: bool,
}

impl ScormMeta {
    pub fn new(id: u64) -> ScormMeta {
        ScormMeta {
            id,
            auto: String::new(),
            autocommit: false,
            standard: true,
        }
    }

    pub fn auto_advance(&self) -> bool {
        self.auto == "1"
    }
}
