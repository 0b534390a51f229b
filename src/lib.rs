mod commit;
mod data_model;
mod error;
mod events;
mod meta;
mod schema;
mod time;
mod tracks;
mod value;

pub use data_model::DataModel12;
pub use error::{error_string, ErrorCode};
pub use events::{
    ScormEvent, GO_OFFLINE_EVENT, LAUNCH_NEXT_SCO_EVENT, LAUNCH_PREV_SCO_EVENT, UPDATE_TOC_EVENT,
};
pub use meta::{PlayMode, ScormMeta};
pub use schema::{data_model, normalize, to_dot, to_underscore, ElementDefinition, ElementMode};
pub use time::add_times;
pub use tracks::{DataEntry, MemoryTrackStore, ScoUserData, TrackSink};
pub use value::{DataValue, UserDataMap};

// Re-export the EventEmitter from the event_emitter_rs crate
pub use event_emitter_rs::EventEmitter;
