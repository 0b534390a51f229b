use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use scorm_runtime::{DataEntry, DataValue, ScormMeta, TrackSink, UserDataMap};

/// One recorded `save_tracks` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkCall {
    pub sco_id: u32,
    pub attempt: u32,
    pub offline: bool,
    pub tracks: Vec<DataEntry>,
}

impl SinkCall {
    pub fn value_of(&self, element: &str) -> Option<DataValue> {
        self.tracks
            .iter()
            .find(|entry| entry.element == element)
            .map(|entry| entry.value.clone())
    }
}

/// Test sink that records every call and answers from a scripted outcome
/// queue (defaulting to success once the script runs out). Clones share the
/// same record, so a handle kept by the test observes calls made through the
/// model's boxed copy.
#[derive(Clone, Default)]
pub struct ScriptedSink {
    outcomes: Arc<Mutex<VecDeque<bool>>>,
    calls: Arc<Mutex<Vec<SinkCall>>>,
}

impl ScriptedSink {
    pub fn new() -> ScriptedSink {
        ScriptedSink::default()
    }

    pub fn script(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.outcomes.lock().unwrap().extend(outcomes);
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl TrackSink for ScriptedSink {
    fn save_tracks(
        &mut self,
        sco_id: u32,
        attempt: u32,
        tracks: &[DataEntry],
        _scorm: &ScormMeta,
        offline: bool,
        _snapshot: &HashMap<u32, UserDataMap>,
    ) -> bool {
        self.calls.lock().unwrap().push(SinkCall {
            sco_id,
            attempt,
            offline,
            tracks: tracks.to_vec(),
        });
        self.outcomes.lock().unwrap().pop_front().unwrap_or(true)
    }
}
