//! The persistence boundary: outbound track batches and the sink that
//! stores them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::meta::ScormMeta;
use crate::value::{DataValue, UserDataMap};

/// One tracked change queued for persistence. The element name uses the host
/// store's underscore-indexed addressing (`cmi.objectives_2.id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    pub element: String,
    pub value: DataValue,
}

impl DataEntry {
    pub fn new(element: impl Into<String>, value: impl Into<DataValue>) -> DataEntry {
        DataEntry {
            element: element.into(),
            value: value.into(),
        }
    }
}

/// Seed data the host supplies for one SCO at model construction:
/// `defaultdata` holds the LMS defaults per element, `userdata` the values
/// persisted by earlier sessions (indexed elements in underscore notation).
#[derive(Debug, Clone, Default)]
pub struct ScoUserData {
    pub sco_id: u32,
    pub defaultdata: UserDataMap,
    pub userdata: UserDataMap,
}

impl ScoUserData {
    pub fn new(sco_id: u32) -> ScoUserData {
        ScoUserData {
            sco_id,
            defaultdata: UserDataMap::new(),
            userdata: UserDataMap::new(),
        }
    }
}

/// Where committed track batches go.
///
/// The commit engine calls this synchronously and only looks at the boolean
/// outcome; a host backed by async I/O must buffer internally. A `false`
/// return while online triggers the offline fallback.
pub trait TrackSink {
    fn save_tracks(
        &mut self,
        sco_id: u32,
        attempt: u32,
        tracks: &[DataEntry],
        scorm: &ScormMeta,
        offline: bool,
        snapshot: &HashMap<u32, UserDataMap>,
    ) -> bool;
}

/// In-memory [`TrackSink`] that records every batch per `(sco, attempt)`.
///
/// Doubles as the offline store in hosts that sync later and as a test
/// double; clones share the same storage.
#[derive(Clone, Default)]
pub struct MemoryTrackStore {
    storage: Arc<RwLock<HashMap<(u32, u32), Vec<Vec<DataEntry>>>>>,
}

impl MemoryTrackStore {
    pub fn new() -> MemoryTrackStore {
        MemoryTrackStore {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// All batches stored for a SCO attempt, oldest first.
    pub fn batches(&self, sco_id: u32, attempt: u32) -> Vec<Vec<DataEntry>> {
        self.storage
            .read()
            .map(|storage| storage.get(&(sco_id, attempt)).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Last stored value for an element (underscore addressing), if any
    /// batch carried it.
    pub fn latest(&self, sco_id: u32, attempt: u32, element: &str) -> Option<DataValue> {
        self.batches(sco_id, attempt)
            .iter()
            .rev()
            .find_map(|batch| {
                batch
                    .iter()
                    .rev()
                    .find(|entry| entry.element == element)
                    .map(|entry| entry.value.clone())
            })
    }
}

impl TrackSink for MemoryTrackStore {
    fn save_tracks(
        &mut self,
        sco_id: u32,
        attempt: u32,
        tracks: &[DataEntry],
        _scorm: &ScormMeta,
        _offline: bool,
        _snapshot: &HashMap<u32, UserDataMap>,
    ) -> bool {
        match self.storage.write() {
            Ok(mut storage) => {
                storage
                    .entry((sco_id, attempt))
                    .or_default()
                    .push(tracks.to_vec());
                true
            }
            Err(_) => false,
        }
    }
}
