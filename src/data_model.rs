//! The SCORM 1.2 runtime engine: the eight LMS API calls and the per-SCO
//! state they operate on.
//!
//! One `DataModel12` instance lives for one attempt playthrough. The host
//! constructs it with seed data for every SCO in the attempt, points the
//! embedded content at it, and switches SCOs with [`DataModel12::load_sco`];
//! partitions for other SCOs keep their values so a revisited SCO looks
//! exactly as it was left.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use event_emitter_rs::EventEmitter;

use crate::error::ErrorCode;
use crate::events::ScormEvent;
use crate::meta::{PlayMode, ScormMeta};
use crate::schema::{self, ElementDefinition, ElementMode, PatternCache};
use crate::tracks::{ScoUserData, TrackSink};
use crate::value::{DataValue, UserDataMap};

/// Default delay between a tracked write and the automatic commit it
/// schedules.
const AUTOCOMMIT_INTERVAL: Duration = Duration::from_secs(60);

/// SCORM 1.2 runtime data model.
///
/// All failures are reported through the SCORM error-code channel; the API
/// methods never panic or return `Result`. Return values are the string-typed
/// `"true"`/`"false"` booleans the SCORM runtime contract mandates.
pub struct DataModel12 {
    /// Validation metadata per SCO, extended at runtime with concrete entries
    /// for indexed elements so commit diffing can track each array slot.
    pub(crate) definitions: HashMap<u32, HashMap<String, ElementDefinition>>,
    /// Live element values per SCO, including the `._count` collection
    /// counters.
    pub(crate) user_data: HashMap<u32, UserDataMap>,
    pub(crate) sco_id: u32,
    pub(crate) attempt: u32,
    pub(crate) scorm: ScormMeta,
    pub(crate) mode: PlayMode,
    pub(crate) offline: bool,
    pub(crate) can_save_tracks: bool,
    pub(crate) initialized: bool,
    pub(crate) error_code: ErrorCode,
    pub(crate) autocommit_interval: Duration,
    pub(crate) autocommit_at: Option<Instant>,
    pub(crate) patterns: PatternCache,
    pub(crate) emitter: EventEmitter,
    pub(crate) sink: Box<dyn TrackSink>,
}

impl DataModel12 {
    /// Build the model for one attempt, creating a state partition for every
    /// SCO in `scos`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scorm: ScormMeta,
        sco_id: u32,
        attempt: u32,
        scos: Vec<ScoUserData>,
        mode: PlayMode,
        offline: bool,
        can_save_tracks: bool,
        sink: Box<dyn TrackSink>,
    ) -> DataModel12 {
        let mut definitions = HashMap::new();
        let mut user_data = HashMap::new();

        for sco in &scos {
            let (defs, userdata) = init_partition(sco, mode, scorm.standard);
            definitions.insert(sco.sco_id, defs);
            user_data.insert(sco.sco_id, userdata);
        }

        DataModel12 {
            definitions,
            user_data,
            sco_id,
            attempt,
            scorm,
            mode,
            offline,
            can_save_tracks,
            initialized: false,
            error_code: ErrorCode::NoError,
            autocommit_interval: AUTOCOMMIT_INTERVAL,
            autocommit_at: None,
            patterns: PatternCache::new(),
            emitter: EventEmitter::new(),
            sink,
        }
    }

    /// LMSInitialize. `param` must be empty; a second initialize without an
    /// intervening finish is a general exception.
    pub fn lms_initialize(&mut self, param: &str) -> &'static str {
        self.error_code = ErrorCode::NoError;

        if !param.is_empty() {
            self.error_code = ErrorCode::InvalidArgument;
            return "false";
        }
        if self.initialized {
            self.error_code = ErrorCode::GeneralException;
            return "false";
        }

        self.initialized = true;
        "true"
    }

    /// LMSGetValue. Returns the element's current value as a string, or ""
    /// with the error code set.
    pub fn lms_get_value(&mut self, element: &str) -> String {
        self.error_code = ErrorCode::NoError;

        if !self.initialized {
            self.error_code = ErrorCode::NotInitialized;
            return String::new();
        }
        if element.is_empty() {
            self.error_code = ErrorCode::InvalidArgument;
            return String::new();
        }

        let model = schema::normalize(element);
        let Some(defs) = self.definitions.get(&self.sco_id) else {
            self.error_code = ErrorCode::InvalidArgument;
            return String::new();
        };

        let found = defs.get(&model).map(|def| (def.mode, def.read_error));
        let miss = if found.is_none() {
            Some(lookup_miss(defs, &model))
        } else {
            None
        };

        match found {
            Some((mode, read_error)) => {
                if mode != ElementMode::WriteOnly {
                    return self.get_el(element).to_string();
                }
                self.error_code = read_error.unwrap_or(ErrorCode::NoError);
                String::new()
            }
            None => {
                self.error_code = miss.unwrap_or(ErrorCode::InvalidArgument);
                String::new()
            }
        }
    }

    /// LMSSetValue. Validates mode, format and range, grows indexed
    /// collections, and stores the value.
    pub fn lms_set_value(&mut self, element: &str, value: &str) -> &'static str {
        self.error_code = ErrorCode::NoError;

        if !self.initialized {
            self.error_code = ErrorCode::NotInitialized;
            return "false";
        }
        if element.is_empty() {
            self.error_code = ErrorCode::InvalidArgument;
            return "false";
        }

        let model = schema::normalize(element);
        let def = match self
            .definitions
            .get(&self.sco_id)
            .and_then(|defs| defs.get(&model))
        {
            Some(def) => def.clone(),
            None => {
                self.error_code = ErrorCode::InvalidArgument;
                return "false";
            }
        };

        if def.mode == ElementMode::ReadOnly {
            self.error_code = def.write_error;
            return "false";
        }

        if !self.patterns.matches(def.format.unwrap_or(""), value) {
            self.error_code = def.write_error;
            return "false";
        }

        // Indexed element: seed per-instance defaults and grow collections
        // along the path. A skip-ahead index sets 201, which blocks the store
        // below.
        let mut target = element.to_string();
        if target != model {
            self.seed_dynamic_defaults(element);
            target = self.grow_collections(element);
        }

        if self.error_code != ErrorCode::NoError {
            return "false";
        }

        if self.scorm.autocommit && self.autocommit_at.is_none() {
            self.autocommit_at = Some(Instant::now() + self.autocommit_interval);
        }

        if let Some(range) = def.range {
            let (min, max) = split_range(range);
            let number = DataValue::str(value).as_number();
            if number >= min && number <= max {
                self.set_el(target, DataValue::Num(number));
                return "true";
            }
            self.error_code = def.write_error;
            return "false";
        }

        if target == "cmi.comments" {
            // Comments accumulate; writes append rather than replace.
            let comments = self.get_el("cmi.comments").to_string();
            self.set_el("cmi.comments", comments + value);
        } else {
            self.set_el(target, value);
        }
        "true"
    }

    /// LMSCommit. Cancels any pending autocommit, persists the current diff,
    /// and notifies the host that the TOC may have changed.
    pub fn lms_commit(&mut self, param: &str) -> &'static str {
        self.autocommit_at = None;
        self.error_code = ErrorCode::NoError;

        if !param.is_empty() {
            self.error_code = ErrorCode::InvalidArgument;
            return "false";
        }
        if !self.initialized {
            self.error_code = ErrorCode::NotInitialized;
            return "false";
        }

        let ok = self.store_data(false);
        self.trigger_event(crate::events::UPDATE_TOC_EVENT);
        self.error_code = if ok {
            ErrorCode::NoError
        } else {
            ErrorCode::GeneralException
        };
        if ok {
            "true"
        } else {
            "false"
        }
    }

    /// LMSFinish. Ends the session, persists with total-time bookkeeping, and
    /// emits the navigation event the content requested (or auto-advance).
    pub fn lms_finish(&mut self, param: &str) -> &'static str {
        self.error_code = ErrorCode::NoError;

        if !param.is_empty() {
            self.error_code = ErrorCode::InvalidArgument;
            return "false";
        }
        if !self.initialized {
            self.error_code = ErrorCode::NotInitialized;
            return "false";
        }

        self.initialized = false;
        self.autocommit_at = None;

        let ok = self.store_data(true);

        let nav_event = self.get_el("nav.event").to_string();
        if !nav_event.is_empty() {
            if nav_event == "continue" {
                self.trigger_event(crate::events::LAUNCH_NEXT_SCO_EVENT);
            } else {
                self.trigger_event(crate::events::LAUNCH_PREV_SCO_EVENT);
            }
        } else if self.scorm.auto_advance() {
            self.trigger_event(crate::events::LAUNCH_NEXT_SCO_EVENT);
        }

        self.error_code = if ok {
            ErrorCode::NoError
        } else {
            ErrorCode::GeneralException
        };
        self.trigger_event(crate::events::UPDATE_TOC_EVENT);
        if ok {
            "true"
        } else {
            "false"
        }
    }

    /// LMSGetLastError. The code of the last call's outcome, as a string.
    pub fn lms_get_last_error(&self) -> String {
        self.error_code.code().to_string()
    }

    /// LMSGetErrorString. Human-readable message for a code; "" for an empty
    /// or unknown code.
    pub fn lms_get_error_string(&self, param: &str) -> String {
        if param.is_empty() {
            return String::new();
        }
        crate::error::error_string(param).to_string()
    }

    /// LMSGetDiagnostic. Echoes `param`, or the current error code when
    /// `param` is empty.
    pub fn lms_get_diagnostic(&self, param: &str) -> String {
        if param.is_empty() {
            return self.error_code.code().to_string();
        }
        param.to_string()
    }

    /// Re-point the engine at another SCO's state partition. Values already
    /// loaded for other SCOs are kept.
    pub fn load_sco(&mut self, sco_id: u32) {
        self.sco_id = sco_id;
    }

    /// Flip the persistence mode (the host calls this when connectivity is
    /// regained or lost outside a commit).
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn play_mode(&self) -> PlayMode {
        self.mode
    }

    pub fn current_sco(&self) -> u32 {
        self.sco_id
    }

    /// Override the delay between a tracked write and the deferred commit it
    /// schedules. Applies to writes after the call; a deadline already
    /// scheduled keeps its original delay.
    pub fn set_autocommit_interval(&mut self, interval: Duration) {
        self.autocommit_interval = interval;
    }

    /// Whether an autocommit is scheduled and has not fired yet.
    pub fn autocommit_pending(&self) -> bool {
        self.autocommit_at.is_some()
    }

    /// Host-driven tick for the deferred commit: fires `LMSCommit("")` once
    /// the scheduled deadline has passed. Returns whether a commit ran.
    pub fn poll_autocommit(&mut self) -> bool {
        match self.autocommit_at {
            Some(deadline) if Instant::now() >= deadline => {
                self.lms_commit("");
                true
            }
            _ => false,
        }
    }

    /// Subscribe a host listener to one of the notification events. The
    /// payload is a JSON-encoded [`ScormEvent`].
    pub fn on<F>(&mut self, event: &str, listener: F) -> String
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.emitter.on(event, listener)
    }

    pub(crate) fn trigger_event(&mut self, name: &str) {
        let payload = ScormEvent {
            scorm_id: self.scorm.id,
            sco_id: self.sco_id,
            attempt: self.attempt,
        };
        match serde_json::to_string(&payload) {
            Ok(json) => {
                self.emitter.emit(name, json);
            }
            Err(err) => log::warn!("failed to encode {} payload: {}", name, err),
        }
    }

    /// Current value of an element in the active SCO, "" when unset.
    pub(crate) fn get_el(&self, element: &str) -> DataValue {
        self.user_data
            .get(&self.sco_id)
            .and_then(|userdata| userdata.get(element))
            .cloned()
            .unwrap_or_else(|| DataValue::str(""))
    }

    pub(crate) fn set_el(&mut self, element: impl Into<String>, value: impl Into<DataValue>) {
        self.user_data
            .entry(self.sco_id)
            .or_default()
            .insert(element.into(), value.into());
    }

    fn has_el(&self, element: &str) -> bool {
        self.user_data
            .get(&self.sco_id)
            .is_some_and(|userdata| userdata.contains_key(element))
    }

    /// First write to an indexed objective or interaction seeds the sibling
    /// structures content expects to read back: the objective score block,
    /// and the interaction's nested collection counters.
    fn seed_dynamic_defaults(&mut self, element: &str) {
        if element.starts_with("cmi.objectives") {
            if let Some(n) = schema::first_index(element) {
                let score = format!("cmi.objectives.{}.score", n);
                let children = format!("{}._children", score);
                if !self.has_el(&children) {
                    self.set_el(children, schema::SCORE_CHILDREN);
                    self.set_el(format!("{}.raw", score), "");
                    self.set_el(format!("{}.min", score), "");
                    self.set_el(format!("{}.max", score), "");
                }
            }
        } else if element.starts_with("cmi.interactions") {
            if let Some(n) = schema::first_index(element) {
                for collection in ["objectives", "correct_responses"] {
                    let counter = format!("cmi.interactions.{}.{}._count", n, collection);
                    if !self.has_el(&counter) {
                        self.set_el(counter, 0u32);
                    }
                }
            }
        }
    }

    /// Walk the dotted path; each numeric segment addresses a collection
    /// whose `._count` grows by one when written at exactly the counter
    /// value. Writing past the counter is a 201 (append-only, contiguous).
    /// Returns the rebuilt concrete element name.
    fn grow_collections(&mut self, element: &str) -> String {
        let parts: Vec<&str> = element.split('.').collect();
        let mut sub = String::from("cmi");
        let mut i = 1;

        while i + 1 < parts.len() {
            let segment = parts[i];
            let next = parts[i + 1];

            if is_numeric(next) {
                let counter = format!("{}.{}._count", sub, segment);
                if !self.has_el(&counter) {
                    self.set_el(counter.clone(), 0u32);
                }

                let count = self.get_el(&counter).as_number();
                let index: f64 = next.parse().unwrap_or(f64::NAN);
                if index == count {
                    self.set_el(counter, DataValue::Num(count + 1.0));
                }
                if index > count {
                    self.error_code = ErrorCode::InvalidArgument;
                }

                sub = format!("{}.{}.{}", sub, segment, next);
                i += 2;
            } else {
                sub = format!("{}.{}", sub, segment);
                i += 1;
            }
        }

        format!("{}.{}", sub, parts[parts.len() - 1])
    }
}

/// Diagnostic for a failed template lookup: a `_children`/`_count` request on
/// an element that exists but has no such keyword gets the specific 202/203,
/// anything else the generic 201.
fn lookup_miss(defs: &HashMap<String, ElementDefinition>, model: &str) -> ErrorCode {
    if let Some(parent) = model.strip_suffix("._children") {
        if defs.contains_key(parent) {
            return ErrorCode::NoChildren;
        }
    } else if let Some(parent) = model.strip_suffix("._count") {
        if defs.contains_key(parent) {
            return ErrorCode::NotAnArray;
        }
    }
    ErrorCode::InvalidArgument
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn split_range(range: &str) -> (f64, f64) {
    let mut bounds = range.split('#');
    let min = bounds
        .next()
        .and_then(|b| b.parse().ok())
        .unwrap_or(f64::NAN);
    let max = bounds
        .next()
        .and_then(|b| b.parse().ok())
        .unwrap_or(f64::NAN);
    (min, max)
}

/// Build one SCO's definition table and live value map from its seed data.
fn init_partition(
    sco: &ScoUserData,
    mode: PlayMode,
    standard: bool,
) -> (HashMap<String, ElementDefinition>, UserDataMap) {
    let defs = schema::data_model(&sco.defaultdata, standard);
    let mut userdata = UserDataMap::new();

    // Defaults for every non-indexed element in the schema.
    for (element, def) in &defs {
        if !def.indexed {
            if let Some(default) = &def.default_value {
                userdata.insert(element.clone(), default.clone());
            }
        }
    }

    // Host-supplied defaults, falling back to previously persisted values.
    for element in sco.defaultdata.keys() {
        if element.contains(".n.") {
            continue;
        }
        match defs.get(element) {
            Some(def) => {
                if let Some(default) = &def.default_value {
                    userdata.insert(element.clone(), default.clone());
                } else if let Some(value) = sco.userdata.get(element) {
                    userdata.insert(element.clone(), value.clone());
                } else {
                    userdata.insert(element.clone(), DataValue::str(""));
                }
            }
            None => {
                log::debug!("ignoring unknown default element {}", element);
            }
        }
    }

    // Reconstruct indexed elements persisted by earlier sessions (stored in
    // underscore notation) and rebuild the collection counters from the
    // indices seen.
    for (element, value) in &sco.userdata {
        if !schema::is_indexed(element) {
            continue;
        }

        let dotted = schema::to_dot(element);
        userdata.insert(dotted.clone(), value.clone());

        let located = locate_counter(&dotted);
        let Some((counter, index)) = located else {
            continue;
        };

        let prior = userdata.get(&counter).cloned();
        if prior.is_none() {
            userdata.insert(counter.clone(), DataValue::Num(0.0));
        }
        // Comparisons run against the pre-seed counter value; a freshly
        // seeded counter stays at zero until the next element for the same
        // collection arrives.
        if let Some(prior) = prior {
            let count = prior.as_number();
            let index = index as f64;
            if index == count {
                userdata.insert(counter.clone(), DataValue::Num(count + 1.0));
            }
            if index > count {
                userdata.insert(counter, DataValue::Num(index - 1.0));
            }
        }
    }

    // Unattempted SCOs report "not attempted" until content says otherwise.
    if userdata.get("cmi.core.lesson_status") == Some(&DataValue::str("")) {
        userdata.insert(
            "cmi.core.lesson_status".to_string(),
            DataValue::str("not attempted"),
        );
    }

    // Mode and credit come from the attempt, never from seed data.
    let credit = if mode == PlayMode::Normal {
        "credit"
    } else {
        "no-credit"
    };
    userdata.insert("cmi.core.credit".to_string(), DataValue::str(credit));
    userdata.insert(
        "cmi.core.lesson_mode".to_string(),
        DataValue::str(mode.as_str()),
    );

    (defs, userdata)
}

/// Which `._count` element an indexed name belongs to, and the index it
/// occupies there.
fn locate_counter(dotted: &str) -> Option<(String, u32)> {
    if dotted.starts_with("cmi.evaluation.comments") {
        return Some((
            "cmi.evaluation.comments._count".to_string(),
            schema::first_index(dotted).unwrap_or(0),
        ));
    }
    if dotted.starts_with("cmi.objectives") {
        return Some((
            "cmi.objectives._count".to_string(),
            schema::first_index(dotted).unwrap_or(0),
        ));
    }
    if dotted.starts_with("cmi.interactions") {
        let n = schema::first_index(dotted).unwrap_or(0);
        if dotted.contains(".objectives.") {
            return Some((
                format!("cmi.interactions.{}.objectives._count", n),
                schema::objectives_index(dotted).unwrap_or(0),
            ));
        }
        if dotted.contains(".correct_responses.") {
            return Some((
                format!("cmi.interactions.{}.correct_responses._count", n),
                schema::correct_responses_index(dotted).unwrap_or(0),
            ));
        }
        return Some(("cmi.interactions._count".to_string(), n));
    }
    None
}
