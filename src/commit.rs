//! The commit engine: diff the live user data against the last persisted
//! state, hand the batch to the track sink, and fall back to offline storage
//! when an online save fails.

use crate::data_model::DataModel12;
use crate::events::GO_OFFLINE_EVENT;
use crate::meta::PlayMode;
use crate::schema::{self, ElementMode};
use crate::time::add_times;
use crate::tracks::DataEntry;
use crate::value::DataValue;

impl DataModel12 {
    /// Collect every `cmi.*` element whose value differs from its last
    /// persisted default. Indexed elements get a concrete definition entry
    /// (cloned from the `.n.` template) on first contact so each array slot
    /// diffs independently, and are re-addressed to the host store's
    /// underscore notation.
    pub(crate) fn collect_data(&mut self) -> Vec<DataEntry> {
        let sco_id = self.sco_id;
        let Some(userdata) = self.user_data.get(&sco_id) else {
            return Vec::new();
        };
        let Some(defs) = self.definitions.get_mut(&sco_id) else {
            return Vec::new();
        };

        let mut data = Vec::new();

        for (element, value) in userdata {
            // Session time is write-only input for total-time arithmetic and
            // nav.* elements are runtime-local; neither is a tracked fact.
            if !element.starts_with("cmi") || element == "cmi.core.session_time" {
                continue;
            }

            if !defs.contains_key(element) {
                let model = schema::normalize(element);
                if let Some(template) = defs.get(&model).cloned() {
                    defs.insert(element.clone(), template);
                }
            }

            let Some(def) = defs.get_mut(element) else {
                continue;
            };
            if def.mode == ElementMode::ReadOnly {
                continue;
            }

            // Type-and-value comparison: a numeric write over a string
            // default counts as changed and must be re-sent.
            let unchanged = def
                .default_value
                .as_ref()
                .is_some_and(|default| default == value);
            if unchanged {
                continue;
            }

            def.default_value = Some(value.clone());
            data.push(DataEntry {
                element: schema::to_underscore(element),
                value: value.clone(),
            });
        }

        log::debug!(
            "collected {} changed element(s) for sco {}",
            data.len(),
            sco_id
        );
        data
    }

    /// Persist the current diff. With `store_total_time` (finish), first
    /// finalize the lesson status and append the synthesized total-time
    /// entry, which is always sent.
    pub(crate) fn store_data(&mut self, store_total_time: bool) -> bool {
        if !self.can_save_tracks {
            return true;
        }

        let tracks = if store_total_time {
            self.finalize_status();
            let mut tracks = self.collect_data();
            tracks.push(self.total_time_entry());
            tracks
        } else {
            self.collect_data()
        };

        let ok = self.sink.save_tracks(
            self.sco_id,
            self.attempt,
            &tracks,
            &self.scorm,
            self.offline,
            &self.user_data,
        );

        if self.offline || ok {
            return ok;
        }

        // Online save failed: degrade to offline storage and retry the same
        // batch once. The retry's outcome is the operation's outcome.
        log::warn!(
            "online track save failed for sco {} attempt {}; switching to offline storage",
            self.sco_id,
            self.attempt
        );
        self.offline = true;
        self.trigger_event(GO_OFFLINE_EVENT);

        self.sink.save_tracks(
            self.sco_id,
            self.attempt,
            &tracks,
            &self.scorm,
            self.offline,
            &self.user_data,
        )
    }

    /// Derived completion and pass/fail logic applied on finish, before
    /// collecting the batch.
    fn finalize_status(&mut self) {
        if self.get_el("cmi.core.lesson_status") == DataValue::str("not attempted") {
            self.set_el("cmi.core.lesson_status", "completed");
        }

        let lesson_mode = self.get_el("cmi.core.lesson_mode").to_string();

        if lesson_mode == PlayMode::Normal.as_str()
            && self.get_el("cmi.core.credit") == DataValue::str("credit")
        {
            let mastery = self.get_el("cmi.student_data.mastery_score").to_string();
            let raw = self.get_el("cmi.core.score.raw").to_string();
            if !mastery.is_empty() && !raw.is_empty() {
                let passed = raw.parse::<f64>().unwrap_or(f64::NAN)
                    >= mastery.parse::<f64>().unwrap_or(f64::NAN);
                self.set_el(
                    "cmi.core.lesson_status",
                    if passed { "passed" } else { "failed" },
                );
            }
        }

        if lesson_mode == PlayMode::Browse.as_str() {
            let no_persisted_status = self
                .definitions
                .get(&self.sco_id)
                .and_then(|defs| defs.get("cmi.core.lesson_status"))
                .is_some_and(|def| def.default_value == Some(DataValue::str("")));
            if no_persisted_status
                && self.get_el("cmi.core.lesson_status") == DataValue::str("not attempted")
            {
                self.set_el("cmi.core.lesson_status", "browsed");
            }
        }
    }

    /// Previous total time plus this session's time, synthesized directly
    /// rather than read from user data.
    fn total_time_entry(&self) -> DataEntry {
        let total = add_times(
            &self.get_el("cmi.core.total_time").to_string(),
            &self.get_el("cmi.core.session_time").to_string(),
        );
        DataEntry::new("cmi.core.total_time", total)
    }
}
