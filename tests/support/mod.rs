pub mod sink;

use scorm_runtime::{DataModel12, DataValue, PlayMode, ScoUserData, ScormMeta, TrackSink};

/// Seed data shaped like what a host supplies for a fresh SCO: every core
/// element present with its LMS default.
pub fn seed_sco(sco_id: u32) -> ScoUserData {
    let mut sco = ScoUserData::new(sco_id);
    for (element, value) in [
        ("cmi.core.student_id", "42"),
        ("cmi.core.student_name", "Learner, Test"),
        ("cmi.core.lesson_location", ""),
        ("cmi.core.credit", "credit"),
        ("cmi.core.lesson_status", ""),
        ("cmi.core.entry", "ab-initio"),
        ("cmi.core.score.raw", ""),
        ("cmi.core.score.max", ""),
        ("cmi.core.score.min", ""),
        ("cmi.core.total_time", "00:00:00"),
        ("cmi.core.exit", ""),
        ("cmi.suspend_data", ""),
        ("cmi.launch_data", ""),
        ("cmi.comments", ""),
        ("cmi.student_data.mastery_score", ""),
        ("cmi.student_data.max_time_allowed", ""),
        ("cmi.student_data.time_limit_action", ""),
    ] {
        sco.defaultdata
            .insert(element.to_string(), DataValue::str(value));
    }
    sco
}

pub fn meta() -> ScormMeta {
    ScormMeta::new(99)
}

/// A model over one freshly seeded SCO with the given sink.
pub fn model_with_sink(sink: Box<dyn TrackSink>) -> DataModel12 {
    model_with(meta(), PlayMode::Normal, seed_sco(1), sink)
}

pub fn model_with(
    meta: ScormMeta,
    mode: PlayMode,
    sco: ScoUserData,
    sink: Box<dyn TrackSink>,
) -> DataModel12 {
    let sco_id = sco.sco_id;
    DataModel12::new(meta, sco_id, 1, vec![sco], mode, false, true, sink)
}

/// A model ready for API calls: initialized, recording sink discarded.
pub fn initialized_model() -> DataModel12 {
    let mut dm = model_with_sink(Box::new(sink::ScriptedSink::new()));
    assert_eq!(dm.lms_initialize(""), "true");
    dm
}
