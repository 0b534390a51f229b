mod support;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use scorm_runtime::{
    DataModel12, DataValue, PlayMode, ScormEvent, ScormMeta, GO_OFFLINE_EVENT,
    LAUNCH_NEXT_SCO_EVENT, LAUNCH_PREV_SCO_EVENT, UPDATE_TOC_EVENT,
};
use support::sink::ScriptedSink;

fn record_event(dm: &mut DataModel12, event: &str, label: &str, log: &Arc<Mutex<Vec<String>>>) {
    let log = Arc::clone(log);
    let label = label.to_string();
    dm.on(event, move |_payload: String| {
        log.lock().unwrap().push(label.clone());
    });
}

fn events_named(log: &Arc<Mutex<Vec<String>>>, label: &str) -> usize {
    // Listeners run on their own threads; give them time to land.
    thread::sleep(Duration::from_millis(50));
    log.lock().unwrap().iter().filter(|l| *l == label).count()
}

#[test]
fn commit_param_and_state_guards() {
    let sink = ScriptedSink::new();
    let mut dm = support::model_with_sink(Box::new(sink.clone()));

    assert_eq!(dm.lms_commit(""), "false");
    assert_eq!(dm.lms_get_last_error(), "301");

    dm.lms_initialize("");
    assert_eq!(dm.lms_commit("x"), "false");
    assert_eq!(dm.lms_get_last_error(), "201");

    assert!(sink.calls().is_empty());
}

#[test]
fn commit_sends_only_changed_elements() {
    let sink = ScriptedSink::new();
    let mut dm = support::model_with_sink(Box::new(sink.clone()));
    let log = Arc::new(Mutex::new(Vec::new()));
    record_event(&mut dm, UPDATE_TOC_EVENT, "toc", &log);

    dm.lms_initialize("");
    dm.lms_set_value("cmi.core.lesson_location", "page-2");

    assert_eq!(dm.lms_commit(""), "true");
    let calls = sink.calls();
    assert_eq!(calls.len(), 1);
    // The forced "not attempted" status differs from the empty persisted
    // default, so it rides along with the explicit write.
    assert_eq!(
        calls[0].value_of("cmi.core.lesson_location"),
        Some(DataValue::str("page-2"))
    );
    assert_eq!(
        calls[0].value_of("cmi.core.lesson_status"),
        Some(DataValue::str("not attempted"))
    );
    assert_eq!(calls[0].tracks.len(), 2);

    // Nothing changed since: the follow-up batch is empty but still succeeds
    // and still refreshes the TOC.
    assert_eq!(dm.lms_commit(""), "true");
    let calls = sink.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].tracks.is_empty());
    assert_eq!(events_named(&log, "toc"), 2);

    // A numeric write shows up in the next batch as a number.
    dm.lms_set_value("cmi.core.score.raw", "85");
    assert_eq!(dm.lms_commit(""), "true");
    let calls = sink.calls();
    assert_eq!(
        calls[2].value_of("cmi.core.score.raw"),
        Some(DataValue::Num(85.0))
    );
    assert_eq!(calls[2].tracks.len(), 1);
}

#[test]
fn indexed_elements_are_readdressed_for_the_host() {
    let sink = ScriptedSink::new();
    let mut dm = support::model_with_sink(Box::new(sink.clone()));
    dm.lms_initialize("");

    dm.lms_set_value("cmi.objectives.0.id", "obj1");
    dm.lms_set_value("cmi.interactions.0.id", "q-1");
    dm.lms_set_value("cmi.interactions.0.correct_responses.0.pattern", "b");

    assert_eq!(dm.lms_commit(""), "true");
    let call = &sink.calls()[0];

    assert_eq!(call.value_of("cmi.objectives_0.id"), Some(DataValue::str("obj1")));
    assert_eq!(call.value_of("cmi.interactions_0.id"), Some(DataValue::str("q-1")));
    assert_eq!(
        call.value_of("cmi.interactions_0.correct_responses_0.pattern"),
        Some(DataValue::str("b"))
    );
    // Counters are read-only keywords and never leave the runtime.
    assert_eq!(call.value_of("cmi.objectives._count"), None);
    // nav elements are runtime-local.
    assert!(call.tracks.iter().all(|t| t.element.starts_with("cmi")));
}

#[test]
fn failed_online_save_falls_back_to_offline_once() {
    let sink = ScriptedSink::new();
    sink.script([false, true]);
    let mut dm = support::model_with_sink(Box::new(sink.clone()));
    let log = Arc::new(Mutex::new(Vec::new()));
    record_event(&mut dm, GO_OFFLINE_EVENT, "offline", &log);

    dm.lms_initialize("");
    dm.lms_set_value("cmi.core.lesson_location", "page-1");

    assert_eq!(dm.lms_commit(""), "true");
    assert_eq!(dm.lms_get_last_error(), "0");
    assert!(dm.is_offline());
    assert_eq!(events_named(&log, "offline"), 1);

    let calls = sink.calls();
    assert_eq!(calls.len(), 2);
    assert!(!calls[0].offline);
    assert!(calls[1].offline);
    // The retry carries the exact same batch.
    assert_eq!(calls[0].tracks, calls[1].tracks);

    // Later commits go straight to offline storage without re-notifying.
    dm.lms_set_value("cmi.core.lesson_location", "page-2");
    assert_eq!(dm.lms_commit(""), "true");
    assert_eq!(sink.calls().len(), 3);
    assert!(sink.calls()[2].offline);
    assert_eq!(events_named(&log, "offline"), 1);
}

#[test]
fn offline_save_failure_is_a_general_exception() {
    let sink = ScriptedSink::new();
    sink.script([false]);
    let mut dm = support::model_with_sink(Box::new(sink.clone()));
    let log = Arc::new(Mutex::new(Vec::new()));
    record_event(&mut dm, GO_OFFLINE_EVENT, "offline", &log);

    dm.set_offline(true);
    dm.lms_initialize("");

    assert_eq!(dm.lms_commit(""), "false");
    assert_eq!(dm.lms_get_last_error(), "101");
    assert_eq!(sink.calls().len(), 1);
    assert_eq!(events_named(&log, "offline"), 0);
}

#[test]
fn finish_emits_the_requested_navigation_event() {
    // Explicit continue.
    let sink = ScriptedSink::new();
    let mut dm = support::model_with_sink(Box::new(sink.clone()));
    let log = Arc::new(Mutex::new(Vec::new()));
    record_event(&mut dm, LAUNCH_NEXT_SCO_EVENT, "next", &log);
    record_event(&mut dm, LAUNCH_PREV_SCO_EVENT, "prev", &log);
    dm.lms_initialize("");
    dm.lms_set_value("nav.event", "continue");
    assert_eq!(dm.lms_finish(""), "true");
    assert_eq!(events_named(&log, "next"), 1);
    assert_eq!(events_named(&log, "prev"), 0);

    // Explicit previous.
    let mut dm = support::model_with_sink(Box::new(ScriptedSink::new()));
    let log = Arc::new(Mutex::new(Vec::new()));
    record_event(&mut dm, LAUNCH_NEXT_SCO_EVENT, "next", &log);
    record_event(&mut dm, LAUNCH_PREV_SCO_EVENT, "prev", &log);
    dm.lms_initialize("");
    dm.lms_set_value("nav.event", "previous");
    dm.lms_finish("");
    assert_eq!(events_named(&log, "next"), 0);
    assert_eq!(events_named(&log, "prev"), 1);
}

#[test]
fn finish_auto_advances_when_configured() {
    let mut meta = support::meta();
    meta.auto = "1".to_string();
    let mut dm = support::model_with(
        meta,
        PlayMode::Normal,
        support::seed_sco(1),
        Box::new(ScriptedSink::new()),
    );
    let log = Arc::new(Mutex::new(Vec::new()));
    record_event(&mut dm, LAUNCH_NEXT_SCO_EVENT, "next", &log);
    record_event(&mut dm, UPDATE_TOC_EVENT, "toc", &log);

    dm.lms_initialize("");
    assert_eq!(dm.lms_finish(""), "true");
    assert!(!dm.is_initialized());
    assert_eq!(events_named(&log, "next"), 1);
    assert_eq!(events_named(&log, "toc"), 1);
}

#[test]
fn finish_without_nav_or_auto_stays_put() {
    let mut dm = support::model_with_sink(Box::new(ScriptedSink::new()));
    let log = Arc::new(Mutex::new(Vec::new()));
    record_event(&mut dm, LAUNCH_NEXT_SCO_EVENT, "next", &log);
    record_event(&mut dm, LAUNCH_PREV_SCO_EVENT, "prev", &log);

    dm.lms_initialize("");
    dm.lms_finish("");
    assert_eq!(events_named(&log, "next"), 0);
    assert_eq!(events_named(&log, "prev"), 0);
}

#[test]
fn finish_adds_session_time_to_total_time() {
    let sink = ScriptedSink::new();
    let mut sco = support::seed_sco(1);
    sco.defaultdata.insert(
        "cmi.core.total_time".to_string(),
        DataValue::str("00:00:45"),
    );
    let mut dm = support::model_with(support::meta(), PlayMode::Normal, sco, Box::new(sink.clone()));

    dm.lms_initialize("");
    dm.lms_set_value("cmi.core.session_time", "00:01:30");
    assert_eq!(dm.lms_finish(""), "true");

    let call = &sink.calls()[0];
    // Synthesized directly, so it is always the last entry in the batch.
    let last = call.tracks.last().unwrap();
    assert_eq!(last.element, "cmi.core.total_time");
    assert_eq!(last.value, DataValue::str("00:02:15"));
    // Session time itself is never persisted.
    assert_eq!(call.value_of("cmi.core.session_time"), None);
}

#[test]
fn total_time_hours_accumulate_past_midnight() {
    let sink = ScriptedSink::new();
    let mut sco = support::seed_sco(1);
    sco.defaultdata.insert(
        "cmi.core.total_time".to_string(),
        DataValue::str("23:59:50"),
    );
    let mut dm = support::model_with(support::meta(), PlayMode::Normal, sco, Box::new(sink.clone()));

    dm.lms_initialize("");
    dm.lms_set_value("cmi.core.session_time", "00:00:20");
    dm.lms_finish("");

    let call = &sink.calls()[0];
    assert_eq!(
        call.value_of("cmi.core.total_time"),
        Some(DataValue::str("24:00:10"))
    );
}

#[test]
fn finish_completes_an_unattempted_sco() {
    let sink = ScriptedSink::new();
    let mut dm = support::model_with_sink(Box::new(sink.clone()));

    dm.lms_initialize("");
    dm.lms_finish("");

    let call = &sink.calls()[0];
    assert_eq!(
        call.value_of("cmi.core.lesson_status"),
        Some(DataValue::str("completed"))
    );
}

#[test]
fn finish_derives_pass_fail_from_mastery_score() {
    for (raw, expected) in [("85", "passed"), ("40", "failed"), ("60", "passed")] {
        let sink = ScriptedSink::new();
        let mut sco = support::seed_sco(1);
        sco.defaultdata.insert(
            "cmi.student_data.mastery_score".to_string(),
            DataValue::str("60"),
        );
        let mut dm =
            support::model_with(support::meta(), PlayMode::Normal, sco, Box::new(sink.clone()));

        dm.lms_initialize("");
        dm.lms_set_value("cmi.core.score.raw", raw);
        dm.lms_finish("");

        let call = &sink.calls()[0];
        assert_eq!(
            call.value_of("cmi.core.lesson_status"),
            Some(DataValue::str(expected)),
            "score {} should yield {}",
            raw,
            expected
        );
    }
}

#[test]
fn browse_mode_earns_no_credit_and_no_pass_fail() {
    let sink = ScriptedSink::new();
    let mut sco = support::seed_sco(1);
    sco.defaultdata.insert(
        "cmi.student_data.mastery_score".to_string(),
        DataValue::str("60"),
    );
    let mut dm =
        support::model_with(support::meta(), PlayMode::Browse, sco, Box::new(sink.clone()));

    dm.lms_initialize("");
    assert_eq!(dm.lms_get_value("cmi.core.credit"), "no-credit");
    dm.lms_set_value("cmi.core.score.raw", "85");
    dm.lms_finish("");

    // No credit means the mastery rule never runs; the completion rule wins.
    let call = &sink.calls()[0];
    assert_eq!(
        call.value_of("cmi.core.lesson_status"),
        Some(DataValue::str("completed"))
    );
}

#[test]
fn commits_are_skipped_when_tracks_cannot_be_saved() {
    let sink = ScriptedSink::new();
    let sco = support::seed_sco(1);
    let mut dm = DataModel12::new(
        ScormMeta::new(99),
        1,
        1,
        vec![sco],
        PlayMode::Normal,
        false,
        false,
        Box::new(sink.clone()),
    );

    dm.lms_initialize("");
    dm.lms_set_value("cmi.core.lesson_location", "page-1");
    assert_eq!(dm.lms_commit(""), "true");
    assert_eq!(dm.lms_finish(""), "true");
    assert!(sink.calls().is_empty());
}

#[test]
fn autocommit_schedules_once_and_commit_cancels() {
    let mut meta = support::meta();
    meta.autocommit = true;
    let mut dm = support::model_with(
        meta,
        PlayMode::Normal,
        support::seed_sco(1),
        Box::new(ScriptedSink::new()),
    );

    dm.lms_initialize("");
    assert!(!dm.autocommit_pending());

    dm.lms_set_value("cmi.core.lesson_location", "page-1");
    assert!(dm.autocommit_pending());
    dm.lms_set_value("cmi.core.lesson_location", "page-2");
    assert!(dm.autocommit_pending());

    // The deadline is a minute out; polling now does nothing.
    assert!(!dm.poll_autocommit());

    assert_eq!(dm.lms_commit(""), "true");
    assert!(!dm.autocommit_pending());
}

#[test]
fn autocommit_fires_once_due() {
    let sink = ScriptedSink::new();
    let mut meta = support::meta();
    meta.autocommit = true;
    let mut dm = support::model_with(
        meta,
        PlayMode::Normal,
        support::seed_sco(1),
        Box::new(sink.clone()),
    );
    dm.set_autocommit_interval(Duration::from_millis(0));

    dm.lms_initialize("");
    dm.lms_set_value("cmi.core.lesson_location", "page-1");
    assert!(dm.autocommit_pending());

    assert!(dm.poll_autocommit());
    assert!(!dm.autocommit_pending());

    // The deferred commit persisted the pending write.
    let calls = sink.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].value_of("cmi.core.lesson_location"),
        Some(DataValue::str("page-1"))
    );

    // Nothing scheduled, so the next poll is a no-op.
    assert!(!dm.poll_autocommit());
}

#[test]
fn notifications_carry_correlation_ids() {
    let mut dm = support::model_with_sink(Box::new(ScriptedSink::new()));
    let payloads: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&payloads);
    dm.on(UPDATE_TOC_EVENT, move |payload: String| {
        captured.lock().unwrap().push(payload);
    });

    dm.lms_initialize("");
    dm.lms_commit("");
    thread::sleep(Duration::from_millis(50));

    let payloads = payloads.lock().unwrap();
    assert_eq!(payloads.len(), 1);
    let event: ScormEvent = serde_json::from_str(&payloads[0]).unwrap();
    assert_eq!(
        event,
        ScormEvent {
            scorm_id: 99,
            sco_id: 1,
            attempt: 1,
        }
    );
}
