//! Static SCORM 1.2 schema: datatype patterns, children lists, numeric
//! ranges, the canonical element table, and element-name normalization.
//!
//! Repeating structures (objectives, interactions, correct responses) are
//! described once as `.n.` templates; [`normalize`] maps any concrete indexed
//! name onto its template before lookup.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ErrorCode;
use crate::value::{DataValue, UserDataMap};

// Standard data type patterns.
pub const CMI_STRING_256: &str = r"^[\x{00}-\x{FFFF}]{0,255}$";
pub const CMI_STRING_4096: &str = r"^[\x{00}-\x{FFFF}]{0,4096}$";
// Relaxed limit applied when the activity is not flagged as strictly
// standard-conforming (hosts routinely store long suspend data). Bounded
// repetition at this length exceeds the regex compile size limit, so the
// pattern is unbounded and [`PatternCache::matches`] caps the character
// count separately.
pub const CMI_STRING_LOOSE: &str = r"^[\x{00}-\x{FFFF}]*$";
const LOOSE_MAX_CHARS: usize = 64000;
pub const CMI_TIME: &str = "^([0-2]{1}[0-9]{1}):([0-5]{1}[0-9]{1}):([0-5]{1}[0-9]{1})(.[0-9]{1,2})?$";
pub const CMI_TIMESPAN: &str = "^([0-9]{2,4}):([0-9]{2}):([0-9]{2})(.[0-9]{1,2})?$";
pub const CMI_SINTEGER: &str = "^-?([0-9]+)$";
pub const CMI_DECIMAL: &str = "^-?([0-9]{0,3})(.[0-9]*)?$";
pub const CMI_IDENTIFIER: &str = r"^[\x{21}-\x{7E}]{0,255}$";

// Vocabulary patterns.
pub const CMI_STATUS: &str = "^passed$|^completed$|^failed$|^incomplete$|^browsed$";
pub const CMI_STATUS_2: &str = "^passed$|^completed$|^failed$|^incomplete$|^browsed$|^not attempted$";
pub const CMI_EXIT: &str = "^time-out$|^suspend$|^logout$|^$";
pub const CMI_TYPE: &str =
    "^true-false$|^choice$|^fill-in$|^matching$|^performance$|^sequencing$|^likert$|^numeric$";
pub const CMI_RESULT: &str = "^correct$|^wrong$|^unanticipated$|^neutral$|^([0-9]{0,3})?(.[0-9]*)?$";
pub const NAV_EVENT: &str = "^previous$|^continue$";

// Children lists reported by the `_children` keyword elements.
pub const CMI_CHILDREN: &str =
    "core,suspend_data,launch_data,comments,objectives,student_data,student_preference,interactions";
pub const CORE_CHILDREN: &str =
    "student_id,student_name,lesson_location,credit,lesson_status,entry,score,total_time,lesson_mode,exit,session_time";
pub const SCORE_CHILDREN: &str = "raw,min,max";
pub const COMMENTS_CHILDREN: &str = "content,location,time";
pub const OBJECTIVES_CHILDREN: &str = "id,score,status";
pub const STUDENT_DATA_CHILDREN: &str = "mastery_score,max_time_allowed,time_limit_action";
pub const STUDENT_PREFERENCE_CHILDREN: &str = "audio,language,speed,text";
pub const INTERACTIONS_CHILDREN: &str =
    "id,objectives,time,type,correct_responses,weighting,student_response,result,latency";

// Numeric ranges, "min#max".
pub const SCORE_RANGE: &str = "0#100";
pub const AUDIO_RANGE: &str = "-1#100";
pub const SPEED_RANGE: &str = "-100#100";
pub const WEIGHTING_RANGE: &str = "-100#100";
pub const TEXT_RANGE: &str = "-1#1";

// Matches one index segment, in either the runtime's dotted form (".3.") or
// the host store's underscore form ("_3.").
static INDEX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[._](\d+)\.").unwrap());
static FIRST_INDEX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.(\d+)\.").unwrap());
static OBJECTIVES_INDEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"objectives\.(\d+)\.").unwrap());
static CORRECT_RESPONSES_INDEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"correct_responses\.(\d+)\.").unwrap());

/// Replace every index segment with the literal `.n.` template placeholder,
/// e.g. `cmi.interactions.2.correct_responses.0.pattern` becomes
/// `cmi.interactions.n.correct_responses.n.pattern`.
pub fn normalize(element: &str) -> String {
    INDEX_RE.replace_all(element, ".n.").into_owned()
}

/// Whether the element name carries at least one index segment.
pub fn is_indexed(element: &str) -> bool {
    INDEX_RE.is_match(element)
}

/// Rewrite dotted-index addressing to the host store's underscore form:
/// `cmi.objectives.2.id` becomes `cmi.objectives_2.id`.
pub fn to_underscore(element: &str) -> String {
    INDEX_RE.replace_all(element, "_${1}.").into_owned()
}

/// Rewrite host underscore addressing back to the runtime's dotted form:
/// `cmi.objectives_2.id` becomes `cmi.objectives.2.id`.
pub fn to_dot(element: &str) -> String {
    INDEX_RE.replace_all(element, ".${1}.").into_owned()
}

/// First index segment of a dotted element name.
pub(crate) fn first_index(element: &str) -> Option<u32> {
    FIRST_INDEX_RE
        .captures(element)
        .and_then(|c| c[1].parse().ok())
}

/// Index of the nested objectives segment (`...objectives.<n>...`).
pub(crate) fn objectives_index(element: &str) -> Option<u32> {
    OBJECTIVES_INDEX_RE
        .captures(element)
        .and_then(|c| c[1].parse().ok())
}

/// Index of the nested correct_responses segment.
pub(crate) fn correct_responses_index(element: &str) -> Option<u32> {
    CORRECT_RESPONSES_INDEX_RE
        .captures(element)
        .and_then(|c| c[1].parse().ok())
}

/// Per-element access permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// Validation and persistence metadata for one addressable element (or one
/// `.n.` template covering a whole collection).
///
/// `default_value` doubles as the last-committed value: the commit engine
/// diffs the live value against it and rewrites it after each send.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDefinition {
    pub mode: ElementMode,
    pub format: Option<&'static str>,
    pub range: Option<&'static str>,
    pub default_value: Option<DataValue>,
    pub read_error: Option<ErrorCode>,
    pub write_error: ErrorCode,
    pub indexed: bool,
}

impl ElementDefinition {
    fn new(mode: ElementMode, write_error: ErrorCode) -> ElementDefinition {
        ElementDefinition {
            mode,
            format: None,
            range: None,
            default_value: None,
            read_error: None,
            write_error,
            indexed: false,
        }
    }

    /// Structural keyword node (`_children`, `_count`, `_version`): readable,
    /// writes rejected with 402.
    fn keyword() -> ElementDefinition {
        ElementDefinition::new(ElementMode::ReadOnly, ErrorCode::KeywordViolation)
    }

    /// Read-only data element: writes rejected with 403.
    fn read_only() -> ElementDefinition {
        ElementDefinition::new(ElementMode::ReadOnly, ErrorCode::ReadOnly)
    }

    /// Read-write element validated against `format` on write.
    fn read_write(format: &'static str) -> ElementDefinition {
        let mut def = ElementDefinition::new(ElementMode::ReadWrite, ErrorCode::TypeMismatch);
        def.format = Some(format);
        def
    }

    /// Write-only element: reads rejected with 404.
    fn write_only(format: &'static str) -> ElementDefinition {
        let mut def = ElementDefinition::new(ElementMode::WriteOnly, ErrorCode::TypeMismatch);
        def.format = Some(format);
        def.read_error = Some(ErrorCode::WriteOnly);
        def
    }

    fn range(mut self, range: &'static str) -> ElementDefinition {
        self.range = Some(range);
        self
    }

    fn with_default(mut self, value: impl Into<DataValue>) -> ElementDefinition {
        self.default_value = Some(value.into());
        self
    }

    fn default_from(mut self, value: Option<DataValue>) -> ElementDefinition {
        self.default_value = value;
        self
    }

    fn indexed(mut self) -> ElementDefinition {
        self.indexed = true;
        self
    }
}

/// Build the canonical element table for one SCO, seeding defaults from the
/// host-supplied `defaultdata` map.
pub fn data_model(defaults: &UserDataMap, standard: bool) -> HashMap<String, ElementDefinition> {
    let string_256 = if standard { CMI_STRING_256 } else { CMI_STRING_LOOSE };
    let string_4096 = if standard { CMI_STRING_4096 } else { CMI_STRING_LOOSE };
    // CMIFeedback shares the short string format.
    let feedback = string_256;

    let d = |name: &str| defaults.get(name).cloned();
    let mut model = HashMap::new();
    let mut put = |name: &str, def: ElementDefinition| {
        model.insert(name.to_string(), def);
    };

    put("cmi._children", ElementDefinition::keyword().with_default(CMI_CHILDREN));
    put("cmi._version", ElementDefinition::keyword().with_default("3.4"));
    put("cmi.core._children", ElementDefinition::keyword().with_default(CORE_CHILDREN));
    put(
        "cmi.core.student_id",
        ElementDefinition::read_only().default_from(d("cmi.core.student_id")),
    );
    put(
        "cmi.core.student_name",
        ElementDefinition::read_only().default_from(d("cmi.core.student_name")),
    );
    put(
        "cmi.core.lesson_location",
        ElementDefinition::read_write(string_256).default_from(d("cmi.core.lesson_location")),
    );
    put(
        "cmi.core.credit",
        ElementDefinition::read_only().default_from(d("cmi.core.credit")),
    );
    put(
        "cmi.core.lesson_status",
        ElementDefinition::read_write(CMI_STATUS).default_from(d("cmi.core.lesson_status")),
    );
    put(
        "cmi.core.entry",
        ElementDefinition::read_only().default_from(d("cmi.core.entry")),
    );
    put("cmi.core.score._children", ElementDefinition::keyword().with_default(SCORE_CHILDREN));
    put(
        "cmi.core.score.raw",
        ElementDefinition::read_write(CMI_DECIMAL)
            .range(SCORE_RANGE)
            .default_from(d("cmi.core.score.raw")),
    );
    put(
        "cmi.core.score.max",
        ElementDefinition::read_write(CMI_DECIMAL)
            .range(SCORE_RANGE)
            .default_from(d("cmi.core.score.max")),
    );
    put(
        "cmi.core.score.min",
        ElementDefinition::read_write(CMI_DECIMAL)
            .range(SCORE_RANGE)
            .default_from(d("cmi.core.score.min")),
    );
    put(
        "cmi.core.total_time",
        ElementDefinition::read_only().default_from(d("cmi.core.total_time")),
    );
    put(
        "cmi.core.lesson_mode",
        ElementDefinition::read_only().default_from(d("cmi.core.lesson_mode")),
    );
    put(
        "cmi.core.exit",
        ElementDefinition::write_only(CMI_EXIT).default_from(d("cmi.core.exit")),
    );
    put(
        "cmi.core.session_time",
        ElementDefinition::write_only(CMI_TIMESPAN).with_default("00:00:00"),
    );
    put(
        "cmi.suspend_data",
        ElementDefinition::read_write(string_4096).default_from(d("cmi.suspend_data")),
    );
    put(
        "cmi.launch_data",
        ElementDefinition::read_only().default_from(d("cmi.launch_data")),
    );
    put(
        "cmi.comments",
        ElementDefinition::read_write(string_4096).default_from(d("cmi.comments")),
    );

    // Deprecated evaluation block, still addressable by older content.
    put("cmi.evaluation.comments._count", ElementDefinition::keyword().with_default("0"));
    put(
        "cmi.evaluation.comments._children",
        ElementDefinition::keyword().with_default(COMMENTS_CHILDREN),
    );
    put(
        "cmi.evaluation.comments.n.content",
        ElementDefinition::read_write(string_256).with_default("").indexed(),
    );
    put(
        "cmi.evaluation.comments.n.location",
        ElementDefinition::read_write(string_256).with_default("").indexed(),
    );
    put(
        "cmi.evaluation.comments.n.time",
        ElementDefinition::read_write(CMI_TIME).with_default("").indexed(),
    );

    put("cmi.comments_from_lms", ElementDefinition::read_only());

    put(
        "cmi.objectives._children",
        ElementDefinition::keyword().with_default(OBJECTIVES_CHILDREN),
    );
    put("cmi.objectives._count", ElementDefinition::keyword().with_default("0"));
    put(
        "cmi.objectives.n.id",
        ElementDefinition::read_write(CMI_IDENTIFIER).indexed(),
    );
    put("cmi.objectives.n.score._children", ElementDefinition::keyword().indexed());
    put(
        "cmi.objectives.n.score.raw",
        ElementDefinition::read_write(CMI_DECIMAL)
            .range(SCORE_RANGE)
            .with_default("")
            .indexed(),
    );
    put(
        "cmi.objectives.n.score.min",
        ElementDefinition::read_write(CMI_DECIMAL)
            .range(SCORE_RANGE)
            .with_default("")
            .indexed(),
    );
    put(
        "cmi.objectives.n.score.max",
        ElementDefinition::read_write(CMI_DECIMAL)
            .range(SCORE_RANGE)
            .with_default("")
            .indexed(),
    );
    put(
        "cmi.objectives.n.status",
        ElementDefinition::read_write(CMI_STATUS_2).indexed(),
    );

    put(
        "cmi.student_data._children",
        ElementDefinition::keyword().with_default(STUDENT_DATA_CHILDREN),
    );
    put(
        "cmi.student_data.mastery_score",
        ElementDefinition::read_only().default_from(d("cmi.student_data.mastery_score")),
    );
    put(
        "cmi.student_data.max_time_allowed",
        ElementDefinition::read_only().default_from(d("cmi.student_data.max_time_allowed")),
    );
    put(
        "cmi.student_data.time_limit_action",
        ElementDefinition::read_only().default_from(d("cmi.student_data.time_limit_action")),
    );

    put(
        "cmi.student_preference._children",
        ElementDefinition::keyword().with_default(STUDENT_PREFERENCE_CHILDREN),
    );
    put(
        "cmi.student_preference.audio",
        ElementDefinition::read_write(CMI_SINTEGER)
            .range(AUDIO_RANGE)
            .default_from(d("cmi.student_preference.audio")),
    );
    put(
        "cmi.student_preference.language",
        ElementDefinition::read_write(string_256).default_from(d("cmi.student_preference.language")),
    );
    put(
        "cmi.student_preference.speed",
        ElementDefinition::read_write(CMI_SINTEGER)
            .range(SPEED_RANGE)
            .default_from(d("cmi.student_preference.speed")),
    );
    put(
        "cmi.student_preference.text",
        ElementDefinition::read_write(CMI_SINTEGER)
            .range(TEXT_RANGE)
            .default_from(d("cmi.student_preference.text")),
    );

    put(
        "cmi.interactions._children",
        ElementDefinition::keyword().with_default(INTERACTIONS_CHILDREN),
    );
    put("cmi.interactions._count", ElementDefinition::keyword().with_default("0"));
    put(
        "cmi.interactions.n.id",
        ElementDefinition::write_only(CMI_IDENTIFIER).indexed(),
    );
    put(
        "cmi.interactions.n.objectives._count",
        ElementDefinition::keyword().with_default("0").indexed(),
    );
    put(
        "cmi.interactions.n.objectives.n.id",
        ElementDefinition::write_only(CMI_IDENTIFIER).indexed(),
    );
    put(
        "cmi.interactions.n.time",
        ElementDefinition::write_only(CMI_TIME).indexed(),
    );
    put(
        "cmi.interactions.n.type",
        ElementDefinition::write_only(CMI_TYPE).indexed(),
    );
    put(
        "cmi.interactions.n.correct_responses._count",
        ElementDefinition::keyword().with_default("0").indexed(),
    );
    put(
        "cmi.interactions.n.correct_responses.n.pattern",
        ElementDefinition::write_only(feedback).indexed(),
    );
    put(
        "cmi.interactions.n.weighting",
        ElementDefinition::write_only(CMI_DECIMAL)
            .range(WEIGHTING_RANGE)
            .indexed(),
    );
    put(
        "cmi.interactions.n.student_response",
        ElementDefinition::write_only(feedback).indexed(),
    );
    put(
        "cmi.interactions.n.result",
        ElementDefinition::write_only(CMI_RESULT).indexed(),
    );
    put(
        "cmi.interactions.n.latency",
        ElementDefinition::write_only(CMI_TIMESPAN).indexed(),
    );

    put(
        "nav.event",
        ElementDefinition::write_only(NAV_EVENT).with_default(""),
    );

    model
}

/// Cache of compiled format patterns. Every format in the element table is a
/// `'static` string, so each distinct pattern compiles once per cache.
pub(crate) struct PatternCache {
    compiled: HashMap<&'static str, Option<Regex>>,
}

impl PatternCache {
    pub(crate) fn new() -> PatternCache {
        PatternCache {
            compiled: HashMap::new(),
        }
    }

    /// Whether `value` satisfies the format. A pattern that fails to compile
    /// rejects every value, surfacing as the element's write error rather
    /// than a panic.
    pub(crate) fn matches(&mut self, pattern: &'static str, value: &str) -> bool {
        if pattern == CMI_STRING_LOOSE && value.chars().count() > LOOSE_MAX_CHARS {
            return false;
        }

        let re = self.compiled.entry(pattern).or_insert_with(|| {
            Regex::new(pattern)
                .map_err(|err| log::warn!("format pattern {} failed to compile: {}", pattern, err))
                .ok()
        });
        re.as_ref().is_some_and(|re| re.is_match(value))
    }
}
