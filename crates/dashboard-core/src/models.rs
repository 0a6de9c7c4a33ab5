use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::data_processors::NumericParser;

// ── Canonical field keys ──────────────────────────────────────────────────────

/// Canonical keys for every column the dashboard understands.
pub mod keys {
    pub const DATE: &str = "date";
    pub const SCHEDULED_TIME: &str = "scheduledTime";
    pub const ENTRY_TIME: &str = "entryTime";
    pub const SLIDE_QAC: &str = "slideQAC";
    pub const CLASS_START_TIME: &str = "classStartTime";
    pub const PRODUCT_TYPE: &str = "productType";
    pub const COURSE: &str = "course";
    pub const SUBJECT: &str = "subject";
    pub const TOPIC: &str = "topic";
    pub const TEACHER: &str = "teacher";
    pub const TEACHER1_GMAIL: &str = "teacher1Gmail";
    pub const TEACHER2: &str = "teacher2";
    pub const TEACHER2_GMAIL: &str = "teacher2Gmail";
    pub const TEACHER3: &str = "teacher3";
    pub const TEACHER3_GMAIL: &str = "teacher3Gmail";
    pub const STUDIO: &str = "studio";
    pub const OPS_STAKEHOLDER: &str = "opsStakeholder";
    pub const STUDIO_COORDINATOR: &str = "studioCoordinator";
    pub const LECTURE_SLIDE: &str = "lectureSlide";
    pub const TITLE: &str = "title";
    pub const CAPTION: &str = "caption";
    pub const CROSS_POST: &str = "crossPost";
    pub const SOURCE_PLATFORM: &str = "sourcePlatform";
    pub const TEACHER_CONFIRMATION: &str = "teacherConfirmation";
    pub const ZOOM_LINK: &str = "zoomLink";
    pub const ZOOM_CREDENTIALS: &str = "zoomCredentials";
    pub const MODERATOR_LINK: &str = "moderatorLink";
    pub const ANNOTATED_SLIDE_LINK: &str = "annotatedSlideLink";
    pub const CLASS_STOP_TIMESTAMPS: &str = "classStopTimestamps";
    pub const START_DELAY_MINUTES: &str = "startDelayMinutes";
    pub const TOTAL_DURATION_MINUTES: &str = "totalDurationMinutes";
    pub const HIGHEST_ATTENDANCE: &str = "highestAttendance";
    pub const AVERAGE_ATTENDANCE: &str = "averageAttendance";
    pub const TOTAL_COMMENTS: &str = "totalComments";
    pub const VIEW_COUNT_10_MIN: &str = "viewCount10Min";
    pub const VIEW_COUNT_40_50_MIN: &str = "viewCount40_50Min";
    pub const VIEW_COUNT_BEFORE_END: &str = "viewCountBeforeEnd";
    pub const CLASS_LINK: &str = "classLink";
    pub const RECORDING_LINK: &str = "recordingLink";
    pub const CLASS_QAC_FEEDBACK: &str = "classQACFeedback";
    pub const REMARKS: &str = "remarks";
    pub const SUMMARY: &str = "summary";
    pub const ISSUES_TYPE: &str = "issuesType";
    pub const ISSUES_DETAILS: &str = "issuesDetails";
    pub const SLIDE_COMMUNICATION: &str = "slideCommunication";
    pub const LIVE_CLASS_ISSUES: &str = "liveClassIssues";
    pub const OTHER_TECHNICAL_ISSUES: &str = "otherTechnicalIssues";
    pub const SATISFACTION: &str = "satisfaction";
}

// ── Field registry ────────────────────────────────────────────────────────────

/// Whether a field is kept as text or coerced to a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Numeric,
}

/// Static description of one canonical column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Canonical key used inside [`Record`].
    pub key: &'static str,
    /// Human-readable column label.
    pub label: &'static str,
    /// Text or numeric.
    pub kind: FieldKind,
    /// Whether the table lets users sort by this column.
    pub sortable: bool,
    /// Whether the column is shown before the user changes visibility.
    pub default_visible: bool,
}

const fn text(key: &'static str, label: &'static str) -> FieldDef {
    FieldDef {
        key,
        label,
        kind: FieldKind::Text,
        sortable: false,
        default_visible: false,
    }
}

const fn sortable_text(key: &'static str, label: &'static str, visible: bool) -> FieldDef {
    FieldDef {
        key,
        label,
        kind: FieldKind::Text,
        sortable: true,
        default_visible: visible,
    }
}

const fn numeric(key: &'static str, label: &'static str, visible: bool) -> FieldDef {
    FieldDef {
        key,
        label,
        kind: FieldKind::Numeric,
        sortable: true,
        default_visible: visible,
    }
}

/// Every canonical field, in display order.
pub const FIELDS: &[FieldDef] = &[
    sortable_text(keys::DATE, "Date", true),
    sortable_text(keys::SCHEDULED_TIME, "Scheduled Time", true),
    sortable_text(keys::PRODUCT_TYPE, "Product Type", true),
    sortable_text(keys::COURSE, "Course", true),
    sortable_text(keys::SUBJECT, "Subject", true),
    sortable_text(keys::TOPIC, "Topic", true),
    sortable_text(keys::TEACHER, "Teacher 1", true),
    sortable_text(keys::STUDIO, "Studio", false),
    sortable_text(keys::OPS_STAKEHOLDER, "Ops Stakeholder", false),
    numeric(keys::HIGHEST_ATTENDANCE, "Highest Attendance", true),
    numeric(keys::AVERAGE_ATTENDANCE, "Average Attendance", false),
    numeric(keys::TOTAL_COMMENTS, "Total Comments", false),
    text(keys::ENTRY_TIME, "Entry Time"),
    text(keys::SLIDE_QAC, "Slide QAC"),
    text(keys::CLASS_START_TIME, "Class Start Time"),
    text(keys::TEACHER1_GMAIL, "Teacher 1 Gmail"),
    text(keys::TEACHER2, "Teacher 2"),
    text(keys::TEACHER2_GMAIL, "Teacher 2 Gmail"),
    text(keys::TEACHER3, "Teacher 3"),
    text(keys::TEACHER3_GMAIL, "Teacher 3 Gmail"),
    text(keys::STUDIO_COORDINATOR, "Studio Coordinator"),
    text(keys::LECTURE_SLIDE, "Lecture Slide"),
    text(keys::TITLE, "Title"),
    text(keys::CAPTION, "Caption"),
    text(keys::CROSS_POST, "Cross Post"),
    text(keys::SOURCE_PLATFORM, "Source Platform"),
    text(keys::TEACHER_CONFIRMATION, "Teacher Confirmation"),
    text(keys::ZOOM_LINK, "Zoom Link"),
    text(keys::ZOOM_CREDENTIALS, "Zoom Credentials"),
    text(keys::MODERATOR_LINK, "Moderator Link"),
    text(keys::ANNOTATED_SLIDE_LINK, "Annotated Slide"),
    text(keys::CLASS_STOP_TIMESTAMPS, "Class Stop Timestamps"),
    numeric(keys::START_DELAY_MINUTES, "Start Delay (min)", false),
    numeric(keys::TOTAL_DURATION_MINUTES, "Total Duration (min)", false),
    numeric(keys::VIEW_COUNT_10_MIN, "Views (10 Min)", false),
    numeric(keys::VIEW_COUNT_40_50_MIN, "Views (40-50 Min)", false),
    numeric(keys::VIEW_COUNT_BEFORE_END, "Views (End)", false),
    text(keys::CLASS_LINK, "Class LINK"),
    text(keys::RECORDING_LINK, "Recording Link"),
    text(keys::CLASS_QAC_FEEDBACK, "QAC Feedback"),
    text(keys::REMARKS, "Remarks"),
    text(keys::SUMMARY, "Feedback Summary"),
    text(keys::ISSUES_TYPE, "Issues Type"),
    text(keys::ISSUES_DETAILS, "Issues Details"),
    text(keys::SLIDE_COMMUNICATION, "Slide Communication"),
    text(keys::LIVE_CLASS_ISSUES, "Live Class Issues"),
    text(keys::OTHER_TECHNICAL_ISSUES, "Other Technical Issues"),
    numeric(keys::SATISFACTION, "Satisfaction", false),
];

/// Look up the registry entry for `key`.
pub fn field_def(key: &str) -> Option<&'static FieldDef> {
    FIELDS.iter().find(|f| f.key == key)
}

/// Position of `key` in registry order, `None` for keys outside the registry.
pub fn field_position(key: &str) -> Option<usize> {
    FIELDS.iter().position(|f| f.key == key)
}

/// `true` for the closed set of numeric-bearing canonical fields.
pub fn is_numeric_field(key: &str) -> bool {
    field_def(key)
        .map(|f| f.kind == FieldKind::Numeric)
        .unwrap_or(false)
}

// ── FieldValue ────────────────────────────────────────────────────────────────

/// A single cell after normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Empty value for any field. Numeric fields read as `0.0` through
    /// [`FieldValue::as_number`] but render and search as an empty cell.
    pub fn empty_for(_key: &str) -> Self {
        FieldValue::Text(String::new())
    }

    /// Value for a numeric-bearing cell. Only a cell that is a number in its
    /// entirety becomes [`FieldValue::Number`]; anything else keeps its
    /// trimmed source text and is coerced on demand.
    pub fn numeric(raw: &str) -> Self {
        match NumericParser::parse_exact(raw) {
            Some(n) => FieldValue::Number(n),
            None => FieldValue::Text(raw.trim().to_string()),
        }
    }

    /// Text form used for search, sorting and rendering.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }

    /// Numeric form; text is coerced from its leading number, zero otherwise.
    pub fn as_number(&self) -> f64 {
        match self {
            FieldValue::Number(n) => *n,
            FieldValue::Text(s) => NumericParser::coerce(s),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Number(_) => false,
            FieldValue::Text(s) => s.is_empty(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

// ── Record ────────────────────────────────────────────────────────────────────

/// One imported class session.
///
/// Built by the row normaliser with every canonical field present. Records
/// are never mutated after import; edits go through [`Record::with_field`],
/// which returns a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Positional identifier `row-<index>`, stable within one import.
    pub id: String,
    /// Content hash of date, teacher and topic; survives row reordering.
    pub stable_key: String,
    /// Canonical key → value. Unmapped sheet columns appear under their
    /// trimmed header text.
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Build the positional identifier for a data row.
    pub fn row_id(index: usize) -> String {
        format!("row-{}", index)
    }

    /// Construct a record, filling any missing canonical field with its empty
    /// value and computing the stable key.
    pub fn new(id: impl Into<String>, mut fields: BTreeMap<String, FieldValue>) -> Self {
        for def in FIELDS {
            fields
                .entry(def.key.to_string())
                .or_insert_with(|| FieldValue::empty_for(def.key));
        }
        let stable_key = compute_stable_key(&fields);
        Self {
            id: id.into(),
            stable_key,
            fields,
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Text form of `key`; `""` when absent.
    pub fn text(&self, key: &str) -> String {
        self.fields.get(key).map(FieldValue::as_text).unwrap_or_default()
    }

    /// Borrowed text for text fields, used on hot paths such as grouping.
    pub fn text_ref(&self, key: &str) -> &str {
        match self.fields.get(key) {
            Some(FieldValue::Text(s)) => s.as_str(),
            _ => "",
        }
    }

    /// Numeric form of `key`; `0.0` when absent or non-numeric.
    pub fn number(&self, key: &str) -> f64 {
        self.fields.get(key).map(FieldValue::as_number).unwrap_or(0.0)
    }

    /// Return a copy with `key` replaced. Numeric fields go through
    /// [`FieldValue::numeric`] so edits follow the same rule as imports.
    pub fn with_field(&self, key: &str, raw: &str) -> Record {
        let value = if is_numeric_field(key) {
            FieldValue::numeric(raw)
        } else {
            FieldValue::Text(raw.trim().to_string())
        };
        let mut fields = self.fields.clone();
        fields.insert(key.to_string(), value);
        Record {
            id: self.id.clone(),
            stable_key: compute_stable_key(&fields),
            fields,
        }
    }
}

fn compute_stable_key(fields: &BTreeMap<String, FieldValue>) -> String {
    let mut hasher = Sha256::new();
    for key in [keys::DATE, keys::TEACHER, keys::TOPIC] {
        let value = fields.get(key).map(FieldValue::as_text).unwrap_or_default();
        hasher.update(value.as_bytes());
        hasher.update([0x1f]);
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
