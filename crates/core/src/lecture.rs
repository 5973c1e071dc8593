//! Lecture progress entries: the canonical shape and the legacy decoder.
//!
//! A chapter entry under a subject has been stored in three shapes over the
//! life of the product. [`LectureEntry::decode`] classifies a raw JSON value
//! into exactly one of them; [`LegacyLecture::into_canonical`] lifts the two
//! legacy forms into [`LectureProgress`].

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Canonical shape
// ---------------------------------------------------------------------------

/// Completion state of one activity (video or test) of a lecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckState {
    pub checked: bool,
    /// ISO-8601 instant the box was ticked, `null` when unchecked.
    pub timestamp: Option<Timestamp>,
}

impl CheckState {
    /// `checked` with `timestamp = at`, or unchecked with no timestamp.
    pub fn at(checked: bool, at: Timestamp) -> Self {
        Self {
            checked,
            timestamp: checked.then_some(at),
        }
    }

    fn to_value(&self) -> Value {
        json!({
            "checked": self.checked,
            "timestamp": self.timestamp.map(format_timestamp),
        })
    }
}

/// The canonical shape every chapter entry converges to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LectureProgress {
    pub vod: CheckState,
    pub test: CheckState,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub tasks: Vec<Value>,
    #[serde(default)]
    pub pinned: bool,
}

impl LectureProgress {
    /// Render as a JSON value with millisecond `Z` timestamps.
    pub fn to_value(&self) -> Value {
        json!({
            "vod": self.vod.to_value(),
            "test": self.test.to_value(),
            "note": self.note,
            "tasks": self.tasks,
            "pinned": self.pinned,
        })
    }
}

/// Format an instant the way browsers print `Date.toISOString()`.
pub fn format_timestamp(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ---------------------------------------------------------------------------
// Legacy shapes
// ---------------------------------------------------------------------------

/// Field values recovered from a pre-canonical chapter entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyLecture {
    pub vod: bool,
    pub test: bool,
    pub note: String,
    pub tasks: Vec<Value>,
    pub pinned: bool,
}

impl LegacyLecture {
    /// Lift into the canonical shape. Checked activities are stamped with `now`.
    pub fn into_canonical(self, now: Timestamp) -> LectureProgress {
        LectureProgress {
            vod: CheckState::at(self.vod, now),
            test: CheckState::at(self.test, now),
            note: self.note,
            tasks: self.tasks,
            pinned: self.pinned,
        }
    }
}

/// A chapter entry classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum LectureEntry {
    /// Already canonical: an object carrying a nested object at `vod`.
    Canonical,
    /// Flat object `{ vod: bool, test: bool, note?, tasks?, pinned? }`.
    LegacyObject(LegacyLecture),
    /// Bare scalar meaning "video watched" when truthy.
    LegacyScalar(LegacyLecture),
}

/// A chapter value matching none of the known shapes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognized lecture entry shape: {kind}")]
pub struct LectureDecodeError {
    pub kind: &'static str,
}

impl LectureEntry {
    /// Classify a raw chapter value.
    ///
    /// Tries canonical, then legacy object, then legacy scalar. Arrays match
    /// none of them and are reported as [`LectureDecodeError`].
    pub fn decode(value: &Value) -> Result<Self, LectureDecodeError> {
        if is_canonical(value) {
            return Ok(Self::Canonical);
        }
        if let Some(legacy) = parse_legacy_object(value) {
            return Ok(Self::LegacyObject(legacy));
        }
        if let Some(legacy) = parse_legacy_scalar(value) {
            return Ok(Self::LegacyScalar(legacy));
        }
        Err(LectureDecodeError {
            kind: value_kind(value),
        })
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, Self::Canonical)
    }
}

/// The single "already migrated" discriminator: a nested object at `vod`.
pub fn is_canonical(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|obj| obj.get("vod"))
        .is_some_and(Value::is_object)
}

fn parse_legacy_object(value: &Value) -> Option<LegacyLecture> {
    let obj = value.as_object()?;
    let field = |name: &str| obj.get(name).unwrap_or(&Value::Null);

    Some(LegacyLecture {
        vod: is_truthy(field("vod")),
        test: is_truthy(field("test")),
        note: field("note").as_str().unwrap_or_default().to_string(),
        tasks: field("tasks").as_array().cloned().unwrap_or_default(),
        pinned: is_truthy(field("pinned")),
    })
}

fn parse_legacy_scalar(value: &Value) -> Option<LegacyLecture> {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            Some(LegacyLecture {
                vod: is_truthy(value),
                test: false,
                note: String::new(),
                tasks: Vec::new(),
                pinned: false,
            })
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Loose truthiness of stored flags: `null`, `false`, zero and `""` are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Short name of a JSON value's type, for diagnostics.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
