//! The per-user progress document and the two forms it is stored in.
//!
//! `progress.data` holds either a plaintext [`ProgressDocument`] or an
//! `{ "encrypted": "<envelope>" }` object produced client-side. The server
//! never decrypts the latter; [`StoredProgress`] only tells them apart and
//! checks the plaintext form is canonical.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope;
use crate::error::CoreError;
use crate::lecture::{LectureEntry, LectureProgress};

/// Legacy subject-level pin flag. Must be a boolean when present.
pub const SUBJECT_PINNED_KEY: &str = "_subjectPinned";

/// Top-level key that marks an encrypted stored document.
pub const ENCRYPTED_KEY: &str = "encrypted";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// UI colour theme. Values this server does not know are kept as written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    #[serde(untagged)]
    Other(String),
}

/// User settings. Unknown options are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Progress for one subject: chapter entries plus metadata keys.
///
/// Keys that parse as integers are chapters; everything else is kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectProgress {
    #[serde(
        rename = "_subjectPinned",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub subject_pinned: Option<bool>,
    #[serde(flatten)]
    pub entries: Map<String, Value>,
}

impl SubjectProgress {
    /// Iterate chapter entries as `(chapter_number, raw_value)`.
    pub fn chapters(&self) -> impl Iterator<Item = (i64, &Value)> {
        self.entries
            .iter()
            .filter_map(|(key, value)| chapter_number(key).map(|n| (n, value)))
    }

    /// Typed view of one chapter, `None` when absent or not canonical.
    pub fn lecture(&self, chapter: i64) -> Option<LectureProgress> {
        let (_, value) = self.chapters().find(|(n, _)| *n == chapter)?;
        serde_json::from_value(value.clone()).ok()
    }
}

/// Parse a subject key as a chapter number. Non-integer keys are metadata.
pub fn chapter_number(key: &str) -> Option<i64> {
    key.parse().ok()
}

/// The single JSON document persisted per user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressDocument {
    #[serde(default)]
    pub settings: Settings,
    /// Subject key (subject id) to subject progress. `null` subjects are kept.
    #[serde(default)]
    pub lectures: BTreeMap<String, Option<SubjectProgress>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProgressDocument {
    /// The document created at registration: light theme, no lectures.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check every chapter entry is in the canonical shape.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (subject, progress) in &self.lectures {
            let Some(progress) = progress else { continue };
            for (chapter, value) in progress.chapters() {
                let canonical = LectureEntry::decode(value)
                    .map(|entry| entry.is_canonical())
                    .unwrap_or(false);
                if !canonical {
                    return Err(CoreError::Validation(format!(
                        "lectures.{subject}.{chapter} is not a canonical lecture entry"
                    )));
                }
                if let Err(e) = serde_json::from_value::<LectureProgress>(value.clone()) {
                    return Err(CoreError::Validation(format!(
                        "lectures.{subject}.{chapter}: {e}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Read a stored plaintext document for display.
    ///
    /// Subjects that are not objects are dropped, as are `settings` or
    /// `lectures` of the wrong type. Fails only when `value` is not an object.
    pub fn read_lenient(mut value: Value) -> Result<Self, CoreError> {
        let Some(root) = value.as_object_mut() else {
            return Err(CoreError::Validation(
                "Progress data must be a JSON object".into(),
            ));
        };
        if root.get("settings").is_some_and(|s| !s.is_object()) {
            root.remove("settings");
        }
        match root.get_mut("lectures") {
            Some(Value::Object(lectures)) => {
                lectures.retain(|_, subject| subject.is_object() || subject.is_null());
            }
            Some(_) => {
                root.remove("lectures");
            }
            None => {}
        }
        serde_json::from_value(value).map_err(|e| CoreError::Validation(e.to_string()))
    }

    pub fn subject(&self, key: &str) -> Option<&SubjectProgress> {
        self.lectures.get(key).and_then(Option::as_ref)
    }
}

// ---------------------------------------------------------------------------
// Stored forms
// ---------------------------------------------------------------------------

/// What `progress.data` holds: an opaque envelope or a plaintext document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredProgress {
    Encrypted { encrypted: String },
    Plain(ProgressDocument),
}

impl StoredProgress {
    /// Classify and validate an incoming stored value.
    ///
    /// A string `encrypted` key selects the envelope form, whose payload must
    /// at least look like an envelope. Anything else must be a canonical
    /// plaintext document.
    pub fn parse(value: Value) -> Result<Self, CoreError> {
        if !value.is_object() {
            return Err(CoreError::Validation(
                "Progress data must be a JSON object".into(),
            ));
        }

        if let Some(encrypted) = value.get(ENCRYPTED_KEY) {
            let Some(envelope) = encrypted.as_str() else {
                return Err(CoreError::Validation(
                    "`encrypted` must be a Base64 string".into(),
                ));
            };
            envelope::check_envelope_format(envelope)
                .map_err(|e| CoreError::Validation(e.to_string()))?;
            return Ok(Self::Encrypted {
                encrypted: envelope.to_string(),
            });
        }

        let document: ProgressDocument = serde_json::from_value(value)
            .map_err(|e| CoreError::Validation(format!("Invalid progress document: {e}")))?;
        document.validate()?;
        Ok(Self::Plain(document))
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted { .. })
    }

    pub fn to_value(&self) -> Result<Value, CoreError> {
        serde_json::to_value(self).map_err(|e| CoreError::Internal(e.to_string()))
    }
}

/// Does a raw stored value carry the encrypted marker?
pub fn is_encrypted_value(value: &Value) -> bool {
    value.get(ENCRYPTED_KEY).is_some_and(Value::is_string)
}

/// The default document as a JSON value, ready to insert.
pub fn empty_document_value() -> Value {
    serde_json::json!({ "settings": { "theme": "light" }, "lectures": {} })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
