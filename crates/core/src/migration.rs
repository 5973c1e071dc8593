//! In-place repair of stored progress documents.
//!
//! [`migrate_document`] walks the `lectures` tree of one document and
//! rewrites every chapter entry that is not yet canonical, drops
//! type-corrupted `_subjectPinned` flags, and re-keys subjects stored under
//! their display name to their id. It is pure apart from mutating its
//! argument; the caller decides whether to persist based on
//! [`MigrationReport::dirty`].
//!
//! Running it twice is a no-op the second time: canonical entries are skipped
//! and re-keyed subjects are already under their id.

use serde_json::{Map, Value};

use crate::document::{chapter_number, SUBJECT_PINNED_KEY};
use crate::lecture::{value_kind, LectureEntry};
use crate::study_plan::SubjectCatalog;
use crate::types::Timestamp;

/// Something in a document the migration did not know how to repair.
///
/// Anomalies are left untouched and reported so the caller can log them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationAnomaly {
    pub subject: String,
    /// Chapter key, `None` for subject-level anomalies.
    pub chapter: Option<String>,
    pub reason: String,
}

/// Outcome of migrating one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// The document was modified and must be written back.
    pub dirty: bool,
    pub lectures_rewritten: usize,
    pub pins_removed: usize,
    pub subjects_rekeyed: usize,
    pub anomalies: Vec<MigrationAnomaly>,
}

/// Migrate one progress document in place.
///
/// `now` stamps legacy entries whose activities were already checked.
pub fn migrate_document(
    document: &mut Value,
    now: Timestamp,
    catalog: &SubjectCatalog,
) -> MigrationReport {
    let mut report = MigrationReport::default();

    let Some(lectures) = document.get_mut("lectures").and_then(Value::as_object_mut) else {
        return report;
    };

    rekey_subjects(lectures, catalog, &mut report);

    for (subject, progress) in lectures.iter_mut() {
        match progress {
            Value::Null => {}
            Value::Object(chapters) => migrate_subject(subject, chapters, now, &mut report),
            other => report.anomalies.push(MigrationAnomaly {
                subject: subject.clone(),
                chapter: None,
                reason: format!("subject progress is a {}, not an object", value_kind(other)),
            }),
        }
    }

    report.dirty =
        report.lectures_rewritten > 0 || report.pins_removed > 0 || report.subjects_rekeyed > 0;
    report
}

fn migrate_subject(
    subject: &str,
    chapters: &mut Map<String, Value>,
    now: Timestamp,
    report: &mut MigrationReport,
) {
    if chapters
        .get(SUBJECT_PINNED_KEY)
        .is_some_and(|pinned| !pinned.is_boolean())
    {
        chapters.remove(SUBJECT_PINNED_KEY);
        report.pins_removed += 1;
    }

    for (key, value) in chapters.iter_mut() {
        if chapter_number(key).is_none() {
            continue;
        }

        let legacy = match LectureEntry::decode(value) {
            Ok(LectureEntry::Canonical) => continue,
            Ok(LectureEntry::LegacyObject(legacy) | LectureEntry::LegacyScalar(legacy)) => legacy,
            Err(e) => {
                report.anomalies.push(MigrationAnomaly {
                    subject: subject.to_string(),
                    chapter: Some(key.clone()),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        *value = legacy.into_canonical(now).to_value();
        report.lectures_rewritten += 1;
    }
}

/// Move subjects keyed by display name under their id.
///
/// When both keys exist, chapters already under the id win and the
/// name-keyed chapters only fill the gaps.
fn rekey_subjects(
    lectures: &mut Map<String, Value>,
    catalog: &SubjectCatalog,
    report: &mut MigrationReport,
) {
    let renames: Vec<(String, String)> = lectures
        .iter()
        .filter(|(_, progress)| progress.is_object())
        .filter_map(|(key, _)| {
            catalog
                .id_for_name(key)
                .map(|id| (key.clone(), id.to_string()))
        })
        .collect();

    for (name, id) in renames {
        let Some(Value::Object(from_name)) = lectures.remove(&name) else {
            continue;
        };

        match lectures.get_mut(&id) {
            Some(Value::Object(existing)) => {
                for (key, value) in from_name {
                    existing.entry(key).or_insert(value);
                }
            }
            Some(_) | None => {
                lectures.insert(id, Value::Object(from_name));
            }
        }
        report.subjects_rekeyed += 1;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::lecture::LectureProgress;
    use crate::study_plan::{StudyPlan, Subject};

    const NOW_ISO: &str = "2024-03-01T09:30:00.000Z";

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
    }

    fn migrate(document: &mut Value) -> MigrationReport {
        migrate_document(document, now(), &SubjectCatalog::empty())
    }

    fn canonical(vod: bool, test: bool, note: &str) -> Value {
        let stamp = |checked: bool| if checked { json!(NOW_ISO) } else { Value::Null };
        json!({
            "vod": { "checked": vod, "timestamp": stamp(vod) },
            "test": { "checked": test, "timestamp": stamp(test) },
            "note": note,
            "tasks": [],
            "pinned": false
        })
    }

    /// Every chapter entry parses as canonical and `checked` matches `timestamp`.
    fn assert_all_canonical(document: &Value) {
        for (subject, progress) in document["lectures"].as_object().unwrap() {
            let Some(chapters) = progress.as_object() else { continue };
            for (key, value) in chapters {
                if chapter_number(key).is_none() {
                    continue;
                }
                let lecture: LectureProgress = serde_json::from_value(value.clone())
                    .unwrap_or_else(|e| panic!("{subject}.{key} not canonical: {e}"));
                for state in [&lecture.vod, &lecture.test] {
                    assert_eq!(state.checked, state.timestamp.is_some(), "{subject}.{key}");
                }
                for field in ["vod", "test"] {
                    if let Some(ts) = value[field]["timestamp"].as_str() {
                        DateTime::parse_from_rfc3339(ts).unwrap();
                    }
                }
            }
        }
    }

    // -- Concrete scenario -------------------------------------------------

    #[test]
    fn mixed_legacy_subject_migrates_to_canonical() {
        let mut document = json!({
            "lectures": {
                "math": {
                    "1": true,
                    "2": { "vod": false, "test": true, "note": "review" },
                    "_subjectPinned": "oops"
                }
            }
        });

        let report = migrate(&mut document);

        assert!(report.dirty);
        assert_eq!(report.lectures_rewritten, 2);
        assert_eq!(report.pins_removed, 1);
        assert_eq!(
            document,
            json!({
                "lectures": {
                    "math": {
                        "1": canonical(true, false, ""),
                        "2": canonical(false, true, "review")
                    }
                }
            })
        );
    }

    // -- Shape convergence -------------------------------------------------

    #[test]
    fn every_legacy_shape_converges() {
        let cases = [
            (json!(true), canonical(true, false, "")),
            (json!(false), canonical(false, false, "")),
            (json!({ "vod": true, "test": false }), canonical(true, false, "")),
            (
                json!({ "vod": false, "test": false, "note": "x" }),
                canonical(false, false, "x"),
            ),
        ];

        for (input, expected) in cases {
            let mut document = json!({ "lectures": { "math": { "1": input.clone() } } });
            let report = migrate(&mut document);
            assert!(report.dirty, "input {input}");
            assert_eq!(document["lectures"]["math"]["1"], expected, "input {input}");
            assert_all_canonical(&document);
        }
    }

    #[test]
    fn falsy_legacy_values_are_still_rewritten() {
        let mut document = json!({ "lectures": { "math": { "1": 0, "2": false } } });
        let report = migrate(&mut document);
        assert!(report.dirty);
        assert_eq!(report.lectures_rewritten, 2);
        assert_all_canonical(&document);
    }

    #[test]
    fn legacy_tasks_and_pin_are_lifted() {
        let mut document = json!({
            "lectures": { "math": { "4": { "vod": 1, "tasks": ["read"], "pinned": true } } }
        });
        migrate(&mut document);
        let entry = &document["lectures"]["math"]["4"];
        assert_eq!(entry["tasks"], json!(["read"]));
        assert_eq!(entry["pinned"], true);
        assert_eq!(entry["vod"]["checked"], true);
    }

    // -- Idempotence -------------------------------------------------------

    #[test]
    fn second_run_is_clean_and_changes_nothing() {
        let mut document = json!({
            "settings": { "theme": "dark" },
            "lectures": {
                "math": { "1": true, "2": { "vod": true, "test": true }, "_subjectPinned": 3 },
                "physics": { "1": false },
                "history": null
            }
        });

        assert!(migrate(&mut document).dirty);
        let once = document.clone();

        let later = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let second = migrate_document(&mut document, later, &SubjectCatalog::empty());

        assert!(!second.dirty);
        assert_eq!(second, MigrationReport::default());
        assert_eq!(document, once);
    }

    #[test]
    fn canonical_document_is_untouched() {
        let mut document = json!({
            "lectures": { "math": { "1": canonical(true, true, "done"), "_subjectPinned": false } }
        });
        let before = document.clone();
        assert!(!migrate(&mut document).dirty);
        assert_eq!(document, before);
    }

    // -- Preservation ------------------------------------------------------

    #[test]
    fn non_numeric_keys_and_boolean_pin_survive() {
        let mut document = json!({
            "settings": { "theme": "light", "fontSize": 14 },
            "lectures": {
                "math": { "1": true, "_subjectPinned": true, "color": "teal", "1a": false }
            }
        });
        migrate(&mut document);

        let math = &document["lectures"]["math"];
        assert_eq!(math["_subjectPinned"], true);
        assert_eq!(math["color"], "teal");
        assert_eq!(math["1a"], false);
        assert_eq!(document["settings"]["fontSize"], 14);
    }

    #[test]
    fn null_subject_is_skipped_without_dirtying() {
        let mut document = json!({ "lectures": { "math": null } });
        let report = migrate(&mut document);
        assert!(!report.dirty);
        assert!(report.anomalies.is_empty());
        assert_eq!(document, json!({ "lectures": { "math": null } }));
    }

    #[test]
    fn documents_without_lectures_are_left_alone() {
        for mut document in [json!({}), json!({ "lectures": null }), json!("text")] {
            let before = document.clone();
            assert!(!migrate(&mut document).dirty);
            assert_eq!(document, before);
        }
    }

    // -- Anomalies ---------------------------------------------------------

    #[test]
    fn unrecognized_chapter_shapes_are_reported_not_coerced() {
        let mut document = json!({ "lectures": { "math": { "1": [true], "2": true } } });
        let report = migrate(&mut document);

        assert!(report.dirty);
        assert_eq!(report.lectures_rewritten, 1);
        assert_eq!(document["lectures"]["math"]["1"], json!([true]));
        assert_eq!(
            report.anomalies,
            vec![MigrationAnomaly {
                subject: "math".into(),
                chapter: Some("1".into()),
                reason: "Unrecognized lecture entry shape: array".into(),
            }]
        );
    }

    #[test]
    fn non_object_subjects_are_reported() {
        let mut document = json!({ "lectures": { "math": 5 } });
        let report = migrate(&mut document);
        assert!(!report.dirty);
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(report.anomalies[0].chapter, None);
    }

    // -- Subject re-keying -------------------------------------------------

    fn catalog() -> SubjectCatalog {
        SubjectCatalog::new(&[Subject {
            id: "math".into(),
            name: "Mathematics".into(),
        }])
    }

    #[test]
    fn name_keyed_subject_moves_under_its_id() {
        let mut document = json!({ "lectures": { "Mathematics": { "1": true } } });
        let report = migrate_document(&mut document, now(), &catalog());

        assert!(report.dirty);
        assert_eq!(report.subjects_rekeyed, 1);
        assert!(document["lectures"].get("Mathematics").is_none());
        assert_eq!(document["lectures"]["math"]["1"], canonical(true, false, ""));
    }

    #[test]
    fn id_keyed_chapters_win_when_both_keys_exist() {
        let mut document = json!({
            "lectures": {
                "Mathematics": { "1": true, "2": true },
                "math": { "1": canonical(false, false, "kept") }
            }
        });
        migrate_document(&mut document, now(), &catalog());

        let math = &document["lectures"]["math"];
        assert_eq!(math["1"]["note"], "kept");
        assert_eq!(math["2"], canonical(true, false, ""));
        assert!(document["lectures"].get("Mathematics").is_none());
    }

    #[test]
    fn rekeying_is_idempotent() {
        let mut document = json!({ "lectures": { "Mathematics": { "1": true } } });
        migrate_document(&mut document, now(), &catalog());
        let second = migrate_document(&mut document, now(), &catalog());
        assert!(!second.dirty);
    }

    #[test]
    fn default_plan_catalog_leaves_unknown_subjects_alone() {
        let catalog = StudyPlan::default_plan().catalog();
        let mut document = json!({ "lectures": { "Sociology": { "1": canonical(true, false, "") } } });
        assert!(!migrate_document(&mut document, now(), &catalog).dirty);
        assert!(document["lectures"].get("Sociology").is_some());
    }
}
