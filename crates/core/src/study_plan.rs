//! The 15-week study plan and the subject catalog derived from it.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Number of weeks in a plan.
pub const PLAN_WEEKS: usize = 15;

/// Chapters per subject per week in the built-in plan.
const DEFAULT_CHAPTERS_PER_WEEK: u32 = 2;

/// Built-in subjects as `(id, display name)`.
const DEFAULT_SUBJECTS: &[(&str, &str)] = &[
    ("math", "Mathematics"),
    ("physics", "Physics"),
    ("chemistry", "Chemistry"),
    ("biology", "Biology"),
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A subject with an opaque id (the progress document key) and a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
}

/// One lecture scheduled in a week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedLecture {
    pub subject_id: String,
    pub chapter: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanWeek {
    /// 1-based week number.
    pub week: u32,
    pub lectures: Vec<PlannedLecture>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyPlan {
    pub subjects: Vec<Subject>,
    pub weeks: Vec<PlanWeek>,
}

#[derive(Debug, thiserror::Error)]
pub enum StudyPlanError {
    #[error("Failed to read study plan: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse study plan: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid study plan: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Construction and validation
// ---------------------------------------------------------------------------

impl StudyPlan {
    /// The built-in plan: every subject advances two chapters a week.
    pub fn default_plan() -> Self {
        let subjects = DEFAULT_SUBJECTS
            .iter()
            .map(|(id, name)| Subject {
                id: (*id).to_string(),
                name: (*name).to_string(),
            })
            .collect::<Vec<_>>();

        let weeks = (1..=PLAN_WEEKS as u32)
            .map(|week| PlanWeek {
                week,
                lectures: subjects
                    .iter()
                    .flat_map(|subject| {
                        let first = (week - 1) * DEFAULT_CHAPTERS_PER_WEEK + 1;
                        (first..first + DEFAULT_CHAPTERS_PER_WEEK).map(|chapter| {
                            PlannedLecture {
                                subject_id: subject.id.clone(),
                                chapter,
                            }
                        })
                    })
                    .collect(),
            })
            .collect();

        Self { subjects, weeks }
    }

    /// Load and validate a plan from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StudyPlanError> {
        let raw = std::fs::read_to_string(path)?;
        let plan: Self = serde_json::from_str(&raw)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Check the plan is internally consistent.
    ///
    /// - exactly [`PLAN_WEEKS`] weeks numbered `1..=15` in order
    /// - subject ids and display names are unique and non-empty
    /// - every lecture references a known subject with a chapter >= 1
    /// - no `(subject, chapter)` pair is scheduled twice
    pub fn validate(&self) -> Result<(), StudyPlanError> {
        let invalid = |msg: String| Err(StudyPlanError::Invalid(msg));

        if self.weeks.len() != PLAN_WEEKS {
            return invalid(format!(
                "expected {PLAN_WEEKS} weeks, found {}",
                self.weeks.len()
            ));
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for subject in &self.subjects {
            if subject.id.trim().is_empty() || subject.name.trim().is_empty() {
                return invalid("subject id and name must not be empty".into());
            }
            if !ids.insert(subject.id.as_str()) {
                return invalid(format!("duplicate subject id '{}'", subject.id));
            }
            if !names.insert(subject.name.as_str()) {
                return invalid(format!("duplicate subject name '{}'", subject.name));
            }
        }

        let mut scheduled = HashSet::new();
        for (index, week) in self.weeks.iter().enumerate() {
            if week.week as usize != index + 1 {
                return invalid(format!(
                    "week at position {} is numbered {}",
                    index + 1,
                    week.week
                ));
            }
            for lecture in &week.lectures {
                if !ids.contains(lecture.subject_id.as_str()) {
                    return invalid(format!(
                        "week {} references unknown subject '{}'",
                        week.week, lecture.subject_id
                    ));
                }
                if lecture.chapter == 0 {
                    return invalid(format!("week {} has a chapter numbered 0", week.week));
                }
                if !scheduled.insert((lecture.subject_id.as_str(), lecture.chapter)) {
                    return invalid(format!(
                        "{} chapter {} is scheduled more than once",
                        lecture.subject_id, lecture.chapter
                    ));
                }
            }
        }

        Ok(())
    }

    /// All chapters scheduled for one subject, in plan order.
    pub fn chapters_for(&self, subject_id: &str) -> Vec<u32> {
        self.weeks
            .iter()
            .flat_map(|week| week.lectures.iter())
            .filter(|lecture| lecture.subject_id == subject_id)
            .map(|lecture| lecture.chapter)
            .collect()
    }

    pub fn catalog(&self) -> SubjectCatalog {
        SubjectCatalog::new(&self.subjects)
    }
}

// ---------------------------------------------------------------------------
// Subject catalog
// ---------------------------------------------------------------------------

/// Lookup between subject ids and display names.
///
/// The id is the canonical `lectures` key; display names only show up as keys
/// in data written by older clients.
#[derive(Debug, Clone, Default)]
pub struct SubjectCatalog {
    ids: HashSet<String>,
    id_by_name: HashMap<String, String>,
}

impl SubjectCatalog {
    pub fn new(subjects: &[Subject]) -> Self {
        Self {
            ids: subjects.iter().map(|s| s.id.clone()).collect(),
            id_by_name: subjects
                .iter()
                .map(|s| (s.name.clone(), s.id.clone()))
                .collect(),
        }
    }

    /// A catalog that knows no subjects; no keys are ever rewritten.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_id(&self, key: &str) -> bool {
        self.ids.contains(key)
    }

    /// The canonical id for a display-name key, if `key` is a known name and
    /// not itself an id.
    pub fn id_for_name(&self, key: &str) -> Option<&str> {
        if self.is_id(key) {
            return None;
        }
        self.id_by_name.get(key).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
