//! Per-subject completion summaries of a progress document.

use serde::Serialize;

use crate::document::ProgressDocument;
use crate::study_plan::StudyPlan;

/// Completion counts for one subject against the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectSummary {
    pub subject_id: String,
    pub name: String,
    /// Chapters the plan schedules for this subject.
    pub planned: usize,
    pub vod_done: usize,
    pub test_done: usize,
    /// Whole-number percentage of planned chapters with both boxes checked.
    pub completion_percent: u8,
}

/// Summarize a plaintext document against the plan, one row per subject.
///
/// Only planned chapters count; progress on chapters outside the plan is
/// ignored.
pub fn progress_summary(document: &ProgressDocument, plan: &StudyPlan) -> Vec<SubjectSummary> {
    plan.subjects
        .iter()
        .map(|subject| {
            let chapters = plan.chapters_for(&subject.id);
            let progress = document.subject(&subject.id);

            let mut vod_done = 0;
            let mut test_done = 0;
            let mut both_done = 0;
            for chapter in &chapters {
                let Some(lecture) = progress.and_then(|p| p.lecture(i64::from(*chapter))) else {
                    continue;
                };
                vod_done += usize::from(lecture.vod.checked);
                test_done += usize::from(lecture.test.checked);
                both_done += usize::from(lecture.vod.checked && lecture.test.checked);
            }

            SubjectSummary {
                subject_id: subject.id.clone(),
                name: subject.name.clone(),
                planned: chapters.len(),
                vod_done,
                test_done,
                completion_percent: percent(both_done, chapters.len()),
            }
        })
        .collect()
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done * 100) / total).min(100) as u8
}
