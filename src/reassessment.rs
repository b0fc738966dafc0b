use chrono::NaiveDate;
use serde::Serialize;

use crate::models::StudentRecord;

pub const REASSESSMENT_AFTER_SESSIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReassessmentStatus {
    pub sessions_since_update: usize,
    pub last_update: Option<NaiveDate>,
    pub reassessment_due: bool,
}

/// Counts recorded sessions held after the last competency-level update.
pub fn check(record: &StudentRecord) -> ReassessmentStatus {
    let last_update = record.student.assessment_updated_on;
    let sessions_since_update = record
        .sessions
        .iter()
        .filter(|s| s.presence.is_some())
        .filter(|s| last_update.map_or(true, |updated| s.date > updated))
        .count();

    ReassessmentStatus {
        sessions_since_update,
        last_update,
        reassessment_due: sessions_since_update >= REASSESSMENT_AFTER_SESSIONS,
    }
}
