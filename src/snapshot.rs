use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cohort::{self, CohortRollup, RollupSettings};
use crate::error::{EngineError, EngineResult};
use crate::indicators::{self, CompetencyScope, IndicatorReport};
use crate::macro_cycle::{self, MacroCycleProgress, MonthSpan, NearCompletionScan};
use crate::models::{CohortFilter, Student, StudentRecord};
use crate::plan::{self, PlanReport};
use crate::reassessment::{self, ReassessmentStatus};

/// Materialized student records the engine reads from for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub students: Vec<StudentRecord>,
}

impl Snapshot {
    pub fn new(students: Vec<StudentRecord>) -> Self {
        Self { students }
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
        tracing::debug!(students = snapshot.students.len(), "snapshot loaded");
        Ok(snapshot)
    }

    pub fn record(&self, student_id: Uuid) -> EngineResult<&StudentRecord> {
        self.students
            .iter()
            .find(|record| record.student.id == student_id)
            .ok_or(EngineError::StudentNotFound(student_id))
    }

    /// Keeps only the students matching `filter`.
    pub fn filtered(self, filter: &CohortFilter) -> Self {
        Self::new(
            self.students
                .into_iter()
                .filter(|record| filter.matches(&record.student))
                .collect(),
        )
    }

    pub fn roster(&self, filter: &CohortFilter) -> Vec<&Student> {
        self.students
            .iter()
            .map(|record| &record.student)
            .filter(|student| filter.matches(student))
            .collect()
    }

    pub fn compute_indicators(
        &self,
        student_id: Uuid,
        today: NaiveDate,
    ) -> EngineResult<IndicatorReport> {
        indicators::compute(self.record(student_id)?, CompetencyScope::Track, today)
    }

    pub fn compute_indicators_for_plan(
        &self,
        student_id: Uuid,
        today: NaiveDate,
    ) -> EngineResult<PlanReport> {
        plan::compute_for_plan(self.record(student_id)?, today)
    }

    pub fn compute_macro_cycle_progress(
        &self,
        student_id: Uuid,
        rule: MonthSpan,
    ) -> EngineResult<MacroCycleProgress> {
        let record = self.record(student_id)?;
        let cycle = record
            .macro_cycle
            .as_ref()
            .ok_or(EngineError::MissingMacroCycle(student_id))?;
        macro_cycle::progress(cycle, &record.sessions, rule)
    }

    pub fn compute_cohort_rollup(
        &self,
        filter: &CohortFilter,
        today: NaiveDate,
        settings: &RollupSettings,
    ) -> CohortRollup {
        cohort::rollup(&self.students, filter, today, settings)
    }

    pub fn scan_near_completion(&self, rule: MonthSpan) -> NearCompletionScan {
        macro_cycle::scan_near_completion(&self.students, rule)
    }

    pub fn check_reassessment(&self, student_id: Uuid) -> EngineResult<ReassessmentStatus> {
        Ok(reassessment::check(self.record(student_id)?))
    }
}
