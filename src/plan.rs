use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::indicators::{
    compute, normalized_grade, scoped_competencies, CompetencyScope, IndicatorReport, Mean,
};
use crate::models::{AssignmentStatus, StudentRecord};

/// Grades in the individual plan are read on a 0-10 scale.
const PLAN_GRADE_SCALE: f64 = 10.0;

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentDetail {
    pub competency_id: Uuid,
    pub competency_name: Option<String>,
    pub status: AssignmentStatus,
    pub current_grade: Option<f64>,
    pub target_grade: f64,
    pub approved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanCompliance {
    pub total_assignments: usize,
    pub approved: usize,
    pub approval_percent: f64,
    pub mean_grade: f64,
    pub details: Vec<AssignmentDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    #[serde(flatten)]
    pub report: IndicatorReport,
    pub compliance: PlanCompliance,
}

/// Grades are only read from assigned competencies of finalized cycles, the
/// same set the plan-scoped indicators see. Other assignments stay ungraded.
pub fn plan_compliance(record: &StudentRecord, today: NaiveDate) -> EngineResult<PlanCompliance> {
    let in_scope = scoped_competencies(record, CompetencyScope::Plan, today)?;
    let mut details = Vec::with_capacity(record.assignments.len());
    let mut grades = Mean::default();

    for assignment in &record.assignments {
        let competency = record
            .competencies
            .iter()
            .find(|c| c.id == assignment.competency_id);

        let mut graded = Mean::default();
        if let Some(competency) = in_scope.iter().find(|c| c.id == assignment.competency_id) {
            for content in &competency.contents {
                if let Some(grade) = content.grade {
                    graded.push(normalized_grade(content.id, grade)? * PLAN_GRADE_SCALE);
                }
            }
        }

        let current_grade = graded.value_opt();
        if let Some(grade) = current_grade {
            grades.push(grade);
        }

        details.push(AssignmentDetail {
            competency_id: assignment.competency_id,
            competency_name: competency.map(|c| c.name.clone()),
            status: assignment.status,
            current_grade,
            target_grade: assignment.target_grade,
            approved: current_grade.is_some_and(|grade| grade >= assignment.target_grade),
        });
    }

    let approved = details.iter().filter(|d| d.approved).count();
    let approval_percent = if details.is_empty() {
        0.0
    } else {
        approved as f64 / details.len() as f64 * 100.0
    };

    Ok(PlanCompliance {
        total_assignments: details.len(),
        approved,
        approval_percent,
        mean_grade: grades.value(),
        details,
    })
}

pub fn compute_for_plan(record: &StudentRecord, today: NaiveDate) -> EngineResult<PlanReport> {
    let report = compute(record, CompetencyScope::Plan, today)?;
    let compliance = plan_compliance(record, today)?;
    Ok(PlanReport { report, compliance })
}
