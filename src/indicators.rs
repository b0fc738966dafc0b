use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::cycle::{validate_cycle, CycleStatus};
use crate::error::{EngineError, EngineResult};
use crate::models::{Competency, EventParticipation, Grade, MentoringSession, Presence, StudentRecord};
use crate::session::{score_session, SessionScores};
use crate::tier::Tier;

/// Which competencies feed the competency and learning indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetencyScope {
    /// Every competency of the student's track.
    Track,
    /// Only the competencies in the student's individual plan.
    Plan,
}

/// Hits over eligible items; an empty denominator reads as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub hits: usize,
    pub eligible: usize,
}

impl Tally {
    fn record(&mut self, hit: bool) {
        self.eligible += 1;
        if hit {
            self.hits += 1;
        }
    }

    pub fn percent(&self) -> f64 {
        if self.eligible == 0 {
            0.0
        } else {
            self.hits as f64 / self.eligible as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    pub(crate) fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub(crate) fn value_opt(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub mentoring_participation: f64,
    pub practical_activities: f64,
    pub engagement: f64,
    pub competency_performance: f64,
    pub learning_performance: f64,
    pub event_participation: f64,
    pub overall: f64,
    pub tier: Tier,
}

impl IndicatorSet {
    pub fn from_components(components: [f64; 6]) -> Self {
        let overall = overall_performance(&components);
        Self {
            mentoring_participation: components[0],
            practical_activities: components[1],
            engagement: components[2],
            competency_performance: components[3],
            learning_performance: components[4],
            event_participation: components[5],
            overall,
            tier: Tier::classify(overall),
        }
    }

    pub fn components(&self) -> [f64; 6] {
        [
            self.mentoring_participation,
            self.practical_activities,
            self.engagement,
            self.competency_performance,
            self.learning_performance,
            self.event_participation,
        ]
    }
}

/// Raw counts behind each indicator, for drill-down views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IndicatorBreakdown {
    pub attendance: Tally,
    pub tasks: Tally,
    pub engagement_sessions: usize,
    pub competencies_in_scope: usize,
    pub graded_contents: usize,
    pub events: Tally,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorReport {
    pub student_id: Uuid,
    pub student_name: String,
    pub scope: CompetencyScope,
    pub indicators: IndicatorSet,
    pub breakdown: IndicatorBreakdown,
}

pub fn mentoring_participation(sessions: &[MentoringSession]) -> Tally {
    let mut tally = Tally::default();
    for presence in sessions.iter().filter_map(|session| session.presence) {
        tally.record(presence == Presence::Present);
    }
    tally
}

pub fn practical_activities(scored: &[(&MentoringSession, SessionScores)]) -> Tally {
    let mut tally = Tally::default();
    for (_, scores) in scored.iter().filter(|(session, _)| !session.is_onboarding()) {
        if let Some(task) = scores.task {
            tally.record(task >= 100.0);
        }
    }
    tally
}

/// Mean of per-session composites; returns the value and the sessions that contributed.
pub fn engagement(scored: &[(&MentoringSession, SessionScores)]) -> (f64, usize) {
    let mut mean = Mean::default();
    for (_, scores) in scored.iter().filter(|(session, _)| !session.is_onboarding()) {
        if let Some(composite) = scores.composite() {
            mean.push(composite);
        }
    }
    (mean.value(), mean.count())
}

pub fn competency_performance(competencies: &[&Competency]) -> f64 {
    let mut mean = Mean::default();
    for competency in competencies.iter().filter(|c| !c.contents.is_empty()) {
        let completed = competency.contents.iter().filter(|c| c.completed).count();
        mean.push(completed as f64 / competency.contents.len() as f64);
    }
    mean.value() * 100.0
}

/// Mean of normalized grades across graded contents; returns the value and the graded count.
pub fn learning_performance(competencies: &[&Competency]) -> EngineResult<(f64, usize)> {
    let mut mean = Mean::default();
    for content in competencies.iter().flat_map(|c| c.contents.iter()) {
        if let Some(grade) = content.grade {
            mean.push(normalized_grade(content.id, grade)? * 100.0);
        }
    }
    Ok((mean.value(), mean.count()))
}

pub fn event_participation(events: &[EventParticipation]) -> Tally {
    let mut tally = Tally::default();
    for event in events {
        tally.record(event.present);
    }
    tally
}

pub fn overall_performance(components: &[f64; 6]) -> f64 {
    components.iter().sum::<f64>() / components.len() as f64
}

/// Grade as a fraction of its maximum, rejecting values outside `[0, max]`.
pub(crate) fn normalized_grade(content: Uuid, grade: Grade) -> EngineResult<f64> {
    if grade.max <= 0.0 || !(0.0..=grade.max).contains(&grade.score) {
        return Err(EngineError::GradeOutOfRange {
            content,
            score: grade.score,
            max: grade.max,
        });
    }
    Ok(grade.score / grade.max)
}

/// Competencies counted by indicators 4 and 5: in the scope universe, assigned in a
/// finalized cycle, released, and holding at least one content.
pub fn scoped_competencies(
    record: &StudentRecord,
    scope: CompetencyScope,
    today: NaiveDate,
) -> EngineResult<Vec<&Competency>> {
    let mut finalized: HashSet<Uuid> = HashSet::new();
    for cycle in &record.cycles {
        validate_cycle(cycle)?;
        if cycle.status(today) == CycleStatus::Finalized {
            finalized.extend(cycle.competencies.iter().copied());
        }
    }

    let universe: HashSet<Uuid> = match scope {
        CompetencyScope::Track => record
            .competencies
            .iter()
            .filter(|c| c.track == record.student.track)
            .map(|c| c.id)
            .collect(),
        CompetencyScope::Plan => record.assignments.iter().map(|a| a.competency_id).collect(),
    };

    let mut seen = HashSet::new();
    Ok(record
        .competencies
        .iter()
        .filter(|c| universe.contains(&c.id) && finalized.contains(&c.id))
        .filter(|c| c.released && !c.contents.is_empty())
        .filter(|c| seen.insert(c.id))
        .collect())
}

pub fn compute(
    record: &StudentRecord,
    scope: CompetencyScope,
    today: NaiveDate,
) -> EngineResult<IndicatorReport> {
    let scored = record
        .sessions
        .iter()
        .map(|session| score_session(session).map(|scores| (session, scores)))
        .collect::<EngineResult<Vec<_>>>()?;

    let attendance = mentoring_participation(&record.sessions);
    let tasks = practical_activities(&scored);
    let (engagement_value, engagement_sessions) = engagement(&scored);

    let in_scope = scoped_competencies(record, scope, today)?;
    let competency_value = competency_performance(&in_scope);
    let (learning_value, graded_contents) = learning_performance(&in_scope)?;

    let events = event_participation(&record.events);

    let indicators = IndicatorSet::from_components([
        attendance.percent(),
        tasks.percent(),
        engagement_value,
        competency_value,
        learning_value,
        events.percent(),
    ]);

    tracing::debug!(
        student = %record.student.id,
        ?scope,
        overall = indicators.overall,
        tier = %indicators.tier,
        "computed indicators"
    );

    Ok(IndicatorReport {
        student_id: record.student.id,
        student_name: record.student.name.clone(),
        scope,
        indicators,
        breakdown: IndicatorBreakdown {
            attendance,
            tasks,
            engagement_sessions,
            competencies_in_scope: in_scope.len(),
            graded_contents,
            events,
        },
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::models::{ContentKind, TaskStatus};

    fn today() -> NaiveDate {
        date(2025, 6, 15)
    }

    fn approx(left: f64, right: f64) {
        assert!((left - right).abs() < 0.05, "{left} != {right}");
    }

    #[test]
    fn four_session_scenario() {
        let mut rec = record(student("Avery Lee", "BEM"));
        rec.sessions = scenario_sessions();

        let report = compute(&rec, CompetencyScope::Track, today()).expect("computes");
        approx(report.indicators.mentoring_participation, 100.0);
        approx(report.indicators.practical_activities, 100.0);
        approx(report.indicators.engagement, 93.3);
        assert_eq!(report.breakdown.tasks, Tally { hits: 3, eligible: 3 });
        assert_eq!(report.breakdown.engagement_sessions, 3);
    }

    #[test]
    fn empty_student_reports_zero_not_nan() {
        let rec = record(student("Sem Dados", "BEM"));
        let report = compute(&rec, CompetencyScope::Track, today()).expect("computes");
        for value in report.indicators.components() {
            assert_eq!(value, 0.0);
        }
        assert_eq!(report.indicators.overall, 0.0);
        assert_eq!(report.indicators.tier, Tier::Inicial);
    }

    #[test]
    fn onboarding_task_is_ignored_even_when_marked_missing() {
        let mut rec = record(student("Jules Moreno", "BEM"));
        rec.sessions = vec![
            session(1, TaskStatus::NotDelivered, None),
            session(2, TaskStatus::Delivered, None),
        ];
        let report = compute(&rec, CompetencyScope::Track, today()).expect("computes");
        assert_eq!(report.breakdown.tasks, Tally { hits: 1, eligible: 1 });
        approx(report.indicators.practical_activities, 100.0);
    }

    #[test]
    fn sessions_without_presence_leave_attendance_denominator() {
        let mut rec = record(student("Kiara Patel", "BEM"));
        let mut unrecorded = session(3, TaskStatus::NoTask, None);
        unrecorded.presence = None;
        let mut absent = session(2, TaskStatus::NotDelivered, None);
        absent.presence = Some(Presence::Absent);
        rec.sessions = vec![session(1, TaskStatus::NoTask, None), absent, unrecorded];

        let report = compute(&rec, CompetencyScope::Track, today()).expect("computes");
        assert_eq!(report.breakdown.attendance, Tally { hits: 1, eligible: 2 });
        approx(report.indicators.mentoring_participation, 50.0);
        // session 2 composite = (0 + 0) / 2, session 3 has nothing applicable
        assert_eq!(report.breakdown.engagement_sessions, 1);
        approx(report.indicators.engagement, 0.0);
    }

    #[test]
    fn all_no_task_sessions_yield_zero_activities() {
        let mut rec = record(student("Rafa Lima", "BEM"));
        rec.sessions = (1..=4).map(|n| session(n, TaskStatus::NoTask, None)).collect();
        let report = compute(&rec, CompetencyScope::Track, today()).expect("computes");
        assert_eq!(report.indicators.practical_activities, 0.0);
        assert_eq!(report.breakdown.tasks.eligible, 0);
    }

    #[test]
    fn competency_indicators_only_count_finalized_cycles() {
        let mut rec = record(student("Avery Lee", "BEM"));
        let done = competency(
            "Comunicação",
            vec![content(true, Some(8.0)), content(false, None)],
        );
        rec.cycles = vec![cycle(date(2025, 1, 1), date(2025, 3, 31), &[&done])];
        rec.competencies = vec![done];

        let before = compute(&rec, CompetencyScope::Track, today()).expect("computes");
        approx(before.indicators.competency_performance, 50.0);
        approx(before.indicators.learning_performance, 80.0);

        let running = competency("Negociação", vec![content(false, Some(2.0))]);
        let upcoming = competency("Conflitos", vec![content(false, Some(1.0))]);
        rec.cycles
            .push(cycle(date(2025, 6, 1), date(2025, 7, 31), &[&running]));
        rec.cycles
            .push(cycle(date(2025, 8, 1), date(2025, 9, 30), &[&upcoming]));
        rec.competencies.push(running);
        rec.competencies.push(upcoming);

        let after = compute(&rec, CompetencyScope::Track, today()).expect("computes");
        assert_eq!(
            after.indicators.competency_performance,
            before.indicators.competency_performance
        );
        assert_eq!(
            after.indicators.learning_performance,
            before.indicators.learning_performance
        );
        assert_eq!(after.breakdown.competencies_in_scope, 1);
    }

    #[test]
    fn empty_and_unreleased_competencies_are_excluded() {
        let mut rec = record(student("Avery Lee", "BEM"));
        let full = competency("Comunicação", vec![content(true, None)]);
        let empty = competency("Vazia", Vec::new());
        let mut hidden = competency("Oculta", vec![content(false, Some(0.0))]);
        hidden.released = false;
        rec.cycles = vec![cycle(
            date(2025, 1, 1),
            date(2025, 2, 1),
            &[&full, &empty, &hidden],
        )];
        rec.competencies = vec![full, empty, hidden];

        let report = compute(&rec, CompetencyScope::Track, today()).expect("computes");
        approx(report.indicators.competency_performance, 100.0);
        assert_eq!(report.breakdown.competencies_in_scope, 1);
        assert_eq!(report.breakdown.graded_contents, 0);
        assert_eq!(report.indicators.learning_performance, 0.0);
    }

    #[test]
    fn ungraded_contents_do_not_drag_learning_down() {
        let mut item = content(true, None);
        item.kind = ContentKind::Podcast;
        let mut scaled = content(true, None);
        scaled.grade = Some(Grade {
            score: 45.0,
            max: 50.0,
        });
        let comp = competency("Gestão", vec![content(true, Some(6.0)), item, scaled]);
        let (value, graded) = learning_performance(&[&comp]).expect("valid grades");
        assert_eq!(graded, 2);
        approx(value, 75.0);
    }

    #[test]
    fn grade_outside_range_rejects_the_computation() {
        let mut rec = record(student("Avery Lee", "BEM"));
        let comp = competency("Comunicação", vec![content(true, Some(11.0))]);
        rec.cycles = vec![cycle(date(2025, 1, 1), date(2025, 2, 1), &[&comp])];
        rec.competencies = vec![comp];
        let err = compute(&rec, CompetencyScope::Track, today()).unwrap_err();
        assert!(matches!(err, EngineError::GradeOutOfRange { .. }));
    }

    #[test]
    fn inverted_cycle_rejects_the_computation() {
        let mut rec = record(student("Avery Lee", "BEM"));
        rec.cycles = vec![cycle(date(2025, 3, 1), date(2025, 2, 1), &[])];
        let err = compute(&rec, CompetencyScope::Track, today()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidCycle { .. }));
    }

    #[test]
    fn overall_is_unweighted_mean_of_six() {
        let set = IndicatorSet::from_components([100.0, 100.0, 100.0, 0.0, 0.0, 100.0]);
        approx(set.overall, 66.7);
        assert_eq!(set.tier, Tier::Intermediario);

        let set = IndicatorSet::from_components([12.0, 87.5, 40.0, 66.0, 0.0, 33.3]);
        let expected = set.components().iter().sum::<f64>() / 6.0;
        assert!((set.overall - expected).abs() < 1e-9);
    }

    #[test]
    fn plan_covering_whole_track_matches_track_scope() {
        let mut rec = record(student("Avery Lee", "BEM"));
        rec.sessions = scenario_sessions();
        let a = competency("Comunicação", vec![content(true, Some(9.0)), content(false, None)]);
        let b = competency("Negociação", vec![content(true, Some(5.0))]);
        rec.cycles = vec![
            cycle(date(2025, 1, 1), date(2025, 2, 28), &[&a]),
            cycle(date(2025, 6, 1), date(2025, 8, 31), &[&b]),
        ];
        rec.assignments = vec![assign(&a), assign(&b)];
        rec.competencies = vec![a, b];

        let track = compute(&rec, CompetencyScope::Track, today()).expect("computes");
        let plan = compute(&rec, CompetencyScope::Plan, today()).expect("computes");
        assert_eq!(track.indicators, plan.indicators);
    }

    #[test]
    fn plan_scope_narrows_the_competency_universe() {
        let mut rec = record(student("Avery Lee", "BEM"));
        let mandatory = competency("Comunicação", vec![content(true, Some(10.0))]);
        let optional = competency("Oratória", vec![content(false, Some(0.0))]);
        rec.cycles = vec![cycle(
            date(2025, 1, 1),
            date(2025, 2, 28),
            &[&mandatory, &optional],
        )];
        rec.assignments = vec![assign(&mandatory)];
        rec.competencies = vec![mandatory, optional];

        let track = compute(&rec, CompetencyScope::Track, today()).expect("computes");
        let plan = compute(&rec, CompetencyScope::Plan, today()).expect("computes");
        approx(track.indicators.competency_performance, 50.0);
        approx(plan.indicators.competency_performance, 100.0);
        approx(plan.indicators.learning_performance, 100.0);
        assert_eq!(
            track.indicators.mentoring_participation,
            plan.indicators.mentoring_participation
        );
    }
}
