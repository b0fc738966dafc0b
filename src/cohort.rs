use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::indicators::{compute, CompetencyScope, IndicatorSet, Mean};
use crate::models::{CohortFilter, StudentRecord};
use crate::tier::Tier;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RollupSettings {
    pub top_n: usize,
    pub at_risk_below: f64,
    pub scope: CompetencyScope,
}

impl Default for RollupSettings {
    fn default() -> Self {
        Self {
            top_n: 10,
            at_risk_below: 50.0,
            scope: CompetencyScope::Track,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentScore {
    pub student_id: Uuid,
    pub name: String,
    pub program: String,
    pub company: String,
    pub cohort: String,
    pub indicators: IndicatorSet,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedStudent {
    pub student_id: Uuid,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierCount {
    pub tier: Tier,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMean {
    pub group: String,
    pub students: usize,
    pub mean_overall: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IndicatorMeans {
    pub mentoring_participation: f64,
    pub practical_activities: f64,
    pub engagement: f64,
    pub competency_performance: f64,
    pub learning_performance: f64,
    pub event_participation: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CohortRollup {
    pub label: String,
    pub population: usize,
    pub mean_overall: f64,
    pub indicator_means: IndicatorMeans,
    pub tier_counts: Vec<TierCount>,
    pub top: Vec<StudentScore>,
    pub at_risk: Vec<StudentScore>,
    pub per_program: Vec<GroupMean>,
    pub per_cohort: Vec<GroupMean>,
    /// Every scored student, best first.
    pub ranking: Vec<StudentScore>,
    pub rejected: Vec<RejectedStudent>,
}

pub fn rollup(
    records: &[StudentRecord],
    filter: &CohortFilter,
    today: NaiveDate,
    settings: &RollupSettings,
) -> CohortRollup {
    let outcomes: Vec<Result<StudentScore, RejectedStudent>> = records
        .par_iter()
        .filter(|record| filter.matches(&record.student))
        .map(|record| {
            let student = &record.student;
            compute(record, settings.scope, today)
                .map(|report| StudentScore {
                    student_id: student.id,
                    name: student.name.clone(),
                    program: student.program.clone(),
                    company: student.company.clone(),
                    cohort: student.cohort.clone(),
                    indicators: report.indicators,
                })
                .map_err(|err| RejectedStudent {
                    student_id: student.id,
                    name: student.name.clone(),
                    reason: err.to_string(),
                })
        })
        .collect();

    let mut ranking = Vec::with_capacity(outcomes.len());
    let mut rejected = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(score) => ranking.push(score),
            Err(reject) => {
                tracing::warn!(student = %reject.student_id, reason = %reject.reason, "student rejected from rollup");
                rejected.push(reject);
            }
        }
    }

    ranking.sort_by(|a, b| {
        b.indicators
            .overall
            .partial_cmp(&a.indicators.overall)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut at_risk: Vec<StudentScore> = ranking
        .iter()
        .filter(|score| score.indicators.overall < settings.at_risk_below)
        .cloned()
        .collect();
    at_risk.sort_by(|a, b| {
        a.indicators
            .overall
            .partial_cmp(&b.indicators.overall)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });

    let population = ranking.len();
    let mut overall = Mean::default();
    let mut components: [Mean; 6] = Default::default();
    for score in &ranking {
        overall.push(score.indicators.overall);
        for (mean, value) in components.iter_mut().zip(score.indicators.components()) {
            mean.push(value);
        }
    }

    let tier_counts = Tier::ALL
        .iter()
        .map(|&tier| {
            let count = ranking.iter().filter(|s| s.indicators.tier == tier).count();
            TierCount {
                tier,
                count,
                percent: if population == 0 {
                    0.0
                } else {
                    count as f64 / population as f64 * 100.0
                },
            }
        })
        .collect();

    tracing::info!(
        label = %filter.label(),
        population,
        rejected = rejected.len(),
        at_risk = at_risk.len(),
        "cohort rollup computed"
    );

    CohortRollup {
        label: filter.label(),
        population,
        mean_overall: overall.value(),
        indicator_means: IndicatorMeans {
            mentoring_participation: components[0].value(),
            practical_activities: components[1].value(),
            engagement: components[2].value(),
            competency_performance: components[3].value(),
            learning_performance: components[4].value(),
            event_participation: components[5].value(),
        },
        tier_counts,
        top: ranking.iter().take(settings.top_n).cloned().collect(),
        at_risk,
        per_program: group_means(&ranking, |score| &score.program),
        per_cohort: group_means(&ranking, |score| &score.cohort),
        ranking,
        rejected,
    }
}

fn group_means<F>(scores: &[StudentScore], key: F) -> Vec<GroupMean>
where
    F: Fn(&StudentScore) -> &String,
{
    let mut groups: BTreeMap<&str, Mean> = BTreeMap::new();
    for score in scores {
        groups
            .entry(key(score).as_str())
            .or_default()
            .push(score.indicators.overall);
    }
    groups
        .into_iter()
        .map(|(group, mean)| GroupMean {
            group: group.to_string(),
            students: mean.count(),
            mean_overall: mean.value(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::fixtures::*;
    use crate::models::{EventParticipation, Presence, TaskStatus};

    /// A student whose only signal is event attendance, giving overall = pct / 6.
    fn with_events(name: &str, program: &str, present: usize, total: usize) -> StudentRecord {
        let mut rec = record(student(name, program));
        rec.events = (0..total)
            .map(|i| EventParticipation {
                event: format!("Webinar {i}"),
                present: i < present,
            })
            .collect();
        rec
    }

    fn today() -> NaiveDate {
        date(2025, 6, 1)
    }

    fn strong(name: &str, program: &str) -> StudentRecord {
        let mut rec = with_events(name, program, 1, 1);
        rec.sessions = scenario_sessions();
        rec
    }

    #[test]
    fn ranks_by_overall_then_name() {
        let records = vec![
            strong("Bruno", "BEM"),
            strong("Ana", "BEM"),
            with_events("Carla", "Outro", 1, 2),
        ];
        let rollup = rollup(&records, &CohortFilter::default(), today(), &RollupSettings::default());
        let names: Vec<&str> = rollup.ranking.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Bruno", "Carla"]);
        assert_eq!(rollup.population, 3);
    }

    #[test]
    fn top_n_and_at_risk_lists() {
        let records = vec![
            strong("Ana", "BEM"),
            with_events("Bia", "BEM", 0, 2),
            with_events("Caio", "BEM", 1, 2),
        ];
        let settings = RollupSettings {
            top_n: 1,
            ..RollupSettings::default()
        };
        let rollup = rollup(&records, &CohortFilter::default(), today(), &settings);
        assert_eq!(rollup.top.len(), 1);
        assert_eq!(rollup.top[0].name, "Ana");
        let at_risk: Vec<&str> = rollup.at_risk.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(at_risk, vec!["Bia", "Caio"]);
    }

    #[test]
    fn tier_counts_cover_every_student() {
        let records = vec![
            strong("Ana", "BEM"),
            with_events("Bia", "BEM", 0, 2),
            with_events("Caio", "Outro", 2, 2),
        ];
        let rollup = rollup(&records, &CohortFilter::default(), today(), &RollupSettings::default());
        let total: usize = rollup.tier_counts.iter().map(|t| t.count).sum();
        assert_eq!(total, 3);
        assert_eq!(rollup.tier_counts.len(), Tier::ALL.len());
        let inicial = rollup
            .tier_counts
            .iter()
            .find(|t| t.tier == Tier::Inicial)
            .expect("inicial bucket");
        assert_eq!(inicial.count, 2);
        assert!((inicial.percent - 66.666).abs() < 0.01);
    }

    #[test]
    fn program_means_and_filtering() {
        let records = vec![
            with_events("Ana", "BEM", 2, 2),
            with_events("Bia", "BEM", 0, 2),
            with_events("Caio", "Outro", 1, 2),
        ];
        let all = rollup(&records, &CohortFilter::default(), today(), &RollupSettings::default());
        assert_eq!(all.per_program.len(), 2);
        assert_eq!(all.per_program[0].group, "BEM");
        assert_eq!(all.per_program[0].students, 2);
        assert!((all.per_program[0].mean_overall - 100.0 / 12.0).abs() < 1e-9);
        assert!((all.indicator_means.event_participation - 50.0).abs() < 1e-9);

        let filter = CohortFilter {
            program: Some("Outro".to_string()),
            ..CohortFilter::default()
        };
        let only = rollup(&records, &filter, today(), &RollupSettings::default());
        assert_eq!(only.population, 1);
        assert_eq!(only.label, "Outro");
        assert!((only.mean_overall - 50.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn rejected_students_are_reported_not_scored() {
        let mut broken = record(student("Duda", "BEM"));
        let mut bad = session(2, TaskStatus::Delivered, Some(12));
        bad.presence = Some(Presence::Present);
        broken.sessions = vec![bad];
        let records = vec![strong("Ana", "BEM"), broken];

        let rollup = rollup(&records, &CohortFilter::default(), today(), &RollupSettings::default());
        assert_eq!(rollup.population, 1);
        assert_eq!(rollup.rejected.len(), 1);
        assert_eq!(rollup.rejected[0].name, "Duda");
    }

    #[test]
    fn empty_population_yields_zeroes() {
        let rollup = rollup(&[], &CohortFilter::default(), today(), &RollupSettings::default());
        assert_eq!(rollup.population, 0);
        assert_eq!(rollup.mean_overall, 0.0);
        assert!(rollup.top.is_empty());
        assert!(rollup.tier_counts.iter().all(|t| t.percent == 0.0));
    }
}
