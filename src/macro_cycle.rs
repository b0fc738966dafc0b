use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{MacroCycle, MentoringSession, StudentRecord};

/// How the calendar months of a macro cycle are counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthSpan {
    /// Both boundary months count, so Jan..Jun is six months.
    #[default]
    Inclusive,
    /// Only the months between the boundaries, with a floor of one.
    Exclusive,
}

impl FromStr for MonthSpan {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inclusive" => Ok(Self::Inclusive),
            "exclusive" => Ok(Self::Exclusive),
            other => Err(format!("unknown month span rule '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroCycleProgress {
    pub expected: u32,
    pub realized: u32,
    pub remaining: u32,
    pub percent: f64,
    pub complete: bool,
    pub one_session_away: bool,
}

pub fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32
}

pub fn expected_sessions(cycle: &MacroCycle, rule: MonthSpan) -> EngineResult<u32> {
    if cycle.end <= cycle.start {
        return Err(EngineError::InvalidCycle {
            name: "macro cycle".to_string(),
            start: cycle.start,
            end: cycle.end,
        });
    }
    if cycle.sessions_per_month == 0 {
        return Err(EngineError::InvalidCadence);
    }

    let between = months_between(cycle.start, cycle.end).max(0) as u32;
    let months = match rule {
        MonthSpan::Inclusive => between + 1,
        MonthSpan::Exclusive => between.max(1),
    };
    months
        .checked_mul(cycle.sessions_per_month)
        .ok_or(EngineError::InvalidCadence)
}

/// Sessions with any recorded presence count as realized.
pub fn realized_sessions(sessions: &[MentoringSession]) -> u32 {
    sessions.iter().filter(|s| s.presence.is_some()).count() as u32
}

pub fn progress(
    cycle: &MacroCycle,
    sessions: &[MentoringSession],
    rule: MonthSpan,
) -> EngineResult<MacroCycleProgress> {
    let expected = expected_sessions(cycle, rule)?;
    let realized = realized_sessions(sessions);
    let percent = (f64::from(realized) / f64::from(expected) * 100.0).min(100.0);

    Ok(MacroCycleProgress {
        expected,
        realized,
        remaining: expected.saturating_sub(realized),
        percent,
        complete: realized >= expected,
        one_session_away: expected.checked_sub(realized) == Some(1),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct FlaggedStudent {
    pub student_id: Uuid,
    pub name: String,
    pub progress: MacroCycleProgress,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NearCompletionScan {
    pub one_session_away: Vec<FlaggedStudent>,
    pub complete: Vec<FlaggedStudent>,
    pub skipped: Vec<Uuid>,
}

impl NearCompletionScan {
    pub fn flagged(&self) -> usize {
        self.one_session_away.len() + self.complete.len()
    }
}

/// Read-only pass over the population collecting students due a cycle reminder.
pub fn scan_near_completion(records: &[StudentRecord], rule: MonthSpan) -> NearCompletionScan {
    let mut scan = NearCompletionScan::default();

    for record in records {
        let Some(cycle) = &record.macro_cycle else {
            continue;
        };
        let progress = match progress(cycle, &record.sessions, rule) {
            Ok(progress) => progress,
            Err(err) => {
                tracing::warn!(student = %record.student.id, error = %err, "skipping macro cycle");
                scan.skipped.push(record.student.id);
                continue;
            }
        };

        let flagged = FlaggedStudent {
            student_id: record.student.id,
            name: record.student.name.clone(),
            progress,
        };
        if progress.complete {
            scan.complete.push(flagged);
        } else if progress.one_session_away {
            scan.one_session_away.push(flagged);
        }
    }

    tracing::info!(
        one_session_away = scan.one_session_away.len(),
        complete = scan.complete.len(),
        skipped = scan.skipped.len(),
        "macro cycle scan finished"
    );
    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::fixtures::*;
    use crate::models::{Presence, TaskStatus};

    fn six_months() -> MacroCycle {
        MacroCycle {
            start: date(2025, 1, 1),
            end: date(2025, 6, 30),
            sessions_per_month: 1,
        }
    }

    fn sessions(count: u32) -> Vec<crate::models::MentoringSession> {
        (1..=count).map(|n| session(n, TaskStatus::NoTask, None)).collect()
    }

    #[test]
    fn six_month_cycle_with_five_sessions_is_one_away() {
        let progress = progress(&six_months(), &sessions(5), MonthSpan::Inclusive).expect("valid");
        assert_eq!(progress.expected, 6);
        assert_eq!(progress.realized, 5);
        assert_eq!(progress.remaining, 1);
        assert!(progress.one_session_away);
        assert!(!progress.complete);
        assert!((progress.percent - 83.33).abs() < 0.01);
    }

    #[test]
    fn completion_caps_percent_at_hundred() {
        let progress = progress(&six_months(), &sessions(8), MonthSpan::Inclusive).expect("valid");
        assert!(progress.complete);
        assert!(!progress.one_session_away);
        assert_eq!(progress.remaining, 0);
        assert_eq!(progress.percent, 100.0);
    }

    #[test]
    fn unrecorded_presence_is_not_realized() {
        let mut list = sessions(3);
        list[2].presence = None;
        list[1].presence = Some(Presence::Absent);
        assert_eq!(realized_sessions(&list), 2);
    }

    #[test]
    fn exclusive_rule_and_cadence_change_expectation() {
        let mut cycle = six_months();
        assert_eq!(expected_sessions(&cycle, MonthSpan::Exclusive), Ok(5));
        cycle.sessions_per_month = 2;
        assert_eq!(expected_sessions(&cycle, MonthSpan::Inclusive), Ok(12));

        let short = MacroCycle {
            start: date(2025, 3, 1),
            end: date(2025, 3, 20),
            sessions_per_month: 1,
        };
        assert_eq!(expected_sessions(&short, MonthSpan::Exclusive), Ok(1));
        assert_eq!(expected_sessions(&short, MonthSpan::Inclusive), Ok(1));
    }

    #[test]
    fn invalid_macro_cycles_are_rejected() {
        let mut cycle = six_months();
        cycle.sessions_per_month = 0;
        assert_eq!(
            expected_sessions(&cycle, MonthSpan::Inclusive),
            Err(EngineError::InvalidCadence)
        );
        let backwards = MacroCycle {
            start: date(2025, 6, 1),
            end: date(2025, 1, 1),
            sessions_per_month: 1,
        };
        assert!(expected_sessions(&backwards, MonthSpan::Inclusive).is_err());
    }

    #[test]
    fn overflowing_cadence_is_rejected() {
        let mut cycle = six_months();
        cycle.sessions_per_month = u32::MAX;
        assert_eq!(
            expected_sessions(&cycle, MonthSpan::Inclusive),
            Err(EngineError::InvalidCadence)
        );
        assert_eq!(
            progress(&cycle, &[], MonthSpan::Inclusive).unwrap_err(),
            EngineError::InvalidCadence
        );
    }

    #[test]
    fn scan_splits_students_by_flag() {
        let mut near = record(student("Avery Lee", "BEM"));
        near.macro_cycle = Some(six_months());
        near.sessions = sessions(5);

        let mut done = record(student("Jules Moreno", "BEM"));
        done.macro_cycle = Some(six_months());
        done.sessions = sessions(6);

        let mut early = record(student("Kiara Patel", "BEM"));
        early.macro_cycle = Some(six_months());
        early.sessions = sessions(2);

        let mut broken = record(student("Rafa Lima", "BEM"));
        broken.macro_cycle = Some(MacroCycle {
            sessions_per_month: 0,
            ..six_months()
        });

        let without = record(student("Sem Ciclo", "BEM"));

        let scan = scan_near_completion(
            &[near, done, early, broken.clone(), without],
            MonthSpan::Inclusive,
        );
        assert_eq!(scan.one_session_away.len(), 1);
        assert_eq!(scan.one_session_away[0].name, "Avery Lee");
        assert_eq!(scan.complete.len(), 1);
        assert_eq!(scan.complete[0].name, "Jules Moreno");
        assert_eq!(scan.skipped, vec![broken.student.id]);
        assert_eq!(scan.flagged(), 2);
    }

    #[test]
    fn month_span_parses_from_config_values() {
        assert_eq!("Inclusive".parse::<MonthSpan>(), Ok(MonthSpan::Inclusive));
        assert_eq!("exclusive".parse::<MonthSpan>(), Ok(MonthSpan::Exclusive));
        assert!("rounded".parse::<MonthSpan>().is_err());
    }
}
