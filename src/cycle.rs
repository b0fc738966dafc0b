use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::models::ExecutionCycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Future,
    InProgress,
    Finalized,
}

/// Status is always derived from the dates; both boundary days count as in progress.
pub fn resolve_status(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> CycleStatus {
    if today < start {
        CycleStatus::Future
    } else if today > end {
        CycleStatus::Finalized
    } else {
        CycleStatus::InProgress
    }
}

pub fn validate_cycle(cycle: &ExecutionCycle) -> EngineResult<()> {
    if cycle.end <= cycle.start {
        return Err(EngineError::InvalidCycle {
            name: cycle.name.clone(),
            start: cycle.start,
            end: cycle.end,
        });
    }
    Ok(())
}

impl ExecutionCycle {
    pub fn status(&self, today: NaiveDate) -> CycleStatus {
        resolve_status(self.start, self.end, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn statuses_partition_the_calendar() {
        let start = date(2025, 3, 1);
        let end = date(2025, 3, 31);
        assert_eq!(resolve_status(start, end, date(2025, 2, 28)), CycleStatus::Future);
        assert_eq!(resolve_status(start, end, start), CycleStatus::InProgress);
        assert_eq!(resolve_status(start, end, date(2025, 3, 15)), CycleStatus::InProgress);
        assert_eq!(resolve_status(start, end, end), CycleStatus::InProgress);
        assert_eq!(resolve_status(start, end, date(2025, 4, 1)), CycleStatus::Finalized);
    }

    #[test]
    fn status_is_exclusive_over_a_range_of_days() {
        let start = date(2025, 1, 10);
        let end = date(2025, 1, 20);
        let mut day = date(2025, 1, 1);
        while day <= date(2025, 1, 31) {
            let status = resolve_status(start, end, day);
            let finalized = day > end;
            let future = day < start;
            assert_eq!(status == CycleStatus::Finalized, finalized);
            assert_eq!(status == CycleStatus::Future, future);
            assert_eq!(status == CycleStatus::InProgress, !finalized && !future);
            day = day.succ_opt().expect("next day");
        }
    }

    #[test]
    fn rejects_cycles_that_do_not_move_forward() {
        let cycle = ExecutionCycle {
            id: Uuid::new_v4(),
            name: "Ciclo 1".to_string(),
            start: date(2025, 5, 1),
            end: date(2025, 5, 1),
            competencies: Vec::new(),
        };
        assert!(matches!(
            validate_cycle(&cycle),
            Err(EngineError::InvalidCycle { .. })
        ));
    }
}
