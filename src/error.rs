use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

/// Input-contract violations that reject a student's computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("student {0} not found")]
    StudentNotFound(Uuid),

    #[error("cycle '{name}' ends on {end} which is not after its start {start}")]
    InvalidCycle {
        name: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("sessions are numbered from 1")]
    InvalidSessionNumber,

    #[error("session {session} has evolution rating {rating}, expected 0-10")]
    EvolutionOutOfRange { session: u32, rating: u8 },

    #[error("content {content} has grade {score} outside 0-{max}")]
    GradeOutOfRange { content: Uuid, score: f64, max: f64 },

    #[error("macro cycle cadence must be at least one session per month and fit the cycle length")]
    InvalidCadence,

    #[error("student {0} has no macro cycle")]
    MissingMacroCycle(Uuid),
}

pub type EngineResult<T> = Result<T, EngineError>;
