use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::models::{MentoringSession, Presence, TaskStatus};

pub const MAX_EVOLUTION_RATING: u8 = 10;

/// Base-100 component scores for one session; `None` means not applicable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionScores {
    pub presence: Option<f64>,
    pub task: Option<f64>,
    pub evolution: Option<f64>,
}

impl SessionScores {
    /// Mean of the applicable components, or `None` when none apply.
    pub fn composite(&self) -> Option<f64> {
        let applicable: Vec<f64> = [self.presence, self.task, self.evolution]
            .into_iter()
            .flatten()
            .collect();
        if applicable.is_empty() {
            None
        } else {
            Some(applicable.iter().sum::<f64>() / applicable.len() as f64)
        }
    }
}

pub fn score_session(session: &MentoringSession) -> EngineResult<SessionScores> {
    if session.number == 0 {
        return Err(EngineError::InvalidSessionNumber);
    }
    if let Some(rating) = session.evolution.filter(|r| *r > MAX_EVOLUTION_RATING) {
        return Err(EngineError::EvolutionOutOfRange {
            session: session.number,
            rating,
        });
    }

    let presence = session.presence.map(|presence| match presence {
        Presence::Present => 100.0,
        Presence::Absent => 0.0,
    });

    if session.is_onboarding() {
        return Ok(SessionScores {
            presence,
            task: None,
            evolution: None,
        });
    }

    let task = match session.task {
        TaskStatus::Delivered => Some(100.0),
        TaskStatus::NotDelivered => Some(0.0),
        TaskStatus::NoTask => None,
    };
    let evolution = session
        .evolution
        .map(|rating| (f64::from(rating) / 10.0 * 100.0).round());

    Ok(SessionScores {
        presence,
        task,
        evolution,
    })
}
