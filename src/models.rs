use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub program: String,
    pub company: String,
    pub cohort: String,
    pub track: String,
    #[serde(default)]
    pub assessment_updated_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Present,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Delivered,
    NotDelivered,
    NoTask,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentoringSession {
    pub number: u32,
    pub date: NaiveDate,
    #[serde(default)]
    pub presence: Option<Presence>,
    pub task: TaskStatus,
    #[serde(default)]
    pub evolution: Option<u8>,
}

impl MentoringSession {
    /// Session 1 is the onboarding assessment and carries no task or evolution.
    pub fn is_onboarding(&self) -> bool {
        self.number == 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventParticipation {
    pub event: String,
    pub present: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Class,
    Film,
    Book,
    Podcast,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub score: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: Uuid,
    pub kind: ContentKind,
    pub completed: bool,
    #[serde(default)]
    pub grade: Option<Grade>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competency {
    pub id: Uuid,
    pub track: String,
    pub position: u32,
    pub name: String,
    #[serde(default = "default_released")]
    pub released: bool,
    #[serde(default)]
    pub contents: Vec<Content>,
}

fn default_released() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    InProgress,
    Completed,
}

pub const DEFAULT_TARGET_GRADE: f64 = 7.0;

fn default_target_grade() -> f64 {
    DEFAULT_TARGET_GRADE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetencyAssignment {
    pub competency_id: Uuid,
    #[serde(default = "default_target_grade")]
    pub target_grade: f64,
    pub status: AssignmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionCycle {
    pub id: Uuid,
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default)]
    pub competencies: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroCycle {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default = "default_cadence")]
    pub sessions_per_month: u32,
}

fn default_cadence() -> u32 {
    1
}

/// Everything the engine needs to score one student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student: Student,
    #[serde(default)]
    pub sessions: Vec<MentoringSession>,
    #[serde(default)]
    pub events: Vec<EventParticipation>,
    #[serde(default)]
    pub competencies: Vec<Competency>,
    #[serde(default)]
    pub assignments: Vec<CompetencyAssignment>,
    #[serde(default)]
    pub cycles: Vec<ExecutionCycle>,
    #[serde(default)]
    pub macro_cycle: Option<MacroCycle>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortFilter {
    pub program: Option<String>,
    pub company: Option<String>,
    pub cohort: Option<String>,
}

impl CohortFilter {
    pub fn matches(&self, student: &Student) -> bool {
        self.program.as_deref().map_or(true, |p| p == student.program)
            && self.company.as_deref().map_or(true, |c| c == student.company)
            && self.cohort.as_deref().map_or(true, |c| c == student.cohort)
    }

    pub fn label(&self) -> String {
        let parts: Vec<&str> = [&self.program, &self.company, &self.cohort]
            .into_iter()
            .filter_map(|value| value.as_deref())
            .collect();
        if parts.is_empty() {
            "all students".to_string()
        } else {
            parts.join(" / ")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl FromStr for Presence {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" | "presente" => Ok(Self::Present),
            "absent" | "ausente" => Ok(Self::Absent),
            _ => Err(ParseEnumError::new("presence", value)),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "delivered" | "entregue" => Ok(Self::Delivered),
            "not_delivered" | "nao_entregue" => Ok(Self::NotDelivered),
            "no_task" | "sem_tarefa" => Ok(Self::NoTask),
            _ => Err(ParseEnumError::new("task status", value)),
        }
    }
}

impl FromStr for ContentKind {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "class" | "aula" => Ok(Self::Class),
            "film" | "filme" => Ok(Self::Film),
            "book" | "livro" => Ok(Self::Book),
            "podcast" => Ok(Self::Podcast),
            "video" => Ok(Self::Video),
            _ => Err(ParseEnumError::new("content kind", value)),
        }
    }
}

impl FromStr for AssignmentStatus {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" | "pendente" => Ok(Self::Pending),
            "in_progress" | "em_progresso" => Ok(Self::InProgress),
            "completed" | "concluida" => Ok(Self::Completed),
            _ => Err(ParseEnumError::new("assignment status", value)),
        }
    }
}
