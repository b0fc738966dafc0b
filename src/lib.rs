//! Performance indicator engine for mentoring programs.
//!
//! Raw session, event, competency and cycle records are reduced into six
//! base-100 indicators, an overall score with its tier, macro-cycle progress
//! signals, and cohort rollups. Every computation takes "today" explicitly.

pub mod cohort;
pub mod config;
pub mod cycle;
pub mod db;
pub mod error;
pub mod export;
pub mod indicators;
pub mod macro_cycle;
pub mod models;
pub mod plan;
pub mod reassessment;
pub mod report;
pub mod session;
pub mod snapshot;
pub mod telemetry;
pub mod tier;

pub use error::{EngineError, EngineResult};
pub use snapshot::Snapshot;
