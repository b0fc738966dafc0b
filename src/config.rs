use std::env;

use thiserror::Error;

use crate::cohort::RollupSettings;
use crate::indicators::CompetencyScope;
use crate::macro_cycle::MonthSpan;

/// Runtime settings read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub log_level: String,
    pub top_n: usize,
    pub at_risk_below: f64,
    pub month_span: MonthSpan,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MENTORSHIP_TOP_N must be a positive integer, got '{0}'")]
    InvalidTopN(String),
    #[error("MENTORSHIP_AT_RISK_BELOW must be a number between 0 and 100, got '{0}'")]
    InvalidThreshold(String),
    #[error("MENTORSHIP_MONTH_SPAN: {0}")]
    InvalidMonthSpan(String),
    #[error("DATABASE_URL must be set when no --snapshot file is given")]
    MissingDatabaseUrl,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty());
        let log_level = env::var("MENTORSHIP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let top_n = match env::var("MENTORSHIP_TOP_N") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidTopN(raw))?,
            Err(_) => 10,
        };

        let at_risk_below = match env::var("MENTORSHIP_AT_RISK_BELOW") {
            Ok(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| (0.0..=100.0).contains(value))
                .ok_or(ConfigError::InvalidThreshold(raw))?,
            Err(_) => 50.0,
        };

        let month_span = match env::var("MENTORSHIP_MONTH_SPAN") {
            Ok(raw) => raw.parse::<MonthSpan>().map_err(ConfigError::InvalidMonthSpan)?,
            Err(_) => MonthSpan::default(),
        };

        Ok(Self {
            database_url,
            log_level,
            top_n,
            at_risk_below,
            month_span,
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseUrl)
    }

    pub fn rollup_settings(&self, scope: CompetencyScope) -> RollupSettings {
        RollupSettings {
            top_n: self.top_n,
            at_risk_below: self.at_risk_below,
            scope,
        }
    }
}
