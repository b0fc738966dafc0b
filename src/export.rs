use std::io::Write;

use serde::Serialize;
use uuid::Uuid;

use crate::cohort::StudentScore;

#[derive(Debug, Serialize)]
struct IndicatorRow<'a> {
    student_id: Uuid,
    name: &'a str,
    program: &'a str,
    company: &'a str,
    cohort: &'a str,
    mentoring_participation: String,
    practical_activities: String,
    engagement: String,
    competency_performance: String,
    learning_performance: String,
    event_participation: String,
    overall: String,
    tier: &'static str,
}

fn one_decimal(value: f64) -> String {
    format!("{value:.1}")
}

/// Writes one CSV row per scored student, in ranking order.
pub fn write_indicators_csv<W: Write>(scores: &[StudentScore], writer: W) -> anyhow::Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for score in scores {
        let indicators = &score.indicators;
        csv_writer.serialize(IndicatorRow {
            student_id: score.student_id,
            name: &score.name,
            program: &score.program,
            company: &score.company,
            cohort: &score.cohort,
            mentoring_participation: one_decimal(indicators.mentoring_participation),
            practical_activities: one_decimal(indicators.practical_activities),
            engagement: one_decimal(indicators.engagement),
            competency_performance: one_decimal(indicators.competency_performance),
            learning_performance: one_decimal(indicators.learning_performance),
            event_participation: one_decimal(indicators.event_participation),
            overall: one_decimal(indicators.overall),
            tier: indicators.tier.label(),
        })?;
    }
    csv_writer.flush()?;
    Ok(scores.len())
}
