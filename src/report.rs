use std::fmt::Write;

use chrono::NaiveDate;

use crate::cohort::{CohortRollup, StudentScore};
use crate::macro_cycle::NearCompletionScan;

fn score_line(score: &StudentScore) -> String {
    format!(
        "- {} ({}, {}, {}) overall {:.1} [{}]",
        score.name,
        score.program,
        score.company,
        score.cohort,
        score.indicators.overall,
        score.indicators.tier
    )
}

pub fn build_report(rollup: &CohortRollup, scan: &NearCompletionScan, today: NaiveDate) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Mentorship Performance Report");
    let _ = writeln!(
        output,
        "Generated for {} on {} ({} students scored)",
        rollup.label, today, rollup.population
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Indicators");

    if rollup.population == 0 {
        let _ = writeln!(output, "No students matched this filter.");
    } else {
        let means = &rollup.indicator_means;
        for (label, value) in [
            ("Participação Mentorias", means.mentoring_participation),
            ("Atividades Práticas", means.practical_activities),
            ("Engajamento", means.engagement),
            ("Performance Competências", means.competency_performance),
            ("Performance Aprendizado", means.learning_performance),
            ("Participação Eventos", means.event_participation),
            ("Performance Geral", rollup.mean_overall),
        ] {
            let _ = writeln!(output, "- {label}: {value:.1}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Tier Distribution");
    for tier in &rollup.tier_counts {
        let _ = writeln!(
            output,
            "- {}: {} ({:.1}%)",
            tier.tier, tier.count, tier.percent
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Programs");
    if rollup.per_program.is_empty() {
        let _ = writeln!(output, "No programs in this population.");
    } else {
        for group in &rollup.per_program {
            let _ = writeln!(
                output,
                "- {}: {:.1} across {} students",
                group.group, group.mean_overall, group.students
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Performers");
    if rollup.top.is_empty() {
        let _ = writeln!(output, "No students scored.");
    } else {
        for score in &rollup.top {
            let _ = writeln!(output, "{}", score_line(score));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs Attention");
    if rollup.at_risk.is_empty() {
        let _ = writeln!(output, "No students below the attention threshold.");
    } else {
        for score in &rollup.at_risk {
            let _ = writeln!(output, "{}", score_line(score));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Macro Cycle Reminders");
    if scan.flagged() == 0 {
        let _ = writeln!(output, "No students are closing their macro cycle.");
    } else {
        for flagged in &scan.one_session_away {
            let _ = writeln!(
                output,
                "- {} is one session away ({} of {})",
                flagged.name, flagged.progress.realized, flagged.progress.expected
            );
        }
        for flagged in &scan.complete {
            let _ = writeln!(
                output,
                "- {} completed the macro cycle ({} sessions)",
                flagged.name, flagged.progress.realized
            );
        }
    }

    if !rollup.rejected.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Rejected Records");
        for rejected in &rollup.rejected {
            let _ = writeln!(output, "- {}: {}", rejected.name, rejected.reason);
        }
    }

    output
}
