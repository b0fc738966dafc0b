use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;
use uuid::Uuid;

use mentorship_indicators::config::AppConfig;
use mentorship_indicators::indicators::CompetencyScope;
use mentorship_indicators::models::CohortFilter;
use mentorship_indicators::{db, export, report, telemetry, Snapshot};

#[derive(Parser)]
#[command(name = "mentorship-indicators")]
#[command(about = "Performance indicators for mentoring program students", long_about = None)]
struct Cli {
    /// Read records from a JSON snapshot instead of Postgres
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,
    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    #[arg(long)]
    program: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    cohort: Option<String>,
}

impl From<FilterArgs> for CohortFilter {
    fn from(args: FilterArgs) -> Self {
        CohortFilter {
            program: args.program,
            company: args.company,
            cohort: args.cohort,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Compute the seven indicators for one student
    Indicators {
        #[arg(long)]
        student: Uuid,
        /// Restrict competency indicators to the individual plan
        #[arg(long)]
        plan: bool,
        #[arg(long, value_parser = parse_date)]
        today: Option<NaiveDate>,
    },
    /// Expected vs realized sessions for a student's macro cycle
    MacroProgress {
        #[arg(long)]
        student: Uuid,
    },
    /// Check whether a student is due a competency reassessment
    Reassessment {
        #[arg(long)]
        student: Uuid,
    },
    /// Rank a population and summarize it by tier and program
    Rollup {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        plan: bool,
        #[arg(long, value_parser = parse_date)]
        today: Option<NaiveDate>,
    },
    /// List students one session away from, or done with, their macro cycle
    Scan {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_parser = parse_date)]
        today: Option<NaiveDate>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export per-student indicators as CSV
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_parser = parse_date)]
        today: Option<NaiveDate>,
        #[arg(long, default_value = "indicators.csv")]
        out: PathBuf,
    },
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let database_url = config.require_database_url()?;
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load(
    cli_snapshot: Option<&PathBuf>,
    config: &AppConfig,
    filter: &CohortFilter,
) -> anyhow::Result<Snapshot> {
    match cli_snapshot {
        Some(path) => Snapshot::from_json_file(path),
        None => {
            let pool = connect(config).await?;
            db::load_snapshot(&pool, filter).await
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.log_level)?;

    let snapshot_path = cli.snapshot.as_ref();
    let today_or_now = |today: Option<NaiveDate>| today.unwrap_or_else(|| Utc::now().date_naive());

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Indicators {
            student,
            plan,
            today,
        } => {
            let snapshot = load(snapshot_path, &config, &CohortFilter::default()).await?;
            let today = today_or_now(today);
            let (report, compliance) = if plan {
                let plan_report = snapshot.compute_indicators_for_plan(student, today)?;
                (plan_report.report, Some(plan_report.compliance))
            } else {
                (snapshot.compute_indicators(student, today)?, None)
            };

            if cli.json {
                match &compliance {
                    Some(compliance) => print_json(&serde_json::json!({
                        "indicators": report,
                        "compliance": compliance,
                    }))?,
                    None => print_json(&report)?,
                }
                return Ok(());
            }

            let set = &report.indicators;
            println!("{} ({:?} scope, as of {today})", report.student_name, report.scope);
            println!("- Participação Mentorias: {:.1}", set.mentoring_participation);
            println!("- Atividades Práticas: {:.1}", set.practical_activities);
            println!("- Engajamento: {:.1}", set.engagement);
            println!("- Performance Competências: {:.1}", set.competency_performance);
            println!("- Performance Aprendizado: {:.1}", set.learning_performance);
            println!("- Participação Eventos: {:.1}", set.event_participation);
            println!("Performance Geral {:.1} [{}]", set.overall, set.tier);
            if let Some(compliance) = compliance {
                println!(
                    "Plan: {} of {} competencies approved ({:.1}%), mean grade {:.1}",
                    compliance.approved,
                    compliance.total_assignments,
                    compliance.approval_percent,
                    compliance.mean_grade
                );
            }
        }
        Commands::MacroProgress { student } => {
            let snapshot = load(snapshot_path, &config, &CohortFilter::default()).await?;
            let progress = snapshot.compute_macro_cycle_progress(student, config.month_span)?;
            if cli.json {
                return print_json(&progress);
            }
            println!(
                "{} of {} sessions ({:.0}%), {} remaining{}{}",
                progress.realized,
                progress.expected,
                progress.percent,
                progress.remaining,
                if progress.one_session_away { ", one session away" } else { "" },
                if progress.complete { ", cycle complete" } else { "" },
            );
        }
        Commands::Reassessment { student } => {
            let snapshot = load(snapshot_path, &config, &CohortFilter::default()).await?;
            let status = snapshot.check_reassessment(student)?;
            if cli.json {
                return print_json(&status);
            }
            println!(
                "{} sessions since last update{}",
                status.sessions_since_update,
                if status.reassessment_due { ", reassessment due" } else { "" }
            );
        }
        Commands::Rollup {
            filter,
            limit,
            plan,
            today,
        } => {
            let filter = CohortFilter::from(filter);
            let snapshot = load(snapshot_path, &config, &filter).await?;
            let scope = if plan {
                CompetencyScope::Plan
            } else {
                CompetencyScope::Track
            };
            let mut settings = config.rollup_settings(scope);
            if let Some(limit) = limit {
                settings.top_n = limit;
            }
            let rollup = snapshot.compute_cohort_rollup(&filter, today_or_now(today), &settings);
            if cli.json {
                return print_json(&rollup);
            }

            if rollup.population == 0 {
                println!("No students found for {}.", rollup.label);
                return Ok(());
            }

            println!(
                "{}: {} students, mean overall {:.1}",
                rollup.label, rollup.population, rollup.mean_overall
            );
            for tier in &rollup.tier_counts {
                println!("  {}: {}", tier.tier, tier.count);
            }
            println!("Top students by overall performance:");
            for score in &rollup.top {
                println!(
                    "- {} ({}, {}) {:.1} [{}]",
                    score.name,
                    score.program,
                    score.cohort,
                    score.indicators.overall,
                    score.indicators.tier
                );
            }
            println!("Students below {:.0}: {}", settings.at_risk_below, rollup.at_risk.len());
            for group in &rollup.per_program {
                println!("Program {}: {:.1}", group.group, group.mean_overall);
            }
        }
        Commands::Scan { filter } => {
            let filter = CohortFilter::from(filter);
            let snapshot = load(snapshot_path, &config, &filter).await?;
            let scan = snapshot
                .filtered(&filter)
                .scan_near_completion(config.month_span);
            if cli.json {
                return print_json(&scan);
            }
            println!("{} students flagged.", scan.flagged());
            for flagged in &scan.one_session_away {
                println!("- {} is one session away", flagged.name);
            }
            for flagged in &scan.complete {
                println!("- {} completed the macro cycle", flagged.name);
            }
        }
        Commands::Report { filter, today, out } => {
            let filter = CohortFilter::from(filter);
            let snapshot = load(snapshot_path, &config, &filter).await?;
            let today = today_or_now(today);
            let rollup = snapshot.compute_cohort_rollup(
                &filter,
                today,
                &config.rollup_settings(CompetencyScope::Track),
            );
            let scan = snapshot
                .filtered(&filter)
                .scan_near_completion(config.month_span);
            let report = report::build_report(&rollup, &scan, today);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { filter, today, out } => {
            let filter = CohortFilter::from(filter);
            let snapshot = load(snapshot_path, &config, &filter).await?;
            let rollup = snapshot.compute_cohort_rollup(
                &filter,
                today_or_now(today),
                &config.rollup_settings(CompetencyScope::Track),
            );
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            let written = export::write_indicators_csv(&rollup.ranking, file)?;
            info!(rows = written, path = %out.display(), "indicator export finished");
            println!("Exported {written} students to {}.", out.display());
        }
    }

    Ok(())
}
