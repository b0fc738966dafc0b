use std::collections::{HashMap, HashSet};

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    AssignmentStatus, CohortFilter, Competency, CompetencyAssignment, Content, ContentKind,
    EventParticipation, ExecutionCycle, Grade, MacroCycle, MentoringSession, Presence, Student,
    StudentRecord, TaskStatus,
};
use crate::snapshot::Snapshot;

const DEFAULT_MAX_GRADE: f64 = 10.0;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn date(y: i32, m: u32, d: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d).context("invalid date")
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Avery Lee",
            "avery.lee@mentorship.dev",
            "BEM",
            "Acme Energia",
            "Turma A",
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Jules Moreno",
            "jules.moreno@mentorship.dev",
            "BEM",
            "Acme Energia",
            "Turma B",
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Kiara Patel",
            "kiara.patel@mentorship.dev",
            "Lidera",
            "Norte Logística",
            "Turma A",
        ),
    ];

    for (id, name, email, program, company, cohort) in &students {
        sqlx::query(
            r#"
            INSERT INTO mentorship.students (id, full_name, email, program, company, cohort, track)
            VALUES ($1, $2, $3, $4, $5, $6, 'Liderança')
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, program = EXCLUDED.program,
                company = EXCLUDED.company, cohort = EXCLUDED.cohort
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(program)
        .bind(company)
        .bind(cohort)
        .execute(pool)
        .await?;
    }

    let competencies = vec![
        (
            Uuid::parse_str("6b1f0a52-8c1e-4b8e-9a55-0f3b9c6a1d01")?,
            1,
            "Comunicação Assertiva",
        ),
        (
            Uuid::parse_str("6b1f0a52-8c1e-4b8e-9a55-0f3b9c6a1d02")?,
            2,
            "Gestão de Conflitos",
        ),
    ];

    for (competency_id, position, name) in &competencies {
        sqlx::query(
            r#"
            INSERT INTO mentorship.competencies (id, track, position, name)
            VALUES ($1, 'Liderança', $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(competency_id)
        .bind(position)
        .bind(name)
        .execute(pool)
        .await?;

        for (index, kind) in ["class", "podcast"].iter().enumerate() {
            let content_id = Uuid::new_v5(competency_id, kind.as_bytes());
            sqlx::query(
                r#"
                INSERT INTO mentorship.contents (id, competency_id, kind, title, max_grade)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(content_id)
            .bind(competency_id)
            .bind(kind)
            .bind(format!("{name} {}", index + 1))
            .bind(DEFAULT_MAX_GRADE)
            .execute(pool)
            .await?;
        }
    }

    let sessions = [
        (1, "present", "no_task", None),
        (2, "present", "delivered", Some(8_i16)),
        (3, "absent", "not_delivered", None),
        (4, "present", "delivered", Some(9_i16)),
        (5, "present", "no_task", Some(7_i16)),
    ];

    for (offset, (id, _, _, _, _, _)) in students.iter().enumerate() {
        let realized = sessions.len() - offset;
        for (number, presence, task, evolution) in sessions.iter().take(realized) {
            sqlx::query(
                r#"
                INSERT INTO mentorship.mentoring_sessions
                (id, student_id, session_number, held_on, presence, task_status, evolution)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (student_id, session_number) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(number)
            .bind(date(2025, *number as u32, 10)?)
            .bind(presence)
            .bind(task)
            .bind(evolution)
            .execute(pool)
            .await?;
        }

        for (event, present) in [("Webinar Liderança", true), ("Workshop Feedback", offset != 1)] {
            sqlx::query(
                r#"
                INSERT INTO mentorship.event_participations (id, student_id, event_name, present)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v5(id, event.as_bytes()))
            .bind(id)
            .bind(event)
            .bind(present)
            .execute(pool)
            .await?;
        }

        let cycle_id = Uuid::new_v5(id, b"ciclo-1");
        sqlx::query(
            r#"
            INSERT INTO mentorship.execution_cycles (id, student_id, name, starts_on, ends_on)
            VALUES ($1, $2, 'Ciclo 1', $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(cycle_id)
        .bind(id)
        .bind(date(2025, 1, 1)?)
        .bind(date(2025, 3, 31)?)
        .execute(pool)
        .await?;

        for (competency_id, _, _) in &competencies {
            sqlx::query(
                r#"
                INSERT INTO mentorship.competency_assignments (student_id, competency_id, status)
                VALUES ($1, $2, 'in_progress')
                ON CONFLICT (student_id, competency_id) DO NOTHING
                "#,
            )
            .bind(id)
            .bind(competency_id)
            .execute(pool)
            .await?;
        }

        let (first_competency, _, _) = &competencies[0];
        sqlx::query(
            r#"
            INSERT INTO mentorship.execution_cycle_competencies (cycle_id, competency_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(cycle_id)
        .bind(first_competency)
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO mentorship.content_progress (student_id, content_id, completed, grade)
            VALUES ($1, $2, TRUE, $3)
            ON CONFLICT (student_id, content_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(Uuid::new_v5(first_competency, b"class"))
        .bind(8.0 - offset as f64)
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO mentorship.macro_cycles (student_id, starts_on, ends_on, sessions_per_month)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (student_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(date(2025, 1, 1)?)
        .bind(date(2025, 6, 30)?)
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn fetch_roster(pool: &PgPool, filter: &CohortFilter) -> anyhow::Result<Vec<Student>> {
    let mut query = String::from(
        "SELECT id, full_name, program, company, cohort, track, assessment_updated_on \
         FROM mentorship.students WHERE TRUE",
    );
    let mut binds = Vec::new();
    for (column, value) in [
        ("program", &filter.program),
        ("company", &filter.company),
        ("cohort", &filter.cohort),
    ] {
        if let Some(value) = value {
            binds.push(value.as_str());
            query.push_str(&format!(" AND {column} = ${}", binds.len()));
        }
    }
    query.push_str(" ORDER BY full_name");

    let mut rows = sqlx::query(&query);
    for value in binds {
        rows = rows.bind(value);
    }

    let students = rows
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| Student {
            id: row.get("id"),
            name: row.get("full_name"),
            program: row.get("program"),
            company: row.get("company"),
            cohort: row.get("cohort"),
            track: row.get("track"),
            assessment_updated_on: row.get("assessment_updated_on"),
        })
        .collect();
    Ok(students)
}

/// Materializes every record the engine needs for the filtered roster.
pub async fn load_snapshot(pool: &PgPool, filter: &CohortFilter) -> anyhow::Result<Snapshot> {
    let roster = fetch_roster(pool, filter).await?;
    let ids: Vec<Uuid> = roster.iter().map(|s| s.id).collect();

    let mut sessions: HashMap<Uuid, Vec<MentoringSession>> = HashMap::new();
    for row in sqlx::query(
        "SELECT student_id, session_number, held_on, presence, task_status, evolution \
         FROM mentorship.mentoring_sessions WHERE student_id = ANY($1) \
         ORDER BY student_id, session_number",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?
    {
        let number: i32 = row.get("session_number");
        let evolution: Option<i16> = row.get("evolution");
        let presence: Option<String> = row.get("presence");
        let task: String = row.get("task_status");
        sessions
            .entry(row.get("student_id"))
            .or_default()
            .push(MentoringSession {
                number: u32::try_from(number).context("negative session number")?,
                date: row.get("held_on"),
                presence: presence.map(|p| p.parse::<Presence>()).transpose()?,
                task: task.parse::<TaskStatus>()?,
                evolution: evolution
                    .map(u8::try_from)
                    .transpose()
                    .context("evolution rating outside 0-10")?,
            });
    }

    let mut events: HashMap<Uuid, Vec<EventParticipation>> = HashMap::new();
    for row in sqlx::query(
        "SELECT student_id, event_name, present FROM mentorship.event_participations \
         WHERE student_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?
    {
        events
            .entry(row.get("student_id"))
            .or_default()
            .push(EventParticipation {
                event: row.get("event_name"),
                present: row.get("present"),
            });
    }

    let mut progress: HashMap<(Uuid, Uuid), (bool, Option<f64>)> = HashMap::new();
    for row in sqlx::query(
        "SELECT student_id, content_id, completed, grade FROM mentorship.content_progress \
         WHERE student_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?
    {
        progress.insert(
            (row.get("student_id"), row.get("content_id")),
            (row.get("completed"), row.get("grade")),
        );
    }

    // competency id -> (content id, kind, max grade)
    let mut catalog_contents: HashMap<Uuid, Vec<(Uuid, String, Option<f64>)>> = HashMap::new();
    for row in sqlx::query("SELECT id, competency_id, kind, max_grade FROM mentorship.contents ORDER BY id")
        .fetch_all(pool)
        .await?
    {
        catalog_contents
            .entry(row.get("competency_id"))
            .or_default()
            .push((row.get("id"), row.get("kind"), row.get("max_grade")));
    }

    let catalog: Vec<(Uuid, String, i32, String, bool)> = sqlx::query(
        "SELECT id, track, position, name, released FROM mentorship.competencies ORDER BY track, position",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| {
        (
            row.get("id"),
            row.get("track"),
            row.get("position"),
            row.get("name"),
            row.get("released"),
        )
    })
    .collect();

    let mut assignments: HashMap<Uuid, Vec<CompetencyAssignment>> = HashMap::new();
    for row in sqlx::query(
        "SELECT student_id, competency_id, target_grade, status \
         FROM mentorship.competency_assignments WHERE student_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?
    {
        let status: String = row.get("status");
        assignments
            .entry(row.get("student_id"))
            .or_default()
            .push(CompetencyAssignment {
                competency_id: row.get("competency_id"),
                target_grade: row.get("target_grade"),
                status: status.parse::<AssignmentStatus>()?,
            });
    }

    let mut cycle_competencies: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in sqlx::query(
        "SELECT cc.cycle_id, cc.competency_id FROM mentorship.execution_cycle_competencies cc \
         JOIN mentorship.execution_cycles c ON c.id = cc.cycle_id WHERE c.student_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?
    {
        cycle_competencies
            .entry(row.get("cycle_id"))
            .or_default()
            .push(row.get("competency_id"));
    }

    let mut cycles: HashMap<Uuid, Vec<ExecutionCycle>> = HashMap::new();
    for row in sqlx::query(
        "SELECT id, student_id, name, starts_on, ends_on FROM mentorship.execution_cycles \
         WHERE student_id = ANY($1) ORDER BY starts_on",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?
    {
        let id: Uuid = row.get("id");
        cycles
            .entry(row.get("student_id"))
            .or_default()
            .push(ExecutionCycle {
                id,
                name: row.get("name"),
                start: row.get("starts_on"),
                end: row.get("ends_on"),
                competencies: cycle_competencies.remove(&id).unwrap_or_default(),
            });
    }

    let mut macro_cycles: HashMap<Uuid, MacroCycle> = HashMap::new();
    for row in sqlx::query(
        "SELECT student_id, starts_on, ends_on, sessions_per_month FROM mentorship.macro_cycles \
         WHERE student_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?
    {
        let cadence: i32 = row.get("sessions_per_month");
        macro_cycles.insert(
            row.get("student_id"),
            MacroCycle {
                start: row.get("starts_on"),
                end: row.get("ends_on"),
                sessions_per_month: u32::try_from(cadence).context("negative session cadence")?,
            },
        );
    }

    let mut records = Vec::with_capacity(roster.len());
    for student in roster {
        let id = student.id;
        let student_assignments = assignments.remove(&id).unwrap_or_default();
        let student_cycles = cycles.remove(&id).unwrap_or_default();

        let mut wanted: HashSet<Uuid> = student_assignments.iter().map(|a| a.competency_id).collect();
        wanted.extend(student_cycles.iter().flat_map(|c| c.competencies.iter().copied()));

        let mut competencies = Vec::new();
        for (competency_id, track, position, name, released) in &catalog {
            if *track != student.track && !wanted.contains(competency_id) {
                continue;
            }
            let contents = catalog_contents
                .get(competency_id)
                .map(|items| {
                    items
                        .iter()
                        .map(|(content_id, kind, max_grade)| {
                            let (completed, grade) =
                                progress.get(&(id, *content_id)).copied().unwrap_or((false, None));
                            Ok(Content {
                                id: *content_id,
                                kind: kind.parse::<ContentKind>()?,
                                completed,
                                grade: grade.map(|score| Grade {
                                    score,
                                    max: max_grade.unwrap_or(DEFAULT_MAX_GRADE),
                                }),
                            })
                        })
                        .collect::<anyhow::Result<Vec<_>>>()
                })
                .transpose()?
                .unwrap_or_default();

            competencies.push(Competency {
                id: *competency_id,
                track: track.clone(),
                position: u32::try_from(*position).context("negative competency position")?,
                name: name.clone(),
                released: *released,
                contents,
            });
        }

        records.push(StudentRecord {
            sessions: sessions.remove(&id).unwrap_or_default(),
            events: events.remove(&id).unwrap_or_default(),
            competencies,
            assignments: student_assignments,
            cycles: student_cycles,
            macro_cycle: macro_cycles.remove(&id),
            student,
        });
    }

    tracing::info!(students = records.len(), label = %filter.label(), "snapshot loaded from postgres");
    Ok(Snapshot::new(records))
}
