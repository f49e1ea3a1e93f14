//! Job rows, conditional state updates, and the append-only log sequence.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use insight_core::errors::InsightResult;
use insight_core::models::{Job, JobParameters, JobResults, JobState, JobType, LogEntry};

use super::{parse_dt, OptionalRow};
use crate::to_storage_err;

const JOB_COLUMNS: &str = "id, user_id, job_type, state, parameters, results, error, \
                           credits_used, created_at, started_at, completed_at";

/// Optional fields applied alongside a state change, in one write.
#[derive(Debug, Default, Clone)]
pub struct JobPatch {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: Option<JobResults>,
    pub error: Option<String>,
    pub credits_used: Option<i64>,
}

pub fn create_job(
    conn: &Connection,
    job_id: &str,
    user_id: &str,
    parameters: &JobParameters,
) -> InsightResult<()> {
    let params_json = serde_json::to_string(parameters)?;
    conn.execute(
        "INSERT INTO jobs (id, user_id, job_type, state, product, parameters, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            job_id,
            user_id,
            parameters.job_type().as_str(),
            JobState::Pending.as_str(),
            parameters.product(),
            params_json,
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(to_storage_err)?;
    Ok(())
}

/// Get a job with its full log sequence.
pub fn get_job(conn: &Connection, job_id: &str) -> InsightResult<Option<Job>> {
    match get_job_bare(conn, job_id)? {
        Some(mut job) => {
            job.logs = get_job_logs(conn, job_id)?;
            Ok(Some(job))
        }
        None => Ok(None),
    }
}

/// Get a job without loading its logs.
pub fn get_job_bare(conn: &Connection, job_id: &str) -> InsightResult<Option<Job>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"))
        .map_err(to_storage_err)?;

    let result = stmt
        .query_row(params![job_id], |row| Ok(row_to_job(row)))
        .optional()
        .map_err(to_storage_err)?;

    result.transpose()
}

/// Set the job state (optionally guarded by a from-state predicate) and any
/// patch fields in one write. Defaults `started_at`/`completed_at` to now
/// for the states that require them, unless the patch supplies a value.
/// Returns whether a row was updated; a false return under a predicate
/// means the job was not in an allowed state.
pub fn update_job_state(
    conn: &Connection,
    job_id: &str,
    new_state: JobState,
    patch: &JobPatch,
    from_states: Option<&[JobState]>,
) -> InsightResult<bool> {
    let mut sets = vec!["state = ?".to_string()];
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(new_state.as_str().to_string())];

    let started_at = match (new_state, patch.started_at) {
        (_, Some(t)) => Some(t),
        (JobState::InProgress, None) => Some(Utc::now()),
        _ => None,
    };
    if let Some(t) = started_at {
        sets.push("started_at = ?".to_string());
        values.push(Box::new(t.to_rfc3339()));
    }

    let completed_at = match (new_state, patch.completed_at) {
        (_, Some(t)) => Some(t),
        (s, None) if s.is_terminal() => Some(Utc::now()),
        _ => None,
    };
    if let Some(t) = completed_at {
        sets.push("completed_at = ?".to_string());
        values.push(Box::new(t.to_rfc3339()));
    }

    if let Some(ref results) = patch.results {
        sets.push("results = ?".to_string());
        values.push(Box::new(serde_json::to_string(results)?));
    }
    if let Some(ref error) = patch.error {
        sets.push("error = ?".to_string());
        values.push(Box::new(error.clone()));
    }
    if let Some(credits) = patch.credits_used {
        sets.push("credits_used = ?".to_string());
        values.push(Box::new(credits));
    }

    let mut sql = format!("UPDATE jobs SET {} WHERE id = ?", sets.join(", "));
    values.push(Box::new(job_id.to_string()));

    if let Some(states) = from_states {
        let placeholders = vec!["?"; states.len()].join(", ");
        sql.push_str(&format!(" AND state IN ({placeholders})"));
        for s in states {
            values.push(Box::new(s.as_str().to_string()));
        }
    }

    let refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let changed = conn
        .execute(&sql, refs.as_slice())
        .map_err(to_storage_err)?;
    Ok(changed > 0)
}

/// Append a log entry. Returns false when the job does not exist.
pub fn append_job_log(conn: &Connection, job_id: &str, entry: &LogEntry) -> InsightResult<bool> {
    let details = entry
        .details
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let changed = conn
        .execute(
            "INSERT INTO job_logs (job_id, step, message, details, timestamp)
             SELECT ?1, ?2, ?3, ?4, ?5
             WHERE EXISTS (SELECT 1 FROM jobs WHERE id = ?1)",
            params![
                job_id,
                entry.step,
                entry.message,
                details,
                entry.timestamp.to_rfc3339(),
            ],
        )
        .map_err(to_storage_err)?;
    Ok(changed > 0)
}

pub fn get_job_logs(conn: &Connection, job_id: &str) -> InsightResult<Vec<LogEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT step, message, details, timestamp
             FROM job_logs WHERE job_id = ?1 ORDER BY seq ASC",
        )
        .map_err(to_storage_err)?;

    let rows = stmt
        .query_map(params![job_id], |row| {
            let details: Option<String> = row.get(2)?;
            let timestamp: String = row.get(3)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                details,
                timestamp,
            ))
        })
        .map_err(to_storage_err)?;

    let mut logs = Vec::new();
    for row in rows {
        let (step, message, details, timestamp) = row.map_err(to_storage_err)?;
        logs.push(LogEntry {
            step,
            message,
            details: details.as_deref().map(serde_json::from_str).transpose()?,
            timestamp: parse_dt(&timestamp)?,
        });
    }
    Ok(logs)
}

/// List a user's jobs newest-first, optionally filtered by state. Logs are
/// included, matching the read contract of `get_job`.
pub fn list_user_jobs(
    conn: &Connection,
    user_id: &str,
    state: Option<JobState>,
) -> InsightResult<Vec<Job>> {
    let mut jobs = match state {
        Some(s) => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs
                     WHERE user_id = ?1 AND state = ?2
                     ORDER BY created_at DESC"
                ))
                .map_err(to_storage_err)?;
            let rows = stmt
                .query_map(params![user_id, s.as_str()], |row| Ok(row_to_job(row)))
                .map_err(to_storage_err)?;
            collect_jobs(rows)?
        }
        None => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs
                     WHERE user_id = ?1
                     ORDER BY created_at DESC"
                ))
                .map_err(to_storage_err)?;
            let rows = stmt
                .query_map(params![user_id], |row| Ok(row_to_job(row)))
                .map_err(to_storage_err)?;
            collect_jobs(rows)?
        }
    };

    for job in &mut jobs {
        job.logs = get_job_logs(conn, &job.id)?;
    }
    Ok(jobs)
}

/// Jobs past the cutoff: in_progress (by started_at) and pending (by
/// created_at). Logs are not loaded; the watchdog only needs timestamps.
pub fn find_stuck_jobs(
    conn: &Connection,
    cutoff: DateTime<Utc>,
) -> InsightResult<(Vec<Job>, Vec<Job>)> {
    let cutoff_str = cutoff.to_rfc3339();

    let mut stmt = conn
        .prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE state = 'in_progress' AND started_at < ?1"
        ))
        .map_err(to_storage_err)?;
    let rows = stmt
        .query_map(params![cutoff_str], |row| Ok(row_to_job(row)))
        .map_err(to_storage_err)?;
    let stuck_in_progress = collect_jobs(rows)?;

    let mut stmt = conn
        .prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE state = 'pending' AND created_at < ?1"
        ))
        .map_err(to_storage_err)?;
    let rows = stmt
        .query_map(params![cutoff_str], |row| Ok(row_to_job(row)))
        .map_err(to_storage_err)?;
    let stuck_pending = collect_jobs(rows)?;

    Ok((stuck_in_progress, stuck_pending))
}

/// Distinct products from a user's past jobs.
pub fn list_products(conn: &Connection, user_id: &str) -> InsightResult<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT product FROM jobs
             WHERE user_id = ?1 AND product IS NOT NULL
             ORDER BY product ASC",
        )
        .map_err(to_storage_err)?;
    let rows = stmt
        .query_map(params![user_id], |row| row.get::<_, String>(0))
        .map_err(to_storage_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(to_storage_err)
}

fn collect_jobs(
    rows: impl Iterator<Item = Result<InsightResult<Job>, rusqlite::Error>>,
) -> InsightResult<Vec<Job>> {
    let mut jobs = Vec::new();
    for row in rows {
        jobs.push(row.map_err(to_storage_err)??);
    }
    Ok(jobs)
}

fn row_to_job(row: &rusqlite::Row<'_>) -> InsightResult<Job> {
    let job_type_str: String = row.get(2).map_err(to_storage_err)?;
    let state_str: String = row.get(3).map_err(to_storage_err)?;
    let params_json: String = row.get(4).map_err(to_storage_err)?;
    let results_json: Option<String> = row.get(5).map_err(to_storage_err)?;
    let created_at: String = row.get(8).map_err(to_storage_err)?;
    let started_at: Option<String> = row.get(9).map_err(to_storage_err)?;
    let completed_at: Option<String> = row.get(10).map_err(to_storage_err)?;

    let job_type = JobType::parse(&job_type_str).ok_or_else(|| {
        insight_core::errors::InsightError::Storage(insight_core::errors::StorageError::Sqlite {
            message: format!("unknown job_type '{job_type_str}'"),
        })
    })?;
    let state = JobState::parse(&state_str).ok_or_else(|| {
        insight_core::errors::InsightError::Storage(insight_core::errors::StorageError::Sqlite {
            message: format!("unknown job state '{state_str}'"),
        })
    })?;

    Ok(Job {
        id: row.get(0).map_err(to_storage_err)?,
        user_id: row.get(1).map_err(to_storage_err)?,
        job_type,
        state,
        parameters: serde_json::from_str(&params_json)?,
        results: results_json.as_deref().map(serde_json::from_str).transpose()?,
        error: row.get(6).map_err(to_storage_err)?,
        credits_used: row.get(7).map_err(to_storage_err)?,
        created_at: parse_dt(&created_at)?,
        started_at: started_at.as_deref().map(parse_dt).transpose()?,
        completed_at: completed_at.as_deref().map(parse_dt).transpose()?,
        logs: Vec::new(),
    })
}
