//! Scheduled publish jobs
//!
//! `pending → running → done | failed`. A job left `running` by a crash is
//! moved to `interrupted` at startup and never re-run.

use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use strum::{Display, EnumString, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
    Interrupted,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub id: i64,
    /// Unix seconds, UTC
    pub run_at: i64,
    /// Staged file owned by the job
    pub file_path: String,
    /// Name the admin uploaded the file under
    pub file_name: String,
    pub status: JobStatus,
    pub error: Option<String>,
    pub created_by: i64,
}

const JOB_COLUMNS: &str = "id, run_at, file_path, file_name, status, error, created_by";

fn job_from_row(row: &Row<'_>) -> Result<ScheduledJob> {
    let raw: String = row.get(4)?;
    let status = raw
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(ScheduledJob {
        id: row.get(0)?,
        run_at: row.get(1)?,
        file_path: row.get(2)?,
        file_name: row.get(3)?,
        status,
        error: row.get(5)?,
        created_by: row.get(6)?,
    })
}

/// Inserts a `pending` job and returns its id.
pub fn insert_job(conn: &Connection, run_at: i64, file_path: &str, file_name: &str, created_by: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO scheduled_jobs (run_at, file_path, file_name, status, created_by)
         VALUES (?1, ?2, ?3, 'pending', ?4)",
        params![run_at, file_path, file_name, created_by],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_job(conn: &Connection, id: i64) -> Result<Option<ScheduledJob>> {
    conn.query_row(
        &format!("SELECT {} FROM scheduled_jobs WHERE id = ?1", JOB_COLUMNS),
        [id],
        job_from_row,
    )
    .optional()
}

/// Ids of pending jobs due at `now` (unix seconds), oldest target first.
pub fn due_job_ids(conn: &Connection, now: i64) -> Result<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT id FROM scheduled_jobs WHERE status = 'pending' AND run_at <= ?1 ORDER BY run_at, id")?;
    let rows = stmt.query_map([now], |row| row.get(0))?;
    rows.collect()
}

/// Moves a job from `pending` to `running`.
///
/// Returns `None` when another worker already claimed it.
pub fn claim_job(conn: &Connection, id: i64) -> Result<Option<ScheduledJob>> {
    let claimed = conn.execute(
        "UPDATE scheduled_jobs SET status = 'running' WHERE id = ?1 AND status = 'pending'",
        [id],
    )?;
    if claimed == 0 {
        return Ok(None);
    }
    get_job(conn, id)
}

/// Records the final state of a job that was running.
pub fn finish_job(conn: &Connection, id: i64, status: JobStatus, error: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE scheduled_jobs SET status = ?2, error = ?3, finished_at = CURRENT_TIMESTAMP
         WHERE id = ?1 AND status = 'running'",
        params![id, status.as_str(), error],
    )?;
    Ok(())
}

/// Pending jobs in execution order.
pub fn list_pending(conn: &Connection) -> Result<Vec<ScheduledJob>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM scheduled_jobs WHERE status = 'pending' ORDER BY run_at, id",
        JOB_COLUMNS
    ))?;
    let rows = stmt.query_map([], job_from_row)?;
    rows.collect()
}

/// Marks every `running` job as `interrupted`. Returns the affected jobs.
pub fn recover_interrupted(conn: &Connection) -> Result<Vec<ScheduledJob>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM scheduled_jobs WHERE status = 'running' ORDER BY id",
        JOB_COLUMNS
    ))?;
    let stuck = stmt.query_map([], job_from_row)?.collect::<Result<Vec<_>>>()?;

    conn.execute(
        "UPDATE scheduled_jobs
         SET status = 'interrupted', error = 'process stopped while running', finished_at = CURRENT_TIMESTAMP
         WHERE status = 'running'",
        [],
    )?;
    Ok(stuck)
}
