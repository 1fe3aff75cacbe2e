//! Deferred publishing.
//!
//! Jobs live in the `scheduled_jobs` table and own a private directory under
//! `downloads/scheduled/`. A background task polls for due jobs and runs the
//! regular ingest pipeline on them. Execution is at-most-once: a job caught
//! `running` by a crash is marked `interrupted` at startup and not retried,
//! so a file is never posted twice.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

use crate::core::config;
use crate::core::{AppContext, AppResult};
use crate::ingest::{process_upload, BatchReport};
use crate::storage::get_connection;
use crate::storage::jobs::{self, JobStatus, ScheduledJob};

/// Accepted timestamp layouts, tried in order
const TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M", "%d.%m.%Y %H:%M"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleParseError {
    #[error("Unrecognised time {0:?}, expected YYYY-MM-DD HH:MM or DD.MM.YYYY HH:MM")]
    InvalidFormat(String),

    #[error("Time is not in the future")]
    InPast,
}

/// Parses an operator-typed time in the operator's `offset`.
///
/// The result must be strictly after `now`.
pub fn parse_schedule_time(
    input: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<DateTime<Utc>, ScheduleParseError> {
    let input = input.trim();
    let naive = TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .ok_or_else(|| ScheduleParseError::InvalidFormat(input.to_string()))?;

    let local = offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| ScheduleParseError::InvalidFormat(input.to_string()))?;
    let run_at = local.with_timezone(&Utc);

    if run_at <= now {
        return Err(ScheduleParseError::InPast);
    }
    Ok(run_at)
}

/// Moves `src` to `dest`, copying when they sit on different filesystems.
fn move_file(src: &Path, dest: &Path) -> std::io::Result<()> {
    match std::fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(src, dest)?;
            std::fs::remove_file(src)
        }
    }
}

fn job_dir(file_path: &str) -> Option<PathBuf> {
    Path::new(file_path).parent().map(Path::to_path_buf)
}

fn remove_job_dir(job: &ScheduledJob) {
    if let Some(dir) = job_dir(&job.file_path) {
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            log::warn!("Failed to remove job directory {}: {}", dir.display(), e);
        }
    }
}

/// Takes ownership of a staged upload and queues it for `run_at`.
///
/// Returns the job id.
pub fn schedule_upload(
    ctx: &AppContext,
    staged_path: &Path,
    file_name: &str,
    run_at: DateTime<Utc>,
    created_by: i64,
) -> AppResult<i64> {
    let dir = ctx.scheduled_dir().join(uuid::Uuid::new_v4().to_string());
    std::fs::create_dir_all(&dir)?;

    let stored_name = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "upload".to_string());
    let dest = dir.join(&stored_name);
    if let Err(e) = move_file(staged_path, &dest) {
        let _ = std::fs::remove_dir_all(&dir);
        return Err(e.into());
    }

    let conn = get_connection(&ctx.db_pool)?;
    let id = match jobs::insert_job(
        &conn,
        run_at.timestamp(),
        &dest.to_string_lossy(),
        file_name,
        created_by,
    ) {
        Ok(id) => id,
        Err(e) => {
            let _ = std::fs::remove_dir_all(&dir);
            return Err(e.into());
        }
    };

    log::info!("⏰ Scheduled {} for {} (job {})", file_name, run_at, id);
    Ok(id)
}

/// Result of one executed job, delivered to the Telegram layer
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job: ScheduledJob,
    /// Batch report, or why the job failed before publishing anything
    pub result: Result<BatchReport, String>,
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match &self.result {
            Ok(report) if report.published.is_empty() && !report.failed.is_empty() => JobStatus::Failed,
            Ok(_) => JobStatus::Done,
            Err(_) => JobStatus::Failed,
        }
    }
}

async fn run_job(ctx: &AppContext, job: ScheduledJob) -> JobOutcome {
    log::info!("Running scheduled job {} ({})", job.id, job.file_name);
    let result = process_upload(ctx, Path::new(&job.file_path), &job.file_name, None, None)
        .await
        .map_err(|e| e.to_string());
    let outcome = JobOutcome { job, result };

    let status = outcome.status();
    let error = match &outcome.result {
        Err(e) => Some(e.clone()),
        Ok(report) if status == JobStatus::Failed => Some(format!("all {} file(s) failed", report.failed.len())),
        Ok(_) => None,
    };
    match get_connection(&ctx.db_pool) {
        Ok(conn) => {
            if let Err(e) = jobs::finish_job(&conn, outcome.job.id, status, error.as_deref()) {
                log::error!("Failed to record outcome of job {}: {}", outcome.job.id, e);
            }
        }
        Err(e) => log::error!("Failed to record outcome of job {}: {}", outcome.job.id, e),
    }
    remove_job_dir(&outcome.job);

    log::info!("Scheduled job {} finished: {}", outcome.job.id, status);
    outcome
}

/// Runs every job due at `now`, one after another.
///
/// Returns how many jobs ran. Outcomes go to `tx`; a closed receiver does
/// not stop execution.
pub async fn run_due_jobs(
    ctx: &AppContext,
    now: DateTime<Utc>,
    tx: &mpsc::UnboundedSender<JobOutcome>,
) -> AppResult<usize> {
    let due = {
        let conn = get_connection(&ctx.db_pool)?;
        jobs::due_job_ids(&conn, now.timestamp())?
    };

    let mut ran = 0;
    for id in due {
        let claimed = {
            let conn = get_connection(&ctx.db_pool)?;
            jobs::claim_job(&conn, id)?
        };
        let Some(job) = claimed else {
            continue;
        };
        let outcome = run_job(ctx, job).await;
        ran += 1;
        if tx.send(outcome).is_err() {
            log::warn!("Job outcome channel closed");
        }
    }
    Ok(ran)
}

/// Start the scheduler background task.
///
/// Returns a receiver for `JobOutcome`s that should be consumed by the
/// Telegram notification dispatcher.
pub fn start_scheduler(ctx: Arc<AppContext>) -> mpsc::UnboundedReceiver<JobOutcome> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let poll_secs = *config::schedule::POLL_INTERVAL_SECS;
        let mut ticker = interval(Duration::from_secs(poll_secs));

        log::info!("Publish scheduler started (interval: {}s)", poll_secs);

        loop {
            ticker.tick().await;

            if let Err(e) = run_due_jobs(&ctx, Utc::now(), &tx).await {
                log::error!("Scheduler cycle failed: {}", e);
            }
        }
    });

    rx
}

/// Marks jobs caught mid-run by a restart as `interrupted` and drops their files.
pub fn recover_interrupted(ctx: &AppContext) -> AppResult<Vec<ScheduledJob>> {
    let conn = get_connection(&ctx.db_pool)?;
    let stuck = jobs::recover_interrupted(&conn)?;
    for job in &stuck {
        log::warn!(
            "Scheduled job {} ({}) was interrupted by a restart and will not be retried",
            job.id,
            job.file_name
        );
        remove_job_dir(job);
    }
    Ok(stuck)
}

/// Pending jobs, soonest first.
pub fn list_pending(ctx: &AppContext) -> AppResult<Vec<ScheduledJob>> {
    let conn = get_connection(&ctx.db_pool)?;
    Ok(jobs::list_pending(&conn)?)
}

/// Formats a job time in the operator's offset, e.g. `2026-10-20 09:30`.
pub fn format_local(run_at: i64, offset: FixedOffset) -> String {
    match DateTime::from_timestamp(run_at, 0) {
        Some(utc) => utc.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string(),
        None => run_at.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::offset_from_hours;
    use crate::publish::{ChannelBrand, ChannelSink, PublishError};
    use crate::storage::catalog;
    use crate::storage::test_support::test_pool;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicI32, Ordering};

    struct CountingSink(AtomicI32);

    #[async_trait]
    impl ChannelSink for CountingSink {
        async fn send_document(&self, _path: &Path, _caption: &str) -> Result<i32, PublishError> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_schedule_time_formats() {
        let tashkent = offset_from_hours(5);
        let expected = Utc.with_ymd_and_hms(2026, 10, 20, 4, 30, 0).unwrap();

        assert_eq!(parse_schedule_time("2026-10-20 09:30", now(), tashkent), Ok(expected));
        assert_eq!(parse_schedule_time(" 20.10.2026 09:30 ", now(), tashkent), Ok(expected));
    }

    #[test]
    fn test_parse_schedule_time_rejects_bad_input() {
        let tashkent = offset_from_hours(5);
        assert!(matches!(
            parse_schedule_time("ertaga 9 da", now(), tashkent),
            Err(ScheduleParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_schedule_time("2026-13-01 09:30", now(), tashkent),
            Err(ScheduleParseError::InvalidFormat(_))
        ));
        // 15:00 in Tashkent is exactly `now`
        assert_eq!(
            parse_schedule_time("2026-10-19 15:00", now(), tashkent),
            Err(ScheduleParseError::InPast)
        );
    }

    #[test]
    fn test_format_local() {
        let run_at = Utc.with_ymd_and_hms(2026, 10, 20, 4, 30, 0).unwrap().timestamp();
        assert_eq!(format_local(run_at, offset_from_hours(5)), "2026-10-20 09:30");
    }

    #[tokio::test]
    async fn test_due_job_runs_once() {
        let (dir, pool) = test_pool();
        let sink = Arc::new(CountingSink(AtomicI32::new(0)));
        let ctx = AppContext::new(
            Arc::new(pool),
            sink.clone(),
            ChannelBrand::new("kanal", ""),
            dir.path().join("downloads"),
        )
        .with_publish_delay(std::time::Duration::ZERO);
        ctx.prepare_dirs().unwrap();

        let staged = dir.path().join("staged.txt");
        std::fs::write(&staged, b"reja").unwrap();
        let run_at = now() + chrono::Duration::hours(1);
        let id = schedule_upload(&ctx, &staged, "7-sinf reja.txt", run_at, 42).unwrap();
        assert!(!staged.exists());
        assert_eq!(list_pending(&ctx).unwrap().len(), 1);

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert_eq!(run_due_jobs(&ctx, now(), &tx).await.unwrap(), 0);
        assert_eq!(run_due_jobs(&ctx, run_at, &tx).await.unwrap(), 1);
        assert_eq!(run_due_jobs(&ctx, run_at, &tx).await.unwrap(), 0);

        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.job.id, id);
        assert_eq!(outcome.status(), JobStatus::Done);
        let report = outcome.result.unwrap();
        assert_eq!(report.published[0].display_name, "@kanal_7_sinf_reja.txt");
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);

        let conn = ctx.db_pool.get().unwrap();
        assert_eq!(catalog::count_entries(&conn).unwrap(), 1);
        let job = jobs::get_job(&conn, id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert!(!job_dir(&job.file_path).unwrap().exists());
    }

    #[tokio::test]
    async fn test_recover_interrupted_drops_files() {
        let (dir, pool) = test_pool();
        let ctx = AppContext::new(
            Arc::new(pool),
            Arc::new(CountingSink(AtomicI32::new(0))),
            ChannelBrand::new("kanal", ""),
            dir.path().join("downloads"),
        );
        ctx.prepare_dirs().unwrap();
        let staged = dir.path().join("staged.pdf");
        std::fs::write(&staged, b"%PDF").unwrap();
        let id = schedule_upload(&ctx, &staged, "a.pdf", now(), 1).unwrap();
        {
            let conn = ctx.db_pool.get().unwrap();
            jobs::claim_job(&conn, id).unwrap().unwrap();
        }

        let stuck = recover_interrupted(&ctx).unwrap();

        assert_eq!(stuck.len(), 1);
        assert!(!job_dir(&stuck[0].file_path).unwrap().exists());
        let conn = ctx.db_pool.get().unwrap();
        assert_eq!(jobs::get_job(&conn, id).unwrap().unwrap().status, JobStatus::Interrupted);
    }
}
