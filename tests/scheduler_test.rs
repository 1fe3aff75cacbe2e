//! Integration tests for deferred publishing
//!
//! A staged upload is handed to the scheduler, then `run_due_jobs` is driven
//! with explicit clocks.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::path::Path;

use chrono::{Duration, TimeZone, Utc};
use common::{minimal_docx, zip_bytes, TestEnvironment};
use pretty_assertions::assert_eq;
use rejabot::scheduler::{list_pending, run_due_jobs, schedule_upload};
use rejabot::storage::catalog;
use rejabot::storage::jobs::{self, JobStatus};
use tokio::sync::mpsc;

#[tokio::test]
async fn test_job_runs_once_when_due() {
    let env = TestEnvironment::new();
    let archive = zip_bytes(&[
        ("5-sinf fizika.docx", &minimal_docx("Fizika")),
        ("1-sinf alifbe.txt", b"alifbe"),
    ]);
    let (_scratch, staged) = env.stage("haftalik.zip", &archive);
    let run_at = Utc.with_ymd_and_hms(2026, 10, 20, 4, 30, 0).unwrap();

    let id = schedule_upload(&env.ctx, &staged, "haftalik.zip", run_at, 77).unwrap();

    // The job owns the file now
    assert!(!staged.exists());
    let pending = list_pending(&env.ctx).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
    let job_file = pending[0].file_path.clone();
    assert!(Path::new(&job_file).starts_with(env.ctx.scheduled_dir()));

    let (tx, mut rx) = mpsc::unbounded_channel();

    // One minute early: nothing happens
    let ran = run_due_jobs(&env.ctx, run_at - Duration::minutes(1), &tx).await.unwrap();
    assert_eq!(ran, 0);
    assert!(env.sink.sent().is_empty());

    let ran = run_due_jobs(&env.ctx, run_at, &tx).await.unwrap();
    assert_eq!(ran, 1);

    let outcome = rx.recv().await.unwrap();
    assert_eq!(outcome.job.id, id);
    assert_eq!(outcome.job.created_by, 77);
    assert_eq!(outcome.status(), JobStatus::Done);
    assert_eq!(outcome.result.as_ref().unwrap().published.len(), 2);
    assert_eq!(catalog::count_entries(&env.conn()).unwrap(), 2);

    let job = jobs::get_job(&env.conn(), id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert!(!Path::new(&job_file).exists());
    assert!(list_pending(&env.ctx).unwrap().is_empty());

    // Never picked up twice
    let ran = run_due_jobs(&env.ctx, run_at + Duration::hours(1), &tx).await.unwrap();
    assert_eq!(ran, 0);
    assert_eq!(env.sink.sent().len(), 2);
}

#[tokio::test]
async fn test_job_with_no_published_files_is_failed() {
    let env = TestEnvironment::new();
    env.sink.fail_on("tarix");
    let (_scratch, staged) = env.stage("7-sinf tarix.docx", &minimal_docx("Tarix"));
    let run_at = Utc.with_ymd_and_hms(2026, 10, 20, 4, 30, 0).unwrap();
    let id = schedule_upload(&env.ctx, &staged, "7-sinf tarix.docx", run_at, 77).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    run_due_jobs(&env.ctx, run_at, &tx).await.unwrap();

    let outcome = rx.recv().await.unwrap();
    assert_eq!(outcome.status(), JobStatus::Failed);

    let job = jobs::get_job(&env.conn(), id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("all 1 file(s) failed"));
    assert_eq!(catalog::count_entries(&env.conn()).unwrap(), 0);
}

#[tokio::test]
async fn test_jobs_run_in_time_order() {
    let env = TestEnvironment::new();
    let base = Utc.with_ymd_and_hms(2026, 10, 20, 4, 0, 0).unwrap();

    let (_a, later) = env.stage("b.txt", b"b");
    schedule_upload(&env.ctx, &later, "b.txt", base + Duration::minutes(10), 1).unwrap();
    let (_b, sooner) = env.stage("a.txt", b"a");
    schedule_upload(&env.ctx, &sooner, "a.txt", base, 1).unwrap();

    let pending: Vec<_> = list_pending(&env.ctx)
        .unwrap()
        .into_iter()
        .map(|job| job.file_name)
        .collect();
    assert_eq!(pending, vec!["a.txt", "b.txt"]);

    let (tx, _rx) = mpsc::unbounded_channel();
    let ran = run_due_jobs(&env.ctx, base + Duration::hours(1), &tx).await.unwrap();
    assert_eq!(ran, 2);
    assert_eq!(env.sink.sent_names(), vec!["@ish_reja_uz_a.txt", "@ish_reja_uz_b.txt"]);
}
