//! Integration tests for the upload pipeline
//!
//! Runs `process_upload` end to end against a real SQLite database and a
//! recording channel sink.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::io::{Cursor, Read};

use common::{minimal_docx, minimal_pdf, minimal_xlsx, zip_bytes, TestEnvironment};
use pretty_assertions::assert_eq;
use rejabot::ingest::{process_upload, BatchProgress, FailureStage};
use rejabot::storage::catalog;
use rejabot::storage::journal::{self, JournalStatus};
use rejabot::{AppError, Category};
use tokio::sync::mpsc;

fn read_part(package: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(package)).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut xml = String::new();
    part.read_to_string(&mut xml).unwrap();
    xml
}

// ============================================================================
// Archives
// ============================================================================

#[tokio::test]
async fn test_archive_publishes_every_visible_file() {
    let env = TestEnvironment::new();
    let archive = zip_bytes(&[
        ("rejalar/5-sinf matematika.xlsx", &minimal_xlsx("Mavzu")),
        ("rejalar/3-sinf ona tili.docx", &minimal_docx("Dars")),
        ("rejalar/BSB 7-sinf.pdf", &minimal_pdf()),
        ("rejalar/.DS_Store", b"junk"),
        ("__MACOSX/rejalar/._BSB 7-sinf.pdf", b"junk"),
    ]);
    let (_scratch, path) = env.stage("rejalar.zip", &archive);

    let report = process_upload(&env.ctx, &path, "rejalar.zip", None, None).await.unwrap();

    assert_eq!(report.published.len(), 3);
    assert!(report.failed.is_empty());
    assert_eq!(report.skipped_entries, 2);
    assert_eq!(
        env.sink.sent_names(),
        vec![
            "@ish_reja_uz_5_sinf_matematika.xlsx",
            "@ish_reja_uz_3_sinf_ona_tili.docx",
            "@ish_reja_uz_bsb_7_sinf.pdf",
        ]
    );

    let conn = env.conn();
    assert_eq!(catalog::count_entries(&conn).unwrap(), 3);
    let upper = catalog::get_by_category(&conn, Category::Upper).unwrap();
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].display_name, "@ish_reja_uz_5_sinf_matematika.xlsx");
    assert_eq!(upper[0].link, "https://t.me/ish_reja_uz/100");
    assert_eq!(catalog::get_by_category(&conn, Category::Primary).unwrap().len(), 1);
    assert_eq!(catalog::get_by_category(&conn, Category::Assessment).unwrap().len(), 1);
}

#[tokio::test]
async fn test_corrupt_member_does_not_stop_the_batch() {
    let env = TestEnvironment::new();
    let archive = zip_bytes(&[
        ("buzuq.xlsx", b"this is not a workbook"),
        ("6-sinf tarix.docx", &minimal_docx("Tarix")),
    ]);
    let (_scratch, path) = env.stage("aralash.zip", &archive);

    let report = process_upload(&env.ctx, &path, "aralash.zip", None, None).await.unwrap();

    assert_eq!(report.attempted(), 2);
    assert_eq!(report.published.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "buzuq.xlsx");
    assert_eq!(report.failed[0].stage, FailureStage::Transform);
    assert_eq!(env.sink.sent_names(), vec!["@ish_reja_uz_6_sinf_tarix.docx"]);
    assert_eq!(catalog::count_entries(&env.conn()).unwrap(), 1);
}

#[tokio::test]
async fn test_extracted_files_are_removed_after_the_batch() {
    let env = TestEnvironment::new();
    let archive = zip_bytes(&[("a.txt", b"a"), ("b.txt", b"b")]);
    let (scratch, path) = env.stage("ikki.zip", &archive);

    process_upload(&env.ctx, &path, "ikki.zip", None, None).await.unwrap();

    // Only the uploaded archive itself is left in the scratch directory
    let left: Vec<_> = std::fs::read_dir(scratch.path()).unwrap().collect();
    assert_eq!(left.len(), 1);
}

#[tokio::test]
async fn test_unsupported_container_is_rejected_before_publishing() {
    let env = TestEnvironment::new();
    let (_scratch, path) = env.stage("rejalar.rar", b"Rar!\x1a\x07\x00");

    let result = process_upload(&env.ctx, &path, "rejalar.rar", None, None).await;

    assert!(matches!(result, Err(AppError::Archive(_))), "{:?}", result);
    assert!(env.sink.sent().is_empty());
}

// ============================================================================
// Single files
// ============================================================================

#[tokio::test]
async fn test_spreadsheet_content_moves_below_the_banner() {
    let env = TestEnvironment::new();
    let (_scratch, path) = env.stage("5-sinf algebra.xlsx", &minimal_xlsx("Mavzu"));

    let report = process_upload(&env.ctx, &path, "5-sinf algebra.xlsx", None, None)
        .await
        .unwrap();
    assert_eq!(report.published.len(), 1);

    let sent = env.sink.sent();
    let sheet = read_part(&sent[0].bytes, "xl/worksheets/sheet1.xml");
    assert!(
        sheet.contains(r#"<c r="A1" t="inlineStr"><is><t>@ish_reja_uz</t></is></c>"#),
        "{}",
        sheet
    );
    assert!(sheet.contains(r#"<c r="A2" t="inlineStr"><is><t>Mavzu</t></is></c>"#), "{}", sheet);
    assert!(sheet.contains("<f>LEN(A2)</f>"), "{}", sheet);
    assert!(sheet.contains(r#"<dimension ref="A1:B2"/>"#), "{}", sheet);
}

#[tokio::test]
async fn test_caption_uses_stored_template() {
    let env = TestEnvironment::new();
    let (_scratch, path) = env.stage("izoh.txt", b"matn");

    process_upload(&env.ctx, &path, "izoh.txt", None, None).await.unwrap();

    let sent = env.sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].file_name, "@ish_reja_uz_izoh.txt");
    assert!(sent[0].caption.contains("<b>@ish_reja_uz_izoh.txt</b>"), "{}", sent[0].caption);
    assert!(sent[0].caption.contains("Kanal: @ish_reja_uz"), "{}", sent[0].caption);
    // rename-only formats keep their bytes
    assert_eq!(sent[0].bytes, b"matn");
}

#[tokio::test]
async fn test_category_override_applies_to_single_file() {
    let env = TestEnvironment::new();
    let (_scratch, path) = env.stage("3-sinf.docx", &minimal_docx("Reja"));

    let report = process_upload(&env.ctx, &path, "3-sinf.docx", Some(Category::Assessment), None)
        .await
        .unwrap();

    assert_eq!(report.published[0].category, Category::Assessment);
    let conn = env.conn();
    assert_eq!(catalog::get_by_category(&conn, Category::Assessment).unwrap().len(), 1);
    assert!(catalog::get_by_category(&conn, Category::Primary).unwrap().is_empty());
}

// ============================================================================
// Publishing failures and progress
// ============================================================================

#[tokio::test]
async fn test_failed_post_leaves_no_catalog_row() {
    let env = TestEnvironment::new();
    env.sink.fail_on("ona_tili");
    let archive = zip_bytes(&[
        ("2-sinf ona tili.docx", &minimal_docx("A")),
        ("2-sinf matematika.docx", &minimal_docx("B")),
    ]);
    let (_scratch, path) = env.stage("ikkinchi.zip", &archive);

    let report = process_upload(&env.ctx, &path, "ikkinchi.zip", None, None).await.unwrap();

    assert_eq!(report.published.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].stage, FailureStage::Publish);
    assert_eq!(report.failed[0].name, "@ish_reja_uz_2_sinf_ona_tili.docx");

    let conn = env.conn();
    assert_eq!(catalog::count_entries(&conn).unwrap(), 1);
    let failed = journal::entries_with_status(&conn, JournalStatus::Failed).unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].display_name, "@ish_reja_uz_2_sinf_ona_tili.docx");
    assert!(failed[0].error.as_deref().unwrap_or_default().contains("refused"));
    assert_eq!(journal::entries_with_status(&conn, JournalStatus::Cataloged).unwrap().len(), 1);
}

#[tokio::test]
async fn test_progress_reports_each_file_then_completion() {
    let env = TestEnvironment::new();
    let archive = zip_bytes(&[("a.txt", b"a"), ("b.txt", b"b")]);
    let (_scratch, path) = env.stage("ikki.zip", &archive);
    let (tx, mut rx) = mpsc::unbounded_channel::<BatchProgress>();

    process_upload(&env.ctx, &path, "ikki.zip", None, Some(&tx)).await.unwrap();
    drop(tx);

    let mut seen = Vec::new();
    while let Some(progress) = rx.recv().await {
        seen.push((progress.done, progress.total, progress.current));
    }
    assert_eq!(
        seen,
        vec![
            (0, 2, "a.txt".to_string()),
            (1, 2, "b.txt".to_string()),
            (2, 2, String::new()),
        ]
    );
}
