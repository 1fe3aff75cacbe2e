//! Batch pipeline: expand → brand → classify → publish → catalog

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::catalog::{classify, Category};
use crate::core::{AppContext, AppError, AppResult};
use crate::ingest::archive::{self, ArchiveError};
use crate::publish::{publish_and_record, PublishError, PublishedFile};
use crate::storage::get_connection;
use crate::storage::settings::{get_setting, SettingKey};
use crate::transform::{brand_file, render_banner};

/// Step at which a file dropped out of the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureStage {
    Transform,
    Publish,
    /// Posted, but the catalog row is still missing
    Catalog,
}

impl FailureStage {
    fn of_publish(err: &PublishError) -> Self {
        if err.is_posted() {
            FailureStage::Catalog
        } else {
            FailureStage::Publish
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub name: String,
    pub stage: FailureStage,
    pub reason: String,
}

/// Outcome of one upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub published: Vec<PublishedFile>,
    pub failed: Vec<FailedFile>,
    /// Hidden or OS-metadata archive entries left out
    pub skipped_entries: usize,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.published.len() + self.failed.len()
    }
}

/// Progress of a running batch, for status messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    /// Files finished so far
    pub done: usize,
    pub total: usize,
    /// File being worked on
    pub current: String,
}

fn report_progress(progress: Option<&UnboundedSender<BatchProgress>>, done: usize, total: usize, current: &str) {
    if let Some(tx) = progress {
        // A closed receiver only means nobody is watching
        let _ = tx.send(BatchProgress {
            done,
            total,
            current: current.to_string(),
        });
    }
}

/// Runs the whole workflow for one upload.
///
/// `path` must live in a scratch directory owned by the caller; archives are
/// expanded next to it. A file that cannot be branded or posted is recorded
/// in the report and the batch continues. Only archive errors abort it,
/// before anything is published.
///
/// `category_override` applies to single files only.
pub async fn process_upload(
    ctx: &AppContext,
    path: &Path,
    original_name: &str,
    category_override: Option<Category>,
    progress: Option<&UnboundedSender<BatchProgress>>,
) -> AppResult<BatchReport> {
    if let Some(format) = archive::unsupported_container(original_name) {
        return Err(ArchiveError::Unsupported(format).into());
    }

    let banner = {
        let conn = get_connection(&ctx.db_pool)?;
        render_banner(&get_setting(&conn, SettingKey::WatermarkText)?, ctx.brand.username())
    };

    let mut report = BatchReport::default();
    let mut expanded = None;
    let members: Vec<(PathBuf, String)> = if archive::is_archive(path, original_name) {
        let scratch = path.parent().unwrap_or_else(|| Path::new("."));
        let contents = tokio::task::spawn_blocking({
            let path = path.to_path_buf();
            let scratch = scratch.to_path_buf();
            move || archive::expand(&path, &scratch)
        })
        .await
        .map_err(|e| AppError::Validation(format!("archive task failed: {}", e)))??;

        if category_override.is_some() {
            log::info!("Ignoring category override for archive {}", original_name);
        }
        report.skipped_entries = contents.skipped;
        let members = contents
            .files
            .iter()
            .map(|m| (m.path.clone(), m.original_name.clone()))
            .collect();
        expanded = Some(contents);
        members
    } else {
        vec![(path.to_path_buf(), original_name.to_string())]
    };
    let is_batch = expanded.is_some();

    let total = members.len();
    log::info!("Processing upload {} ({} file(s))", original_name, total);

    let mut posted_before = false;
    for (index, (member_path, name)) in members.into_iter().enumerate() {
        report_progress(progress, index, total, &name);

        let branded = match brand_file(member_path, name.clone(), ctx.brand.token(), banner.clone()).await {
            Ok(file) => file,
            Err(e) => {
                log::warn!("Skipping {}: {}", name, e);
                report.failed.push(FailedFile {
                    name,
                    stage: FailureStage::Transform,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let category = match category_override {
            Some(category) if !is_batch => category,
            _ => classify(&name),
        };

        if posted_before {
            tokio::time::sleep(ctx.publish_delay).await;
        }
        posted_before = true;

        match publish_and_record(ctx, &branded, category).await {
            Ok(published) => report.published.push(published),
            Err(e) => report.failed.push(FailedFile {
                name: branded.display_name,
                stage: FailureStage::of_publish(&e),
                reason: e.to_string(),
            }),
        }
    }
    report_progress(progress, total, total, "");

    // Extracted files go away with the archive directory
    drop(expanded);

    log::info!(
        "Upload {} done: {} published, {} failed, {} skipped",
        original_name,
        report.published.len(),
        report.failed.len(),
        report.skipped_entries
    );
    Ok(report)
}

/// Removes scratch directories left behind by a previous run.
///
/// Only safe at startup, before any upload is in flight.
pub fn clean_stale_staging(dir: &Path) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => log::warn!("Failed to remove stale {}: {}", path.display(), e),
        }
    }
    if removed > 0 {
        log::info!("Removed {} stale staging entr(ies) from {}", removed, dir.display());
    }
    Ok(removed)
}
