//! Document uploads from admins and the schedule-time prompt

use std::path::Path;

use chrono::{DateTime, Utc};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{Document, Message, ParseMode};

use super::types::{sender_id, HandlerDeps, HandlerError, StagedUpload};
use crate::catalog::{classify, escape_html};
use crate::core::AppResult;
use crate::ingest::archive::{self, ArchiveError};
use crate::scheduler::{self, format_local, ScheduleParseError};
use crate::telegram::menu::upload_keyboard;

/// Name used when Telegram does not report one
const FALLBACK_NAME: &str = "document";

/// Downloads a document into a fresh scratch directory.
async fn download_document(bot: &Bot, doc: &Document, dest: &Path) -> Result<(), HandlerError> {
    let file = bot.get_file(doc.file.id.clone()).await?;
    log::info!("📥 Downloading {} ({} bytes)", file.path, file.size);

    let mut out = tokio::fs::File::create(dest).await?;
    bot.download_file(&file.path, &mut out).await?;
    Ok(())
}

/// Handles a document sent by an admin: download, stage, offer the actions.
///
/// Uploads from other users are ignored without a reply.
pub(super) async fn handle_document(
    bot: &Bot,
    msg: &Message,
    doc: &Document,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let user_id = sender_id(msg);
    if !deps.is_admin(user_id) {
        log::debug!("Ignoring upload from non-admin {}", user_id);
        return Ok(());
    }

    let file_name = doc
        .file_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_NAME.to_string());

    if let Some(format) = archive::unsupported_container(&file_name) {
        let err = ArchiveError::Unsupported(format);
        bot.send_message(msg.chat.id, format!("❌ {}. Faqat .zip arxivlar qabul qilinadi.", err))
            .await?;
        return Ok(());
    }

    let scratch = deps.ctx.new_scratch_dir()?;
    let path = scratch.path().join(format!("upload-{}", msg.id.0));
    if let Err(e) = download_document(bot, doc, &path).await {
        log::error!("Failed to download {} from {}: {}", file_name, user_id, e);
        bot.send_message(msg.chat.id, format!("❌ Faylni yuklab bo'lmadi: {}", e))
            .await?;
        return Ok(());
    }

    let is_archive = archive::is_archive(&path, &file_name);
    let summary = if is_archive {
        format!("📦 <b>{}</b> arxivi qabul qilindi.", escape_html(&file_name))
    } else {
        format!(
            "📥 <b>{}</b> qabul qilindi.\nBo'lim: {}",
            escape_html(&file_name),
            classify(&file_name).button_label()
        )
    };

    let token = deps.sessions.stage(StagedUpload {
        owner_id: user_id,
        chat_id: msg.chat.id,
        path,
        file_name,
        is_archive,
        scratch,
    });

    bot.send_message(msg.chat.id, format!("{}\n\nNima qilamiz?", summary))
        .parse_mode(ParseMode::Html)
        .reply_markup(upload_keyboard(&token, !is_archive))
        .await?;
    Ok(())
}

/// Hands a staged upload to the scheduler.
///
/// The session is released only once the job exists, so a failed attempt
/// leaves the upload staged for another try. `None` when the token is gone.
fn schedule_staged(
    deps: &HandlerDeps,
    token: &str,
    user_id: i64,
    run_at: DateTime<Utc>,
) -> Option<AppResult<(i64, String)>> {
    let scheduled = deps.sessions.with_upload(token, user_id, |upload| {
        scheduler::schedule_upload(&deps.ctx, &upload.path, &upload.file_name, run_at, user_id)
            .map(|job_id| (job_id, upload.file_name.clone()))
    })?;
    if scheduled.is_ok() {
        drop(deps.sessions.take(token, user_id));
    }
    Some(scheduled)
}

/// Reads the publish time typed after pressing "schedule".
///
/// A bad time re-prompts and keeps the upload staged.
pub(super) async fn handle_schedule_reply(
    bot: &Bot,
    msg: &Message,
    text: &str,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let user_id = sender_id(msg);
    let Some(token) = deps.sessions.awaiting_token(user_id) else {
        return Ok(());
    };

    let offset = deps.ctx.schedule_offset;
    let run_at = match scheduler::parse_schedule_time(text, Utc::now(), offset) {
        Ok(run_at) => run_at,
        Err(e) => {
            let hint = match e {
                ScheduleParseError::InPast => "Bu vaqt o'tib ketgan.",
                ScheduleParseError::InvalidFormat(_) => "Vaqt formati noto'g'ri.",
            };
            bot.send_message(
                msg.chat.id,
                format!("⚠️ {} Qayta yuboring: 2026-10-20 09:30 yoki 20.10.2026 09:30", hint),
            )
            .await?;
            return Ok(());
        }
    };

    let (job_id, file_name) = match schedule_staged(deps, &token, user_id, run_at) {
        Some(Ok(scheduled)) => scheduled,
        Some(Err(e)) => {
            log::error!("Failed to schedule upload {} for {}: {}", token, user_id, e);
            bot.send_message(
                msg.chat.id,
                format!("❌ Rejalashtirib bo'lmadi: {}\nFayl saqlandi, vaqtni qayta yuboring.", e),
            )
            .await?;
            return Ok(());
        }
        None => {
            deps.sessions.stop_awaiting(user_id);
            bot.send_message(msg.chat.id, "⚠️ Fayl topilmadi, qaytadan yuboring.").await?;
            return Ok(());
        }
    };

    bot.send_message(
        msg.chat.id,
        format!(
            "✅ #{} rejalashtirildi: {} ({})",
            job_id,
            format_local(run_at.timestamp(), offset),
            file_name
        ),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use teloxide::types::ChatId;

    use crate::core::AppContext;
    use crate::publish::{ChannelBrand, ChannelSink, PublishError};
    use crate::storage::jobs;
    use crate::storage::test_support::test_pool;

    struct NullSink;

    #[async_trait]
    impl ChannelSink for NullSink {
        async fn send_document(&self, _path: &Path, _caption: &str) -> Result<i32, PublishError> {
            Ok(1)
        }
    }

    fn deps(root: &Path, pool: crate::storage::DbPool) -> HandlerDeps {
        let ctx = AppContext::new(
            Arc::new(pool),
            Arc::new(NullSink),
            ChannelBrand::new("kanal", ""),
            root.join("downloads"),
        );
        HandlerDeps::new(Arc::new(ctx))
    }

    fn stage(deps: &HandlerDeps, owner_id: i64) -> String {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("reja.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        deps.sessions.stage(StagedUpload {
            owner_id,
            chat_id: ChatId(owner_id),
            path,
            file_name: "reja.pdf".into(),
            is_archive: false,
            scratch,
        })
    }

    fn run_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 20, 4, 30, 0).unwrap()
    }

    #[test]
    fn test_failed_schedule_keeps_the_upload_staged() {
        let (dir, pool) = test_pool();
        let deps = deps(dir.path(), pool);
        // A regular file where the scheduled directory should be
        std::fs::create_dir_all(deps.ctx.downloads_dir.as_path()).unwrap();
        std::fs::write(deps.ctx.scheduled_dir(), b"").unwrap();
        let token = stage(&deps, 7);
        assert!(deps.sessions.await_time(7, &token));

        let result = schedule_staged(&deps, &token, 7, run_at()).unwrap();

        assert!(result.is_err());
        assert!(deps.sessions.owns(&token, 7));
        assert_eq!(deps.sessions.awaiting_token(7), Some(token.clone()));
        let still_there = deps.sessions.with_upload(&token, 7, |u| u.path.exists()).unwrap();
        assert!(still_there);
    }

    #[test]
    fn test_successful_schedule_releases_the_session() {
        let (dir, pool) = test_pool();
        let deps = deps(dir.path(), pool);
        deps.ctx.prepare_dirs().unwrap();
        let token = stage(&deps, 7);

        assert!(schedule_staged(&deps, &token, 8, run_at()).is_none());

        let (job_id, file_name) = schedule_staged(&deps, &token, 7, run_at()).unwrap().unwrap();

        assert_eq!(file_name, "reja.pdf");
        assert!(deps.sessions.is_empty());
        let conn = deps.ctx.db_pool.get().unwrap();
        let job = jobs::get_job(&conn, job_id).unwrap().unwrap();
        assert!(Path::new(&job.file_path).exists());
        assert_eq!(job.created_by, 7);
    }
}
