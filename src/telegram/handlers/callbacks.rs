//! Inline keyboard callbacks: staged-upload actions and catalog clearing

use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};
use tokio::sync::mpsc;

use super::types::{user_id, HandlerDeps, HandlerError, StagedUpload};
use crate::catalog::{escape_html, Category};
use crate::ingest::{process_upload, BatchProgress};
use crate::storage::{catalog, get_connection};
use crate::telegram::menu::{category_keyboard, UploadAction, CLEAR_CANCEL, CLEAR_CONFIRM};
use crate::telegram::notifications::format_report;

const EXPIRED: &str = "Bu yuklama eskirgan";

pub(super) async fn handle_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let user = user_id(&q.from);
    let origin = q.message.as_ref().map(|m| (m.chat().id, m.id()));

    if data == CLEAR_CONFIRM || data == CLEAR_CANCEL {
        bot.answer_callback_query(q.id.clone()).await?;
        if !deps.is_admin(user) {
            return Ok(());
        }
        let text = if data == CLEAR_CONFIRM {
            let removed = {
                let conn = get_connection(&deps.ctx.db_pool)?;
                catalog::clear_catalog(&conn)?
            };
            log::warn!("Catalog cleared by {} ({} rows)", user, removed);
            format!("🗑 Mundarija tozalandi ({} ta yozuv).", removed)
        } else {
            "↩️ Bekor qilindi.".to_string()
        };
        if let Some((chat_id, message_id)) = origin {
            bot.edit_message_text(chat_id, message_id, text).await?;
        }
        return Ok(());
    }

    let Some((action, token)) = UploadAction::parse(data) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    if !deps.sessions.owns(&token, user) {
        bot.answer_callback_query(q.id.clone()).text(EXPIRED).await?;
        return Ok(());
    }
    bot.answer_callback_query(q.id.clone()).await?;
    let Some((chat_id, message_id)) = origin else {
        return Ok(());
    };

    match action {
        UploadAction::ChooseCategory => {
            if deps.sessions.is_single_file(&token) {
                bot.edit_message_reply_markup(chat_id, message_id)
                    .reply_markup(category_keyboard(&token))
                    .await?;
            }
        }
        UploadAction::Schedule => {
            if deps.sessions.await_time(user, &token) {
                bot.send_message(
                    chat_id,
                    format!(
                        "⏰ Joylash vaqtini yuboring (UTC{:+}):\n2026-10-20 09:30 yoki 20.10.2026 09:30",
                        deps.ctx.schedule_offset.local_minus_utc() / 3600
                    ),
                )
                .await?;
            }
        }
        UploadAction::Discard => {
            drop(deps.sessions.take(&token, user));
            bot.edit_message_text(chat_id, message_id, "❌ Bekor qilindi.").await?;
        }
        UploadAction::Publish | UploadAction::PublishAs(_) => {
            let Some(upload) = deps.sessions.take(&token, user) else {
                return Ok(());
            };
            let category = match action {
                UploadAction::PublishAs(category) => Some(category),
                _ => None,
            };
            publish_staged(bot, chat_id, message_id, upload, category, deps).await?;
        }
    }
    Ok(())
}

/// Runs the pipeline on a staged upload, keeping the status message current.
async fn publish_staged(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    upload: StagedUpload,
    category: Option<Category>,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    bot.edit_message_text(
        chat_id,
        message_id,
        format!("⏳ {} ishlanmoqda...", upload.file_name),
    )
    .await?;

    let (tx, mut rx) = mpsc::unbounded_channel::<BatchProgress>();
    let progress_bot = bot.clone();
    let progress_task = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            if progress.done >= progress.total || progress.total < 2 {
                continue;
            }
            let text = format!("⏳ {}/{}: {}", progress.done + 1, progress.total, progress.current);
            if let Err(e) = progress_bot.edit_message_text(chat_id, message_id, text).await {
                log::debug!("Progress update failed: {}", e);
            }
        }
    });

    let result = process_upload(&deps.ctx, &upload.path, &upload.file_name, category, Some(&tx)).await;
    drop(tx);
    let _ = progress_task.await;
    drop(upload);

    let text = match result {
        Ok(report) => format_report(&report),
        Err(e) => {
            log::error!("Batch failed: {}", e);
            format!("❌ Bajarilmadi: {}", escape_html(&e.to_string()))
        }
    };
    bot.edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

