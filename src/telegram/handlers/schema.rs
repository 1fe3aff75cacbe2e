//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::callbacks::handle_callback;
use super::commands::{handle_command, handle_menu_button};
use super::types::{sender_id, HandlerDeps, HandlerError};
use super::uploads::{handle_document, handle_schedule_reply};
use crate::telegram::bot::Command;
use crate::telegram::menu::is_menu_label;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// The same schema is used in production and can be used in integration tests.
///
/// # Arguments
/// * `deps` - Handler dependencies (application context, upload sessions)
///
/// # Returns
/// The complete handler tree for the bot
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_documents = deps.clone();
    let deps_schedule = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        // Command handler
        .branch(command_handler(deps_commands))
        // Admin document uploads
        .branch(document_handler(deps_documents))
        // Publish time typed after pressing "schedule"
        .branch(schedule_reply_handler(deps_schedule))
        // Reply-keyboard buttons
        .branch(message_handler(deps_messages))
        // Callback query handler
        .branch(callback_handler(deps_callback))
}

/// Handler for bot commands (/start, /catalog, /set, etc.)
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);
                if let Err(e) = handle_command(&bot, &msg, cmd, &deps).await {
                    log::error!("Command failed in chat {}: {}", msg.chat.id, e);
                    let _ = bot.send_message(msg.chat.id, "❌ Xatolik yuz berdi.").await;
                }
                Ok(())
            }
        },
    ))
}

/// Handler for documents
fn document_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.document().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let Some(doc) = msg.document() else {
                    return Ok(());
                };
                if let Err(e) = handle_document(&bot, &msg, doc, &deps).await {
                    log::error!("Upload handling failed in chat {}: {}", msg.chat.id, e);
                    let _ = bot
                        .send_message(msg.chat.id, format!("❌ Faylni qabul qilib bo'lmadi: {}", e))
                        .await;
                }
                Ok(())
            }
        })
}

/// Plain text from a user who owes a publish time. Menu buttons pass through.
fn awaits_time(deps: &HandlerDeps, msg: &Message) -> bool {
    match msg.text() {
        Some(text) => !is_menu_label(text) && deps.sessions.awaiting_token(sender_id(msg)).is_some(),
        None => false,
    }
}

/// Handler for plain text while a publish time is awaited
fn schedule_reply_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_filter = deps.clone();

    Update::filter_message()
        .filter(move |msg: Message| awaits_time(&deps_filter, &msg))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let text = msg.text().unwrap_or_default();
                if let Err(e) = handle_schedule_reply(&bot, &msg, text, &deps).await {
                    log::error!("Scheduling failed in chat {}: {}", msg.chat.id, e);
                    let _ = bot
                        .send_message(msg.chat.id, format!("❌ Rejalashtirib bo'lmadi: {}", e))
                        .await;
                }
                Ok(())
            }
        })
}

/// Handler for reply-keyboard text
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let text = msg.text().unwrap_or_default();
                if let Err(e) = handle_menu_button(&bot, &msg, text, &deps).await {
                    log::error!("Menu handling failed in chat {}: {}", msg.chat.id, e);
                }
                Ok(())
            }
        })
}

/// Handler for callback queries (inline keyboard buttons)
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            if let Err(e) = handle_callback(&bot, &q, &deps).await {
                log::error!("Callback {:?} failed: {}", q.data, e);
            }
            Ok(())
        }
    })
}
