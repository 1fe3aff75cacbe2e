//! Command handler implementations

use std::str::FromStr;

use strum::IntoEnumIterator;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, Message, ParseMode};
use teloxide::utils::command::BotCommands;

use super::types::{sender_id, HandlerDeps, HandlerError};
use crate::assistant;
use crate::catalog::{escape_html, render_catalog, render_header, split_message, Category};
use crate::core::config::publish::MESSAGE_LIMIT;
use crate::scheduler::{self, format_local};
use crate::storage::settings::{all_settings, get_setting, set_setting, SettingKey};
use crate::storage::{admins, catalog, get_connection};
use crate::telegram::bot::Command;
use crate::telegram::menu::{clear_confirm_keyboard, main_keyboard, AI_BUTTON, CATALOG_BUTTON};
use crate::transform::template::{create_lesson_template, TemplateRequest};

const DENIED: &str = "⛔ Bu buyruq faqat adminlar uchun.";

/// Dispatches a parsed command. Admin commands from other users get a generic denial.
pub(super) async fn handle_command(bot: &Bot, msg: &Message, cmd: Command, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let user_id = sender_id(msg);
    if !cmd.is_public() && !deps.is_admin(user_id) {
        log::warn!("User {} tried admin command {:?}", user_id, cmd);
        bot.send_message(msg.chat.id, DENIED).await?;
        return Ok(());
    }

    match cmd {
        Command::Start => handle_start(bot, msg).await?,
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
        }
        Command::Catalog => prompt_catalog(bot, msg).await?,
        Command::Ai(question) => handle_ai(bot, msg, &question).await?,
        Command::Shablon(args) => handle_template(bot, msg, &args, deps).await?,
        Command::Set(args) => handle_set(bot, msg, &args, deps).await?,
        Command::Settings => handle_settings(bot, msg, deps).await?,
        Command::Clear => {
            bot.send_message(msg.chat.id, "⚠️ Butun mundarija o'chiriladi. Davom etamizmi?")
                .reply_markup(clear_confirm_keyboard())
                .await?;
        }
        Command::Stats => handle_stats(bot, msg, deps).await?,
        Command::AddAdmin(args) => handle_add_admin(bot, msg, &args, deps).await?,
        Command::Admins => handle_admins(bot, msg, deps).await?,
        Command::Jobs => handle_jobs(bot, msg, deps).await?,
    }
    Ok(())
}

async fn handle_start(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    let name = msg.from.as_ref().map(|u| u.first_name.as_str()).unwrap_or("ustoz");
    bot.send_message(
        msg.chat.id,
        format!(
            "Assalomu alaykum, {}! 👋\n\nKerakli bo'limni tanlang yoki savolingizni /ai buyrug'i bilan yozing.",
            name
        ),
    )
    .reply_markup(main_keyboard())
    .await?;
    Ok(())
}

async fn prompt_catalog(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    bot.send_message(msg.chat.id, "📂 Bo'limni tanlang:")
        .reply_markup(main_keyboard())
        .await?;
    Ok(())
}

/// Sends the catalog of one bucket, split into as many messages as needed.
pub(super) async fn send_catalog(
    bot: &Bot,
    chat_id: ChatId,
    category: Category,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let chunks = {
        let conn = get_connection(&deps.ctx.db_pool)?;
        let header = render_header(
            &get_setting(&conn, SettingKey::CatalogHeader)?,
            &get_setting(&conn, SettingKey::Quarter)?,
        );
        let entries = catalog::get_by_category(&conn, category)?;
        render_catalog(&header, &entries, deps.ctx.brand.username())
    };

    for chunk in chunks {
        bot.send_message(chat_id, chunk).parse_mode(ParseMode::Html).await?;
    }
    Ok(())
}

/// Reply-keyboard text: category buttons and the extras.
pub(super) async fn handle_menu_button(
    bot: &Bot,
    msg: &Message,
    text: &str,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    if let Some(category) = Category::from_button(text) {
        return send_catalog(bot, msg.chat.id, category, deps).await;
    }
    match text {
        CATALOG_BUTTON => prompt_catalog(bot, msg).await,
        AI_BUTTON => {
            bot.send_message(
                msg.chat.id,
                "🤖 Savolingizni shunday yozing:\n/ai 5-sinf uchun ona tili dars ishlanmasi qanday bo'ladi?",
            )
            .await?;
            Ok(())
        }
        _ => Ok(()),
    }
}

async fn handle_ai(bot: &Bot, msg: &Message, question: &str) -> Result<(), HandlerError> {
    let question = question.trim();
    if question.is_empty() {
        bot.send_message(msg.chat.id, "Savolni buyruqdan keyin yozing: /ai <savol>")
            .await?;
        return Ok(());
    }

    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
    let answer = assistant::ask(question).await;
    for chunk in split_message(&answer, MESSAGE_LIMIT) {
        bot.send_message(msg.chat.id, chunk).await?;
    }
    Ok(())
}

async fn handle_template(bot: &Bot, msg: &Message, args: &str, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(request) = TemplateRequest::parse(args) else {
        bot.send_message(
            msg.chat.id,
            "Shunday yozing: /shablon Anvar Valiyev, Matematika, 5-sinf",
        )
        .await?;
        return Ok(());
    };

    let scratch = deps.ctx.new_scratch_dir()?;
    let dir = scratch.path().to_path_buf();
    let path = tokio::task::spawn_blocking(move || create_lesson_template(&dir, &request)).await??;

    bot.send_document(msg.chat.id, InputFile::file(path))
        .caption("📄 Dars ishlanmasi shabloni")
        .await?;
    drop(scratch);
    Ok(())
}

async fn handle_set(bot: &Bot, msg: &Message, args: &str, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let args = args.trim();
    let (key, value) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
    let Ok(key) = SettingKey::from_str(key) else {
        let keys: Vec<&str> = SettingKey::iter().map(|k| k.as_str()).collect();
        bot.send_message(
            msg.chat.id,
            format!("Noma'lum kalit. Mavjud kalitlar: {}", keys.join(", ")),
        )
        .await?;
        return Ok(());
    };

    // `\n` typed literally becomes a newline
    let value = value.trim().replace("\\n", "\n");
    {
        let conn = get_connection(&deps.ctx.db_pool)?;
        set_setting(&conn, key, &value)?;
    }
    log::info!("Setting {} changed by {}", key, sender_id(msg));
    bot.send_message(
        msg.chat.id,
        format!("✅ <code>{}</code> yangilandi.", key.as_str()),
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}

async fn handle_settings(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let settings = {
        let conn = get_connection(&deps.ctx.db_pool)?;
        all_settings(&conn)?
    };
    let mut text = String::from("⚙️ <b>Sozlamalar</b>\n");
    for (key, value) in settings {
        text.push_str(&format!(
            "\n<code>{}</code> ({})\n<pre>{}</pre>",
            key.as_str(),
            escape_html(key.describe()),
            escape_html(&value)
        ));
    }
    text.push_str("\n\nO'zgartirish: /set &lt;kalit&gt; &lt;qiymat&gt;");
    for chunk in split_message(&text, MESSAGE_LIMIT) {
        bot.send_message(msg.chat.id, chunk).parse_mode(ParseMode::Html).await?;
    }
    Ok(())
}

async fn handle_stats(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let (total, by_category, pending) = {
        let conn = get_connection(&deps.ctx.db_pool)?;
        (
            catalog::count_entries(&conn)?,
            catalog::count_by_category(&conn)?,
            crate::storage::jobs::list_pending(&conn)?.len(),
        )
    };

    let mut text = format!("📊 Jami fayllar: {}\n", total);
    for (category, count) in by_category {
        text.push_str(&format!("\n{}: {}", category.button_label(), count));
    }
    text.push_str(&format!("\n\n⏰ Navbatda: {}", pending));
    text.push_str(&format!("\n📥 Kutilayotgan yuklamalar: {}", deps.sessions.len()));
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_add_admin(bot: &Bot, msg: &Message, args: &str, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Ok(new_admin) = args.trim().parse::<i64>() else {
        bot.send_message(msg.chat.id, "Shunday yozing: /addadmin 123456789").await?;
        return Ok(());
    };

    let added = {
        let conn = get_connection(&deps.ctx.db_pool)?;
        admins::add_admin(&conn, new_admin)?
    };
    let text = if added {
        log::info!("User {} added admin {}", sender_id(msg), new_admin);
        format!("✅ {} admin qilindi.", new_admin)
    } else {
        format!("ℹ️ {} allaqachon admin.", new_admin)
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_admins(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let listed = {
        let conn = get_connection(&deps.ctx.db_pool)?;
        admins::list_admins(&conn)?
    };

    let mut text = String::from("👥 Adminlar:\n");
    if deps.ctx.owner_id != 0 {
        text.push_str(&format!("\n• {} (egasi)", deps.ctx.owner_id));
    }
    for id in listed.into_iter().filter(|id| *id != deps.ctx.owner_id) {
        text.push_str(&format!("\n• {}", id));
    }
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_jobs(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let pending = scheduler::list_pending(&deps.ctx)?;
    if pending.is_empty() {
        bot.send_message(msg.chat.id, "⏰ Rejalashtirilgan joylashlar yo'q.").await?;
        return Ok(());
    }

    let mut text = String::from("⏰ Rejalashtirilgan joylashlar:\n");
    for job in pending {
        text.push_str(&format!(
            "\n#{} {} - {}",
            job.id,
            format_local(job.run_at, deps.ctx.schedule_offset),
            job.file_name
        ));
    }
    for chunk in split_message(&text, MESSAGE_LIMIT) {
        bot.send_message(msg.chat.id, chunk).await?;
    }
    Ok(())
}
