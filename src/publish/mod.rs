//! Channel publishing
//!
//! A post and its catalog row form one logical unit, tracked by the publish
//! journal:
//!
//! ```text
//! sending ──► sent ──► cataloged
//!    │
//!    └──► failed
//! ```
//!
//! The catalog insert and the `cataloged` mark share a transaction. If the
//! process dies after the channel accepted the file, the `sent` row is picked
//! up by [`reconcile`] on the next start.

use std::path::Path;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;
use teloxide::types::{ChatId, Recipient};
use thiserror::Error;

use crate::catalog::{escape_html, Category};
use crate::core::config::publish::CAPTION_LIMIT;
use crate::core::AppContext;
use crate::storage::journal::{self, JournalStatus};
use crate::storage::settings::{get_setting, SettingKey};
use crate::storage::get_connection;
use crate::transform::TransformedFile;

#[derive(Debug, Error)]
pub enum PublishError {
    /// Bot API refused or failed the request (network, size, rights)
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// The destination answered without a usable message
    #[error("Channel rejected the file: {0}")]
    Rejected(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The post is live but its catalog row was not written.
    /// `reconcile` finishes it on the next start.
    #[error("posted as {link}, catalog row pending: {reason}")]
    CatalogPending { link: String, reason: String },
}

impl PublishError {
    /// Whether the file already reached the channel.
    pub fn is_posted(&self) -> bool {
        matches!(self, PublishError::CatalogPending { .. })
    }
}

/// Destination channel identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBrand {
    username: String,
    chat: String,
}

impl ChannelBrand {
    /// `username` may carry a leading `@`. An empty `chat` posts to `@username`.
    pub fn new(username: &str, chat: &str) -> Self {
        let username = username.trim().trim_start_matches('@').to_string();
        let chat = match chat.trim() {
            "" => format!("@{}", username),
            other => other.to_string(),
        };
        Self { username, chat }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Brand token used in file names and banners: `@username`
    pub fn token(&self) -> String {
        format!("@{}", self.username)
    }

    /// Configured chat, for logs
    pub fn chat_label(&self) -> &str {
        &self.chat
    }

    fn numeric_chat(&self) -> Option<i64> {
        self.chat.parse().ok()
    }

    /// Public link to a channel post.
    ///
    /// Without a username, private `-100…` ids use the `t.me/c/` form.
    pub fn message_link(&self, message_id: i32) -> String {
        if !self.username.is_empty() {
            return format!("https://t.me/{}/{}", self.username, message_id);
        }
        match self.numeric_chat() {
            Some(id) => {
                let internal = id.to_string();
                let internal = internal.strip_prefix("-100").unwrap_or(internal.trim_start_matches('-'));
                format!("https://t.me/c/{}/{}", internal, message_id)
            }
            None => format!("https://t.me/{}/{}", self.chat.trim_start_matches('@'), message_id),
        }
    }

    pub fn recipient(&self) -> Recipient {
        match self.numeric_chat() {
            Some(id) => Recipient::Id(ChatId(id)),
            None => Recipient::ChannelUsername(self.chat.clone()),
        }
    }
}

/// Where files are posted. Production uses the bot; tests record calls.
#[async_trait]
pub trait ChannelSink: Send + Sync {
    /// Posts the file with an HTML caption and returns the message id.
    async fn send_document(&self, path: &Path, caption: &str) -> Result<i32, PublishError>;
}

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("Invalid HTML tag regex"));

/// Caption text as Telegram shows it: tags dropped, entities decoded.
fn visible_text(html: &str) -> String {
    HTML_TAG
        .replace_all(html, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Builds the post caption from the stored template and footer.
///
/// `{name}` is HTML-escaped. Telegram rejects captions over the limit, so an
/// overlong name is shortened with `…`. When template and footer alone are
/// over the limit the caption falls back to plain escaped text.
pub fn build_caption(template: &str, footer: &str, name: &str, channel: &str) -> String {
    let render = |name: &str| {
        let mut caption = template
            .replace("{name}", &escape_html(name))
            .replace("{channel}", channel);
        caption.push_str(footer);
        caption
    };

    let caption = render(name);
    if caption.chars().count() <= CAPTION_LIMIT {
        return caption;
    }

    let slots = template.matches("{name}").count();
    if slots > 0 {
        let overhead = render("").chars().count();
        let allowed = CAPTION_LIMIT.saturating_sub(overhead) / slots;
        if allowed > 1 {
            let mut short = String::new();
            for c in name.chars() {
                let mut candidate = short.clone();
                candidate.push(c);
                if escape_html(&candidate).chars().count() + 1 > allowed {
                    break;
                }
                short = candidate;
            }
            short.push('…');
            let caption = render(&short);
            if caption.chars().count() <= CAPTION_LIMIT {
                return caption;
            }
        }
    }

    // Template and footer alone are too long. Cutting the markup could leave
    // an unclosed tag or a split entity, so drop it and cut the visible text.
    let plain: String = visible_text(&caption).chars().take(CAPTION_LIMIT).collect();
    escape_html(&plain)
}

/// A file that reached the channel and the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedFile {
    pub catalog_id: i64,
    pub display_name: String,
    pub category: Category,
    pub link: String,
    pub message_id: i32,
}

/// Posts one branded file and records it in the catalog.
///
/// On a failed post the journal row is marked `failed` and no catalog row
/// is written.
pub async fn publish_and_record(
    ctx: &AppContext,
    file: &TransformedFile,
    category: Category,
) -> Result<PublishedFile, PublishError> {
    let (caption, journal_id) = {
        let conn = get_connection(&ctx.db_pool)?;
        let template = get_setting(&conn, SettingKey::PostCaption)?;
        let footer = get_setting(&conn, SettingKey::FooterText)?;
        let caption = build_caption(&template, &footer, &file.display_name, ctx.brand.username());
        let journal_id = journal::begin(&conn, &file.display_name, category)?;
        (caption, journal_id)
    };

    let message_id = match ctx.sink.send_document(&file.path, &caption).await {
        Ok(id) => id,
        Err(e) => {
            log::error!("Failed to post {} to {}: {}", file.display_name, ctx.brand.chat_label(), e);
            match get_connection(&ctx.db_pool) {
                Ok(conn) => {
                    if let Err(db_err) = journal::mark_failed(&conn, journal_id, &e.to_string()) {
                        log::error!("Failed to mark journal row {} as failed: {}", journal_id, db_err);
                    }
                }
                Err(pool_err) => log::error!("Failed to mark journal row {} as failed: {}", journal_id, pool_err),
            }
            return Err(e);
        }
    };

    let link = ctx.brand.message_link(message_id);
    let catalog_id = match record_sent(ctx, journal_id, file, category, &link, message_id) {
        Ok(id) => id,
        Err(e) => {
            log::error!("Posted {} as {} but failed to catalog it: {}", file.display_name, link, e);
            return Err(PublishError::CatalogPending {
                link,
                reason: e.to_string(),
            });
        }
    };

    log::info!("📤 Published {} [{}] as {}", file.display_name, category, link);
    Ok(PublishedFile {
        catalog_id,
        display_name: file.display_name.clone(),
        category,
        link,
        message_id,
    })
}

/// Journal and catalog writes after the channel accepted the post.
fn record_sent(
    ctx: &AppContext,
    journal_id: i64,
    file: &TransformedFile,
    category: Category,
    link: &str,
    message_id: i32,
) -> Result<i64, PublishError> {
    let mut conn = get_connection(&ctx.db_pool)?;
    journal::mark_sent(&conn, journal_id, message_id, link)?;
    let catalog_id = journal::commit_catalog(&mut conn, journal_id, &file.display_name, category, link, message_id)?;
    Ok(catalog_id)
}

/// Outcome of a startup reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Sent posts whose catalog row was written now
    pub cataloged: usize,
    /// Posts interrupted mid-send; they may or may not exist in the channel
    pub unknown: usize,
}

/// Finishes publishes interrupted by a crash.
pub fn reconcile(conn: &mut Connection) -> rusqlite::Result<ReconcileReport> {
    let mut report = ReconcileReport::default();

    for entry in journal::entries_with_status(conn, JournalStatus::Sent)? {
        let (Some(message_id), Some(link)) = (entry.message_id, entry.link.as_deref()) else {
            log::warn!("Journal row {} is sent but has no message id", entry.id);
            continue;
        };
        let Some(category) = Category::from_tag(&entry.category) else {
            log::warn!("Journal row {} has unknown category {:?}", entry.id, entry.category);
            continue;
        };
        journal::commit_catalog(conn, entry.id, &entry.display_name, category, link, message_id)?;
        log::info!("Recovered catalog row for {} ({})", entry.display_name, link);
        report.cataloged += 1;
    }

    for entry in journal::mark_stale_sending(conn)? {
        log::warn!(
            "Publish of {} was interrupted mid-send; check the channel manually",
            entry.display_name
        );
        report.unknown += 1;
    }

    Ok(report)
}
