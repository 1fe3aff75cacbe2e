//! Bot initialization and the command set
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Command menu registration

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Buyruqlar:")]
pub enum Command {
    #[command(description = "bosh menyu")]
    Start,
    #[command(description = "yordam")]
    Help,
    #[command(description = "ish rejalar mundarijasi")]
    Catalog,
    #[command(description = "AI maslahatchiga savol: /ai <savol>")]
    Ai(String),
    #[command(description = "dars ishlanmasi shabloni: /shablon <F.I.Sh>, <fan>, <sinf>")]
    Shablon(String),
    #[command(description = "sozlamani o'zgartirish: /set <kalit> <qiymat> (admin)")]
    Set(String),
    #[command(description = "sozlamalar ro'yxati (admin)")]
    Settings,
    #[command(description = "mundarijani tozalash (admin)")]
    Clear,
    #[command(description = "statistika (admin)")]
    Stats,
    #[command(description = "admin qo'shish: /addadmin <id> (admin)")]
    AddAdmin(String),
    #[command(description = "adminlar ro'yxati (admin)")]
    Admins,
    #[command(description = "rejalashtirilgan joylashlar (admin)")]
    Jobs,
}

impl Command {
    /// Commands any user may run
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            Command::Start | Command::Help | Command::Catalog | Command::Ai(_) | Command::Shablon(_)
        )
    }
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Missing token or invalid `BOT_API_URL`
pub fn create_bot() -> anyhow::Result<Bot> {
    if config::BOT_TOKEN.is_empty() {
        return Err(anyhow::anyhow!("BOT_TOKEN is not set"));
    }
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    // A local Bot API server lifts the 20 MB download limit
    let bot = match config::BOT_API_URL.as_deref() {
        Some(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            bot.set_api_url(url)
        }
        None => bot,
    };

    Ok(bot)
}

/// Sets up the public command menu in Telegram UI.
///
/// Admin commands stay out of the menu.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(vec![
        BotCommand::new("start", "bosh menyu"),
        BotCommand::new("catalog", "ish rejalar mundarijasi"),
        BotCommand::new("ai", "AI maslahatchiga savol"),
        BotCommand::new("shablon", "dars ishlanmasi shabloni"),
        BotCommand::new("help", "yordam"),
    ])
    .await?;

    Ok(())
}
