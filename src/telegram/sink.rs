//! Channel sink backed by the Bot API

use std::path::Path;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode, Recipient};

use crate::publish::{ChannelSink, PublishError};

/// Posts documents to the destination channel with `sendDocument`.
#[derive(Clone)]
pub struct TelegramSink {
    bot: Bot,
    recipient: Recipient,
}

impl TelegramSink {
    pub fn new(bot: Bot, recipient: Recipient) -> Self {
        Self { bot, recipient }
    }
}

#[async_trait]
impl ChannelSink for TelegramSink {
    async fn send_document(&self, path: &Path, caption: &str) -> Result<i32, PublishError> {
        if !path.is_file() {
            return Err(PublishError::Rejected(format!("{} is not a file", path.display())));
        }
        let message = self
            .bot
            .send_document(self.recipient.clone(), InputFile::file(path.to_path_buf()))
            .caption(caption.to_string())
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(message.id.0)
    }
}
