//! Channel sink that records posts instead of calling Telegram

#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rejabot::{ChannelSink, PublishError};

/// One recorded post. The file is read at send time because the pipeline
/// deletes its scratch directory afterwards.
#[derive(Debug, Clone)]
pub struct SentDocument {
    pub file_name: String,
    pub caption: String,
    pub bytes: Vec<u8>,
    pub message_id: i32,
}

#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<SentDocument>>,
    /// Posts whose file name contains this text are refused
    fail_on: Mutex<Option<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, needle: &str) {
        *self.fail_on.lock().unwrap() = Some(needle.to_string());
    }

    pub fn sent(&self) -> Vec<SentDocument> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_names(&self) -> Vec<String> {
        self.sent().into_iter().map(|d| d.file_name).collect()
    }
}

#[async_trait]
impl ChannelSink for RecordingSink {
    async fn send_document(&self, path: &Path, caption: &str) -> Result<i32, PublishError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Some(needle) = self.fail_on.lock().unwrap().as_deref() {
            if file_name.contains(needle) {
                return Err(PublishError::Rejected(format!("refused {}", file_name)));
            }
        }

        let bytes = std::fs::read(path)?;
        let mut sent = self.sent.lock().unwrap();
        let message_id = 100 + sent.len() as i32;
        sent.push(SentDocument {
            file_name,
            caption: caption.to_string(),
            bytes,
            message_id,
        });
        Ok(message_id)
    }
}
