//! Handler types, dependencies and per-chat upload sessions

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use teloxide::types::{ChatId, Message, User};
use tempfile::TempDir;

use crate::core::AppContext;
use crate::storage::admins;
use crate::storage::get_connection;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub ctx: Arc<AppContext>,
    pub sessions: Arc<UploadSessions>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            sessions: Arc::new(UploadSessions::default()),
        }
    }

    /// Owner or listed admin. Database errors deny.
    pub fn is_admin(&self, user_id: i64) -> bool {
        let conn = match get_connection(&self.ctx.db_pool) {
            Ok(conn) => conn,
            Err(e) => {
                log::error!("Failed to get DB connection for admin check: {}", e);
                return false;
            }
        };
        admins::is_admin(&conn, user_id, self.ctx.owner_id).unwrap_or_else(|e| {
            log::error!("Admin check failed for {}: {}", user_id, e);
            false
        })
    }
}

/// Telegram user id of a message sender, 0 for channel posts
pub fn sender_id(msg: &Message) -> i64 {
    msg.from.as_ref().map(user_id).unwrap_or(0)
}

pub fn user_id(user: &User) -> i64 {
    i64::try_from(user.id.0).unwrap_or(0)
}

/// A downloaded file waiting for the admin's decision
#[derive(Debug)]
pub struct StagedUpload {
    pub owner_id: i64,
    pub chat_id: ChatId,
    pub path: PathBuf,
    pub file_name: String,
    pub is_archive: bool,
    /// Scratch directory holding `path`; removed with the session
    pub scratch: TempDir,
}

/// Uploads nobody acted on are dropped after this long
pub const UPLOAD_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct Staged {
    upload: StagedUpload,
    staged_at: Instant,
}

/// Uploads awaiting a button press, keyed by a random token.
///
/// Tokens are bound to the uploading admin; another admin pressing the
/// buttons gets nothing. Entries older than [`UPLOAD_TTL`] are evicted on
/// the next `stage`, which removes their scratch directories.
#[derive(Default)]
pub struct UploadSessions {
    uploads: DashMap<String, Staged>,
    /// Admin id → token of the upload waiting for a typed publish time
    awaiting_time: DashMap<i64, String>,
}

impl UploadSessions {
    /// Stores an upload and returns its token.
    pub fn stage(&self, upload: StagedUpload) -> String {
        self.evict_expired(UPLOAD_TTL);
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.uploads.insert(
            token.clone(),
            Staged {
                upload,
                staged_at: Instant::now(),
            },
        );
        token
    }

    /// Drops uploads staged at least `max_age` ago. Returns how many went.
    pub fn evict_expired(&self, max_age: Duration) -> usize {
        let mut expired = Vec::new();
        self.uploads.retain(|token, staged| {
            let keep = staged.staged_at.elapsed() < max_age;
            if !keep {
                expired.push((token.clone(), staged.upload.owner_id));
            }
            keep
        });
        for (token, owner_id) in &expired {
            self.awaiting_time.remove_if(owner_id, |_, waiting| waiting == token);
        }
        if !expired.is_empty() {
            log::info!("Evicted {} stale staged upload(s)", expired.len());
        }
        expired.len()
    }

    /// Removes and returns the upload if it belongs to `user_id`.
    pub fn take(&self, token: &str, user_id: i64) -> Option<StagedUpload> {
        let (_, staged) = self
            .uploads
            .remove_if(token, |_, staged| staged.upload.owner_id == user_id)?;
        self.awaiting_time.remove_if(&user_id, |_, waiting| waiting == token);
        Some(staged.upload)
    }

    /// Runs `f` on the upload without removing it, if it belongs to `user_id`.
    ///
    /// The map entry stays locked while `f` runs, so `f` must not touch
    /// these sessions.
    pub fn with_upload<T>(&self, token: &str, user_id: i64, f: impl FnOnce(&StagedUpload) -> T) -> Option<T> {
        let entry = self.uploads.get(token)?;
        if entry.upload.owner_id != user_id {
            return None;
        }
        Some(f(&entry.upload))
    }

    /// Whether `token` exists and belongs to `user_id`.
    pub fn owns(&self, token: &str, user_id: i64) -> bool {
        self.uploads
            .get(token)
            .map(|staged| staged.upload.owner_id == user_id)
            .unwrap_or(false)
    }

    pub fn is_single_file(&self, token: &str) -> bool {
        self.uploads.get(token).map(|s| !s.upload.is_archive).unwrap_or(false)
    }

    /// Next plain text from `user_id` is read as the publish time for `token`.
    pub fn await_time(&self, user_id: i64, token: &str) -> bool {
        if !self.owns(token, user_id) {
            return false;
        }
        self.awaiting_time.insert(user_id, token.to_string());
        true
    }

    /// Token the user is being asked a time for, if any.
    pub fn awaiting_token(&self, user_id: i64) -> Option<String> {
        self.awaiting_time.get(&user_id).map(|t| t.value().clone())
    }

    pub fn stop_awaiting(&self, user_id: i64) {
        self.awaiting_time.remove(&user_id);
    }

    pub fn len(&self) -> usize {
        self.uploads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }
}
