//! Configuration read from the environment.
//!
//! Every value is read once, on first access. `core::context::AppContext`
//! collects them into an owned struct at startup so the rest of the crate
//! never touches these statics directly.

use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Custom Bot API server (local telegram-bot-api lifts the 20 MB download limit)
/// Read from BOT_API_URL environment variable
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok().filter(|s| !s.is_empty()));

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: bot_database.db
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "bot_database.db".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Working directory for uploads, scratch space and scheduled files
/// Read from DOWNLOAD_FOLDER environment variable
/// Default: downloads
pub static DOWNLOAD_FOLDER: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "downloads".to_string()));

/// Destination channel configuration
pub mod channel {
    use once_cell::sync::Lazy;
    use std::env;

    /// Destination chat: numeric id (`-100…`) or `@username`
    /// Read from CHANNEL_ID environment variable
    pub static CHANNEL_ID: Lazy<String> = Lazy::new(|| env::var("CHANNEL_ID").unwrap_or_default());

    /// Public username of the channel, without the leading `@`
    /// Read from CHANNEL_USERNAME environment variable
    /// Default: ish_reja_uz
    pub static CHANNEL_USERNAME: Lazy<String> = Lazy::new(|| {
        env::var("CHANNEL_USERNAME")
            .ok()
            .map(|s| s.trim().trim_start_matches('@').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "ish_reja_uz".to_string())
    });
}

/// Admin configuration
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    /// Owner user ID. Always authorized, regardless of the admins table.
    /// Read from ADMIN_ID environment variable
    /// Defaults to 0 if not set (nobody is the owner)
    pub static OWNER_ID: Lazy<i64> = Lazy::new(|| {
        env::var("ADMIN_ID")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    });
}

/// Publishing configuration
pub mod publish {
    use super::Duration;

    /// Pause between two channel posts of the same batch (milliseconds).
    /// Telegram throttles bots posting to one chat at ~20 messages per minute.
    pub const INTER_PUBLISH_DELAY_MS: u64 = 3000;

    /// Telegram caption limit (characters, after entity parsing)
    pub const CAPTION_LIMIT: usize = 1024;

    /// Telegram message limit (characters)
    pub const MESSAGE_LIMIT: usize = 4096;

    /// Inter-publish delay duration
    pub fn inter_publish_delay() -> Duration {
        Duration::from_millis(INTER_PUBLISH_DELAY_MS)
    }
}

/// Scheduler configuration
pub mod schedule {
    use once_cell::sync::Lazy;
    use std::env;

    /// Operator's UTC offset in hours, used to interpret typed timestamps
    /// Read from SCHEDULE_UTC_OFFSET environment variable
    /// Default: 5 (Asia/Tashkent)
    pub static UTC_OFFSET_HOURS: Lazy<i32> = Lazy::new(|| {
        env::var("SCHEDULE_UTC_OFFSET")
            .ok()
            .and_then(|s| s.trim().trim_start_matches('+').parse().ok())
            .filter(|h: &i32| (-12..=14).contains(h))
            .unwrap_or(5)
    });

    /// How often the scheduler looks for due jobs (seconds)
    /// Read from SCHEDULE_POLL_SECS environment variable
    /// Default: 15
    pub static POLL_INTERVAL_SECS: Lazy<u64> = Lazy::new(|| {
        env::var("SCHEDULE_POLL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|s| *s > 0)
            .unwrap_or(15)
    });
}

/// AI consultant configuration
pub mod assistant {
    use once_cell::sync::Lazy;
    use std::env;

    /// Gemini API key. The consultant is disabled when unset.
    pub static GEMINI_API_KEY: Lazy<Option<String>> =
        Lazy::new(|| env::var("GEMINI_API_KEY").ok().filter(|s| !s.is_empty()));

    /// Gemini model name
    /// Default: gemini-1.5-flash
    pub static GEMINI_MODEL: Lazy<String> =
        Lazy::new(|| env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string()));
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout (in seconds). Large documents over slow links need headroom.
    pub const REQUEST_TIMEOUT_SECS: u64 = 300;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}
