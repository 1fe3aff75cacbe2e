use thiserror::Error;

use crate::ingest::archive::ArchiveError;
use crate::publish::PublishError;
use crate::scheduler::ScheduleParseError;
use crate::transform::TransformError;

/// Centralized error type for the application
///
/// Component errors (`TransformError`, `ArchiveError`, `PublishError`,
/// `ScheduleParseError`) keep their own enums so callers can apply the
/// per-kind policy; everything meets here when it crosses a handler boundary.
///
/// # Example
///
/// ```no_run
/// use rejabot::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Telegram file download errors
    #[error("Telegram download error: {0}")]
    TelegramDownload(#[from] teloxide::DownloadError),

    /// HTTP errors (AI consultant)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A single file could not be branded
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Uploaded archive could not be expanded
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Channel post failed
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Operator typed an unusable timestamp
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleParseError),

    /// Privileged action attempted by a non-admin
    #[error("User {0} is not allowed to do this")]
    NotAuthorized(i64),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Anyhow errors (migrations, startup)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
