//! Application context shared by every component.
//!
//! Built once at startup from `core::config` and handed to handlers, the
//! ingest pipeline and the scheduler. There are no global bot or database
//! handles anywhere else in the crate.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::core::config;
use crate::publish::{ChannelBrand, ChannelSink};
use crate::storage::DbPool;

/// Subdirectory of the working directory holding per-upload scratch dirs
pub const STAGING_DIR: &str = "staging";
/// Subdirectory of the working directory holding files of scheduled jobs
pub const SCHEDULED_DIR: &str = "scheduled";

pub struct AppContext {
    pub db_pool: Arc<DbPool>,
    pub sink: Arc<dyn ChannelSink>,
    pub brand: ChannelBrand,
    pub owner_id: i64,
    pub downloads_dir: PathBuf,
    pub publish_delay: Duration,
    pub schedule_offset: FixedOffset,
}

impl AppContext {
    pub fn new(db_pool: Arc<DbPool>, sink: Arc<dyn ChannelSink>, brand: ChannelBrand, downloads_dir: PathBuf) -> Self {
        Self {
            db_pool,
            sink,
            brand,
            owner_id: 0,
            downloads_dir,
            publish_delay: config::publish::inter_publish_delay(),
            schedule_offset: offset_from_hours(5),
        }
    }

    /// Builds the context from environment configuration.
    pub fn from_env(db_pool: Arc<DbPool>, sink: Arc<dyn ChannelSink>) -> Self {
        let brand = ChannelBrand::new(
            config::channel::CHANNEL_USERNAME.as_str(),
            config::channel::CHANNEL_ID.as_str(),
        );
        Self::new(db_pool, sink, brand, PathBuf::from(config::DOWNLOAD_FOLDER.as_str()))
            .with_owner(*config::admin::OWNER_ID)
            .with_schedule_offset(offset_from_hours(*config::schedule::UTC_OFFSET_HOURS))
    }

    pub fn with_owner(mut self, owner_id: i64) -> Self {
        self.owner_id = owner_id;
        self
    }

    pub fn with_publish_delay(mut self, delay: Duration) -> Self {
        self.publish_delay = delay;
        self
    }

    pub fn with_schedule_offset(mut self, offset: FixedOffset) -> Self {
        self.schedule_offset = offset;
        self
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.downloads_dir.join(STAGING_DIR)
    }

    pub fn scheduled_dir(&self) -> PathBuf {
        self.downloads_dir.join(SCHEDULED_DIR)
    }

    /// Creates the working directory layout.
    pub fn prepare_dirs(&self) -> std::io::Result<()> {
        for dir in [self.downloads_dir.clone(), self.staging_dir(), self.scheduled_dir()] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Creates an isolated scratch directory for one ingest operation.
    ///
    /// The directory is removed when the returned guard drops.
    pub fn new_scratch_dir(&self) -> std::io::Result<tempfile::TempDir> {
        scratch_dir_in(&self.staging_dir())
    }

    /// Flushes storage before exit.
    ///
    /// Checkpoints the WAL into the main database file; pooled connections
    /// close when the last handle drops.
    pub fn shutdown(&self) {
        let state = self.db_pool.state();
        log::info!(
            "Closing storage ({} connection(s), {} idle)",
            state.connections,
            state.idle_connections
        );
        match self.db_pool.get() {
            Ok(conn) => {
                if let Err(e) = conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);") {
                    log::warn!("WAL checkpoint failed: {}", e);
                }
            }
            Err(e) => log::warn!("No connection for WAL checkpoint: {}", e),
        }
    }
}

pub(crate) fn scratch_dir_in(parent: &Path) -> std::io::Result<tempfile::TempDir> {
    std::fs::create_dir_all(parent)?;
    tempfile::Builder::new().prefix("ingest-").tempdir_in(parent)
}

/// Fixed offset for a whole number of hours; out-of-range values fall back to UTC.
pub fn offset_from_hours(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
}
