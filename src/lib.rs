//! Rejabot - Telegram channel bot for teachers' lesson plans
//!
//! Admins upload documents or zip archives; the bot brands every file
//! (renamed, stamped with the channel banner), posts it to the channel and
//! records it in a per-category catalog that users browse from the bot menu.
//!
//! # Module Structure
//!
//! - `core`: configuration, application context, errors and logging
//! - `storage`: SQLite catalog, settings, admins, scheduled jobs, publish journal
//! - `catalog`: categories, file classification and catalog rendering
//! - `transform`: renaming and per-format banners (xlsx, docx, pdf)
//! - `ingest`: archive expansion and the batch pipeline
//! - `publish`: channel posting with catalog bookkeeping
//! - `scheduler`: durable deferred publishing
//! - `telegram`: bot commands, keyboards and the dispatcher schema

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::too_many_arguments)]

pub mod assistant;
pub mod catalog;
pub mod cli;
pub mod core;
pub mod ingest;
pub mod publish;
pub mod scheduler;
pub mod storage;
pub mod telegram;
pub mod transform;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppContext, AppError, AppResult};
pub use catalog::{classify, Category};
pub use ingest::{process_upload, BatchReport};
pub use publish::{ChannelBrand, ChannelSink, PublishError};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
