//! SQLite storage: catalog, settings, admins, scheduled jobs and the publish journal

pub mod admins;
pub mod catalog;
pub mod db;
pub mod jobs;
pub mod journal;
pub mod migrations;
pub mod settings;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
