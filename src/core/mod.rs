//! Core utilities: configuration, application context, errors and logging

pub mod config;
pub mod context;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use context::AppContext;
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_startup_configuration};
