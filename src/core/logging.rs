//! Logging initialization and startup diagnostics

use anyhow::Result;
use simplelog::*;
use std::fs::{File, OpenOptions};

use crate::core::context::AppContext;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = open_log_file(log_file_path).map_err(|e| anyhow::anyhow!("Failed to open log file: {}", e))?;

    // lopdf and reqwest are chatty at Info
    let config = ConfigBuilder::new()
        .add_filter_ignore_str("lopdf")
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Opens the log file for appending.
///
/// One-shot subcommands share the file with a running bot and must not
/// truncate it.
fn open_log_file(path: &str) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Logs the effective configuration at startup.
///
/// Secrets are never printed; only whether they are present.
pub fn log_startup_configuration(ctx: &AppContext) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("📋 Configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Channel: {} ({})", ctx.brand.token(), ctx.brand.chat_label());
    if ctx.owner_id == 0 {
        log::warn!("⚠️  ADMIN_ID is not set: only admins from the database can upload");
    } else {
        log::info!("Owner: {}", ctx.owner_id);
    }
    log::info!("Working directory: {}", ctx.downloads_dir.display());
    log::info!("Inter-publish delay: {:?}", ctx.publish_delay);
    log::info!("Schedule offset: UTC{:+}", ctx.schedule_offset.local_minus_utc() / 3600);
    if crate::assistant::is_enabled() {
        log::info!("✅ AI consultant enabled");
    } else {
        log::info!("AI consultant disabled (GEMINI_API_KEY not set)");
    }
}
