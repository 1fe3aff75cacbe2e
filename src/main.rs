use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use teloxide::update_listeners::Polling;
use teloxide::prelude::*;

use rejabot::catalog::classify;
use rejabot::cli::{Cli, Commands};
use rejabot::core::{config, init_logger, log_startup_configuration, AppContext};
use rejabot::ingest::{archive, clean_stale_staging};
use rejabot::publish::{reconcile, ChannelBrand};
use rejabot::scheduler::{self, start_scheduler};
use rejabot::storage::settings::{get_setting, SettingKey};
use rejabot::storage::{admins, catalog, create_pool, get_connection, jobs};
use rejabot::telegram::{create_bot, schema, setup_bot_commands, spawn_outcome_notifier, HandlerDeps, TelegramSink};
use rejabot::transform::{brand_file_blocking, render_banner};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    let cli = Cli::parse_args();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run) | None => run_bot().await,
        Some(Commands::Stats) => run_stats(),
        Some(Commands::AddAdmin { user_id }) => run_add_admin(user_id),
        Some(Commands::Process { file, output }) => run_process(&file, &output),
    }
}

async fn run_bot() -> Result<()> {
    log::info!("Starting rejabot {}", env!("CARGO_PKG_VERSION"));

    let db_pool = Arc::new(
        create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );
    let bot = create_bot()?;

    let brand = ChannelBrand::new(
        config::channel::CHANNEL_USERNAME.as_str(),
        config::channel::CHANNEL_ID.as_str(),
    );
    let sink = Arc::new(TelegramSink::new(bot.clone(), brand.recipient()));
    let ctx = Arc::new(AppContext::from_env(Arc::clone(&db_pool), sink));
    ctx.prepare_dirs()?;
    log_startup_configuration(&ctx);

    // Finish whatever the previous run left half-done
    {
        let mut conn = get_connection(&db_pool)?;
        let report = reconcile(&mut conn)?;
        if report.cataloged > 0 || report.unknown > 0 {
            log::warn!(
                "Publish journal: {} post(s) cataloged late, {} with unknown outcome",
                report.cataloged,
                report.unknown
            );
        }
    }
    let interrupted = scheduler::recover_interrupted(&ctx)?;
    if !interrupted.is_empty() {
        log::warn!("{} scheduled job(s) were interrupted by the restart", interrupted.len());
    }
    clean_stale_staging(&ctx.staging_dir())?;

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let outcomes = start_scheduler(Arc::clone(&ctx));
    spawn_outcome_notifier(bot.clone(), outcomes, ctx.schedule_offset);

    let handler = schema(HandlerDeps::new(Arc::clone(&ctx)));
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

    log::info!("🚀 Bot is running");
    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher shutdown gracefully");
    ctx.shutdown();
    Ok(())
}

fn run_stats() -> Result<()> {
    let db_pool = create_pool(&config::DATABASE_PATH)?;
    let conn = get_connection(&db_pool)?;

    println!("Catalog entries: {}", catalog::count_entries(&conn)?);
    for (category, count) in catalog::count_by_category(&conn)? {
        println!("  {:<14} {}", category.tag(), count);
    }
    println!("Pending jobs: {}", jobs::list_pending(&conn)?.len());
    println!("Admins: {}", admins::list_admins(&conn)?.len());
    Ok(())
}

fn run_add_admin(user_id: i64) -> Result<()> {
    let db_pool = create_pool(&config::DATABASE_PATH)?;
    let conn = get_connection(&db_pool)?;
    if admins::add_admin(&conn, user_id)? {
        println!("Added admin {}", user_id);
    } else {
        println!("{} is already an admin", user_id);
    }
    Ok(())
}

/// Brands `file` (or every member of a zip) into `output` without publishing.
fn run_process(file: &Path, output: &Path) -> Result<()> {
    let db_pool = create_pool(&config::DATABASE_PATH)?;
    let brand = ChannelBrand::new(config::channel::CHANNEL_USERNAME.as_str(), "");
    let banner = {
        let conn = get_connection(&db_pool)?;
        render_banner(&get_setting(&conn, SettingKey::WatermarkText)?, brand.username())
    };
    std::fs::create_dir_all(output)?;

    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("{} is not a file", file.display()))?;

    let scratch = tempfile::tempdir()?;
    let expanded;
    let members: Vec<(std::path::PathBuf, String)> = if archive::is_archive(file, &name) {
        expanded = archive::expand(file, scratch.path())?;
        println!("{}: {} file(s), {} skipped", name, expanded.files.len(), expanded.skipped);
        expanded
            .files
            .iter()
            .map(|m| (m.path.clone(), m.original_name.clone()))
            .collect()
    } else {
        vec![(file.to_path_buf(), name)]
    };

    for (index, (path, original)) in members.into_iter().enumerate() {
        let incoming = output.join(format!(".incoming-{}", index));
        std::fs::copy(&path, &incoming)?;
        match brand_file_blocking(&incoming, &original, &brand.token(), &banner) {
            Ok(branded) => println!(
                "{} -> {} [{}] ({:?})",
                original,
                branded.display_name,
                classify(&original),
                branded.annotation
            ),
            Err(e) => {
                let _ = std::fs::remove_file(&incoming);
                println!("{}: failed: {}", original, e);
            }
        }
    }
    Ok(())
}
