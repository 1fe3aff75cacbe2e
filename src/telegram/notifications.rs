//! Admin-facing reports: batch summaries and scheduled job outcomes

use chrono::FixedOffset;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tokio::sync::mpsc;

use crate::catalog::escape_html;
use crate::ingest::{BatchReport, FailureStage};
use crate::scheduler::{format_local, JobOutcome};

/// Files listed by name before the rest are summarised
const MAX_LISTED: usize = 10;

/// HTML summary of a finished batch.
pub fn format_report(report: &BatchReport) -> String {
    let mut text = format!(
        "✅ Joylandi: <b>{}</b> / {}",
        report.published.len(),
        report.attempted()
    );
    if report.skipped_entries > 0 {
        text.push_str(&format!("\n🙈 Tashlab ketildi (yashirin/tizim): {}", report.skipped_entries));
    }
    for published in report.published.iter().take(MAX_LISTED) {
        text.push_str(&format!(
            "\n• <a href=\"{}\">{}</a> [{}]",
            escape_html(&published.link),
            escape_html(&published.display_name),
            published.category
        ));
    }
    if report.published.len() > MAX_LISTED {
        text.push_str(&format!("\n… va yana {}", report.published.len() - MAX_LISTED));
    }

    if !report.failed.is_empty() {
        text.push_str(&format!("\n\n❌ Xatolik: {}", report.failed.len()));
        for failed in report.failed.iter().take(MAX_LISTED) {
            let stage = match failed.stage {
                FailureStage::Transform => "ishlov",
                FailureStage::Publish => "joylash",
                FailureStage::Catalog => "mundarija",
            };
            text.push_str(&format!(
                "\n• {} ({}): {}",
                escape_html(&failed.name),
                stage,
                escape_html(&failed.reason)
            ));
        }
        if report.failed.len() > MAX_LISTED {
            text.push_str(&format!("\n… va yana {}", report.failed.len() - MAX_LISTED));
        }
    }
    text
}

/// HTML message about a scheduled job that just ran.
pub fn format_job_outcome(outcome: &JobOutcome, offset: FixedOffset) -> String {
    let header = format!(
        "⏰ Rejalashtirilgan joylash #{} ({}, {})",
        outcome.job.id,
        escape_html(&outcome.job.file_name),
        format_local(outcome.job.run_at, offset)
    );
    match &outcome.result {
        Ok(report) => format!("{}\n\n{}", header, format_report(report)),
        Err(e) => format!("{}\n\n❌ Bajarilmadi: {}", header, escape_html(e)),
    }
}

/// Forwards job outcomes to the admin who scheduled them until the scheduler stops.
pub fn spawn_outcome_notifier(bot: Bot, mut rx: mpsc::UnboundedReceiver<JobOutcome>, offset: FixedOffset) {
    tokio::spawn(async move {
        while let Some(outcome) = rx.recv().await {
            let chat_id = ChatId(outcome.job.created_by);
            let text = format_job_outcome(&outcome, offset);
            if let Err(e) = bot.send_message(chat_id, text).parse_mode(ParseMode::Html).await {
                log::error!("Failed to notify {} about job {}: {}", chat_id, outcome.job.id, e);
            }
        }
        log::info!("Job outcome channel closed");
    });
}
