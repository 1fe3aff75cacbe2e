//! Publish journal
//!
//! Every channel post goes through `sending → sent → cataloged` (or
//! `sending → failed`). The catalog row and the `cataloged` mark are written
//! in one transaction, so a crash between the post and the catalog write
//! leaves a `sent` row that startup reconciliation can finish.

use rusqlite::{params, Connection, Result, Row};
use strum::{Display, EnumString, IntoStaticStr};

use crate::catalog::Category;
use crate::storage::catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum JournalStatus {
    Sending,
    Sent,
    Cataloged,
    Failed,
    /// Found `sending` at startup: the post may or may not exist
    Unknown,
}

impl JournalStatus {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub id: i64,
    pub display_name: String,
    /// Storage tag of the category
    pub category: String,
    pub status: JournalStatus,
    pub message_id: Option<i32>,
    pub link: Option<String>,
    pub error: Option<String>,
}

const JOURNAL_COLUMNS: &str = "id, display_name, category, status, message_id, link, error";

fn entry_from_row(row: &Row<'_>) -> Result<JournalEntry> {
    let raw: String = row.get(3)?;
    let status = raw
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(JournalEntry {
        id: row.get(0)?,
        display_name: row.get(1)?,
        category: row.get(2)?,
        status,
        message_id: row.get(4)?,
        link: row.get(5)?,
        error: row.get(6)?,
    })
}

fn set_status(conn: &Connection, id: i64, status: JournalStatus) -> Result<()> {
    conn.execute(
        "UPDATE publish_journal SET status = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
        params![id, status.as_str()],
    )?;
    Ok(())
}

/// Opens a journal row before the post is attempted.
pub fn begin(conn: &Connection, display_name: &str, category: Category) -> Result<i64> {
    conn.execute(
        "INSERT INTO publish_journal (display_name, category, status) VALUES (?1, ?2, 'sending')",
        params![display_name, category.tag()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// The channel accepted the post.
pub fn mark_sent(conn: &Connection, id: i64, message_id: i32, link: &str) -> Result<()> {
    conn.execute(
        "UPDATE publish_journal SET status = 'sent', message_id = ?2, link = ?3, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?1",
        params![id, message_id, link],
    )?;
    Ok(())
}

/// The post failed; no catalog row will be written.
pub fn mark_failed(conn: &Connection, id: i64, error: &str) -> Result<()> {
    conn.execute(
        "UPDATE publish_journal SET status = 'failed', error = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
        params![id, error],
    )?;
    Ok(())
}

/// Writes the catalog row for a sent post and closes its journal row, atomically.
///
/// Returns the catalog id.
pub fn commit_catalog(
    conn: &mut Connection,
    journal_id: i64,
    display_name: &str,
    category: Category,
    link: &str,
    message_id: i32,
) -> Result<i64> {
    let tx = conn.transaction()?;
    let catalog_id = catalog::add_entry(&tx, display_name, category, link, message_id)?;
    set_status(&tx, journal_id, JournalStatus::Cataloged)?;
    tx.commit()?;
    Ok(catalog_id)
}

/// Rows with the given status, oldest first.
pub fn entries_with_status(conn: &Connection, status: JournalStatus) -> Result<Vec<JournalEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM publish_journal WHERE status = ?1 ORDER BY id",
        JOURNAL_COLUMNS
    ))?;
    let rows = stmt.query_map([status.as_str()], entry_from_row)?;
    rows.collect()
}

/// Moves every `sending` row to `unknown`. Returns the affected rows.
pub fn mark_stale_sending(conn: &Connection) -> Result<Vec<JournalEntry>> {
    let stale = entries_with_status(conn, JournalStatus::Sending)?;
    for entry in &stale {
        set_status(conn, entry.id, JournalStatus::Unknown)?;
    }
    Ok(stale)
}
