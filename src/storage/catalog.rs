//! Catalog of published files
//!
//! Rows are written once, after a successful channel post, and only ever
//! removed in bulk by `clear_catalog`. Re-uploading the same file adds
//! another row; there is no uniqueness constraint on the name.

use rusqlite::{params, Connection, Result};
use serde::Serialize;

use crate::catalog::Category;

/// One published file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub id: i64,
    /// Branded file name shown to users
    pub display_name: String,
    pub category: Category,
    /// `https://t.me/<channel>/<message id>`
    pub link: String,
    /// Channel message carrying the file
    pub publish_message_id: i32,
}

/// Appends one catalog row and returns its id.
pub fn add_entry(conn: &Connection, name: &str, category: Category, link: &str, message_id: i32) -> Result<i64> {
    conn.execute(
        "INSERT INTO catalog (name, category, link, msg_id) VALUES (?1, ?2, ?3, ?4)",
        params![name, category.tag(), link, message_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All rows of a category, in insertion order.
pub fn get_by_category(conn: &Connection, category: Category) -> Result<Vec<CatalogEntry>> {
    let mut stmt = conn.prepare("SELECT id, name, link, msg_id FROM catalog WHERE category = ?1 ORDER BY id")?;
    let rows = stmt.query_map([category.tag()], |row| {
        Ok(CatalogEntry {
            id: row.get(0)?,
            display_name: row.get(1)?,
            category,
            link: row.get(2)?,
            publish_message_id: row.get(3)?,
        })
    })?;
    rows.collect()
}

/// Total number of catalog rows.
pub fn count_entries(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM catalog", [], |row| row.get(0))
}

/// Row count per category, in `Category::ALL` order. Unknown tags are ignored.
pub fn count_by_category(conn: &Connection) -> Result<Vec<(Category, i64)>> {
    let mut stmt = conn.prepare("SELECT category, COUNT(*) FROM catalog GROUP BY category")?;
    let counted = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>>>()?;

    Ok(Category::ALL
        .iter()
        .map(|cat| {
            let n = counted
                .iter()
                .find(|(tag, _)| tag == cat.tag())
                .map(|(_, n)| *n)
                .unwrap_or(0);
            (*cat, n)
        })
        .collect())
}

/// Deletes every catalog row. Settings and admins are untouched.
///
/// Returns the number of deleted rows.
pub fn clear_catalog(conn: &Connection) -> Result<usize> {
    conn.execute("DELETE FROM catalog", [])
}
