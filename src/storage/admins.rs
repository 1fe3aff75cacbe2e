//! Secondary administrators. The owner is configured outside the database.

use rusqlite::{Connection, OptionalExtension, Result};

/// True for the owner, or for any user listed in the admins table.
pub fn is_admin(conn: &Connection, user_id: i64, owner_id: i64) -> Result<bool> {
    if user_id == owner_id {
        return Ok(true);
    }
    let found = conn
        .query_row("SELECT 1 FROM admins WHERE user_id = ?1", [user_id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Adds an admin. Returns false if the user was already an admin.
pub fn add_admin(conn: &Connection, user_id: i64) -> Result<bool> {
    let inserted = conn.execute("INSERT OR IGNORE INTO admins (user_id) VALUES (?1)", [user_id])?;
    Ok(inserted > 0)
}

/// All secondary admin ids, oldest first.
pub fn list_admins(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT user_id FROM admins ORDER BY added_at, user_id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::test_pool;

    const OWNER: i64 = 1001;

    #[test]
    fn test_owner_is_admin_with_empty_table() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        assert!(list_admins(&conn).unwrap().is_empty());
        assert!(is_admin(&conn, OWNER, OWNER).unwrap());
        assert!(!is_admin(&conn, 42, OWNER).unwrap());
    }

    #[test]
    fn test_added_admin_is_authorized() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        assert!(add_admin(&conn, 42).unwrap());
        assert!(!add_admin(&conn, 42).unwrap());
        assert!(is_admin(&conn, 42, OWNER).unwrap());
        assert_eq!(list_admins(&conn).unwrap(), vec![42]);
    }
}
