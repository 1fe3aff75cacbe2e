//! Key/value settings: caption template, footer, catalog header, quarter label

use rusqlite::{params, Connection, OptionalExtension, Result};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Known setting keys. Defaults are seeded by the first migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SettingKey {
    /// Current academic period label, e.g. `2-CHORAK`
    Quarter,
    /// Channel post caption with `{name}` and `{channel}` placeholders
    PostCaption,
    /// Appended to every caption
    FooterText,
    /// Catalog message header with a `{quarter}` placeholder
    CatalogHeader,
    /// Banner stamped into documents, with a `{channel}` placeholder
    WatermarkText,
}

impl SettingKey {
    /// Storage key, e.g. `post_caption`
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Short Uzbek description for the `/settings` listing
    pub fn describe(&self) -> &'static str {
        match self {
            SettingKey::Quarter => "joriy chorak",
            SettingKey::PostCaption => "post matni ({name}, {channel})",
            SettingKey::FooterText => "post oxiridagi matn",
            SettingKey::CatalogHeader => "mundarija sarlavhasi ({quarter})",
            SettingKey::WatermarkText => "hujjatlarga muhr matni ({channel})",
        }
    }
}

/// Reads a setting; a missing key yields an empty string.
pub fn get_setting(conn: &Connection, key: SettingKey) -> Result<String> {
    let value = conn
        .query_row("SELECT value FROM settings WHERE key = ?1", [key.as_str()], |row| {
            row.get::<_, String>(0)
        })
        .optional()?;
    Ok(value.unwrap_or_default())
}

/// Writes a setting. Setting the same value twice is a no-op.
pub fn set_setting(conn: &Connection, key: SettingKey, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key.as_str(), value],
    )?;
    Ok(())
}

/// Every known setting with its current value, in declaration order.
pub fn all_settings(conn: &Connection) -> Result<Vec<(SettingKey, String)>> {
    SettingKey::iter()
        .map(|key| get_setting(conn, key).map(|value| (key, value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::test_pool;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn test_defaults_are_seeded() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        assert_eq!(get_setting(&conn, SettingKey::Quarter).unwrap(), "1-CHORAK");
        assert_eq!(
            get_setting(&conn, SettingKey::PostCaption).unwrap(),
            "📚 <b>{name}</b>\n\n✅ Kanal: @{channel}"
        );
        assert_eq!(
            get_setting(&conn, SettingKey::FooterText).unwrap(),
            "\n\n📩 Murojaat: @admin_user"
        );
        assert_eq!(get_setting(&conn, SettingKey::WatermarkText).unwrap(), "@{channel}");
    }

    #[test]
    fn test_missing_key_reads_empty() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();
        conn.execute("DELETE FROM settings WHERE key = 'footer_text'", []).unwrap();

        assert_eq!(get_setting(&conn, SettingKey::FooterText).unwrap(), "");
    }

    #[test]
    fn test_set_is_idempotent() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        set_setting(&conn, SettingKey::Quarter, "3-CHORAK").unwrap();
        set_setting(&conn, SettingKey::Quarter, "3-CHORAK").unwrap();

        assert_eq!(get_setting(&conn, SettingKey::Quarter).unwrap(), "3-CHORAK");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM settings WHERE key = 'quarter'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_key_names_match_storage() {
        assert_eq!(SettingKey::PostCaption.as_str(), "post_caption");
        assert_eq!(SettingKey::from_str("catalog_header").unwrap(), SettingKey::CatalogHeader);
        assert!(SettingKey::from_str("bot_token").is_err());
    }

    #[test]
    fn test_all_settings_lists_every_key() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();

        let all = all_settings(&conn).unwrap();
        assert_eq!(all.len(), SettingKey::iter().count());
        assert_eq!(all[0], (SettingKey::Quarter, "1-CHORAK".to_string()));
    }
}
