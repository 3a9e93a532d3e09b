//! Sqlite-backed settings persistence.

use std::path::Path;

use anyhow::Context as _;
use rusqlite::{Connection, OptionalExtension as _};
use twinshelf_core::{Endpoints, Settings, Theme};

#[derive(Debug)]
pub struct Storage {
    conn: Connection,
}

/// Columns added after the first schema, applied in order.
const ADDED_COLUMNS: &[(&str, &str)] = &[
    ("endpoints_json", "TEXT NOT NULL DEFAULT '{}'"),
    ("first_owner", "TEXT NOT NULL DEFAULT 'Brooke'"),
    ("second_owner", "TEXT NOT NULL DEFAULT 'Crystal'"),
    ("first_key", "TEXT NOT NULL DEFAULT 'brookes'"),
    ("second_key", "TEXT NOT NULL DEFAULT 'crystals'"),
    ("picker_step_ms", "INTEGER NOT NULL DEFAULT 100"),
    ("picker_cycle_ms", "INTEGER NOT NULL DEFAULT 3000"),
    ("toast_ms", "INTEGER NOT NULL DEFAULT 5000"),
    ("request_timeout_secs", "INTEGER NOT NULL DEFAULT 15"),
];

type SettingsRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    i64,
    i64,
    i64,
);

impl Storage {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("open sqlite db at {}", path.as_ref().display()))?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    fn migrate(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                api_base_url TEXT NOT NULL,
                theme TEXT NOT NULL
            );
            INSERT OR IGNORE INTO settings (id, api_base_url, theme)
            VALUES (1, 'http://127.0.0.1:8080/Production', 'dark');
            "#,
        )?;

        for (name, definition) in ADDED_COLUMNS {
            self.add_column(name, definition)?;
        }
        Ok(())
    }

    fn add_column(&self, name: &str, definition: &str) -> anyhow::Result<()> {
        let sql = format!("ALTER TABLE settings ADD COLUMN {name} {definition}");
        match self.conn.execute(&sql, []) {
            Ok(_) => Ok(()),
            Err(err) => {
                if err.to_string().contains("duplicate column name") {
                    Ok(())
                } else {
                    Err(err).with_context(|| format!("add settings.{name} column"))
                }
            }
        }
    }

    pub fn load_settings(&self) -> anyhow::Result<Settings> {
        let row: Option<SettingsRow> = self
            .conn
            .query_row(
                r#"
                SELECT api_base_url, theme, endpoints_json, first_owner, second_owner,
                       first_key, second_key, picker_step_ms, picker_cycle_ms,
                       toast_ms, request_timeout_secs
                FROM settings WHERE id = 1
                "#,
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                        row.get(9)?,
                        row.get(10)?,
                    ))
                },
            )
            .optional()
            .context("read settings row")?;

        let Some((
            api_base_url,
            theme,
            endpoints_json,
            first_owner,
            second_owner,
            first_key,
            second_key,
            picker_step_ms,
            picker_cycle_ms,
            toast_ms,
            request_timeout_secs,
        )) = row
        else {
            return Ok(Settings::default());
        };

        let defaults = Settings::default();
        let mut settings = Settings {
            api_base_url,
            endpoints: serde_json::from_str::<Endpoints>(&endpoints_json).unwrap_or_default(),
            first_owner,
            second_owner,
            first_key,
            second_key,
            theme: theme.parse::<Theme>().unwrap_or(defaults.theme),
            picker_step_ms: u64::try_from(picker_step_ms).unwrap_or(defaults.picker_step_ms),
            picker_cycle_ms: u64::try_from(picker_cycle_ms).unwrap_or(defaults.picker_cycle_ms),
            toast_ms: u64::try_from(toast_ms).unwrap_or(defaults.toast_ms),
            request_timeout_secs: u64::try_from(request_timeout_secs)
                .unwrap_or(defaults.request_timeout_secs),
        };
        settings.normalize();
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        let mut settings = settings.clone();
        settings.normalize();
        let endpoints_json = serde_json::to_string(&settings.endpoints)?;

        self.conn
            .execute(
                r#"
                UPDATE settings SET api_base_url = ?, theme = ?, endpoints_json = ?,
                    first_owner = ?, second_owner = ?, first_key = ?, second_key = ?,
                    picker_step_ms = ?, picker_cycle_ms = ?, toast_ms = ?,
                    request_timeout_secs = ?
                WHERE id = 1
                "#,
                rusqlite::params![
                    settings.api_base_url,
                    settings.theme.as_str(),
                    endpoints_json,
                    settings.first_owner,
                    settings.second_owner,
                    settings.first_key,
                    settings.second_key,
                    settings.picker_step_ms as i64,
                    settings.picker_cycle_ms as i64,
                    settings.toast_ms as i64,
                    settings.request_timeout_secs as i64,
                ],
            )
            .context("write settings row")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_in_memory() -> anyhow::Result<Storage> {
        let conn = Connection::open_in_memory()?;
        let storage = Storage { conn };
        storage.migrate()?;
        Ok(storage)
    }

    #[test]
    fn fresh_db_yields_defaults() -> anyhow::Result<()> {
        let storage = open_in_memory()?;
        assert_eq!(storage.load_settings()?, Settings::default());
        Ok(())
    }

    #[test]
    fn settings_roundtrip() -> anyhow::Result<()> {
        let storage = open_in_memory()?;
        let mut settings = storage.load_settings()?;
        settings.api_base_url = "https://books.example.com/Production/".to_string();
        settings.theme = Theme::Light;
        settings.endpoints.delete = "removeBook".to_string();
        settings.second_owner = "Sam".to_string();
        settings.picker_step_ms = 50;
        settings.toast_ms = 8_000;
        storage.save_settings(&settings)?;

        let loaded = storage.load_settings()?;
        assert_eq!(loaded.api_base_url, "https://books.example.com/Production");
        assert_eq!(loaded.theme, Theme::Light);
        assert_eq!(loaded.endpoints.delete, "removeBook");
        assert_eq!(loaded.endpoints.add, "AddBookFunction");
        assert_eq!(loaded.second_owner, "Sam");
        assert_eq!(loaded.picker_step_ms, 50);
        assert_eq!(loaded.toast_ms, 8_000);
        Ok(())
    }

    #[test]
    fn upgrades_first_schema_in_place() -> anyhow::Result<()> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            r#"
            CREATE TABLE settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                api_base_url TEXT NOT NULL,
                theme TEXT NOT NULL
            );
            INSERT INTO settings (id, api_base_url, theme)
            VALUES (1, 'http://old.example.com', 'light');
            "#,
        )?;
        let storage = Storage { conn };
        storage.migrate()?;
        storage.migrate()?;

        let settings = storage.load_settings()?;
        assert_eq!(settings.api_base_url, "http://old.example.com");
        assert_eq!(settings.theme, Theme::Light);
        assert_eq!(settings.endpoints, Endpoints::default());
        assert_eq!(settings.picker_cycle_ms, 3_000);
        Ok(())
    }

    #[test]
    fn out_of_range_values_are_clamped_on_load() -> anyhow::Result<()> {
        let storage = open_in_memory()?;
        storage.conn.execute(
            "UPDATE settings SET picker_step_ms = 1, toast_ms = -4, theme = 'neon' WHERE id = 1",
            [],
        )?;
        let settings = storage.load_settings()?;
        assert_eq!(settings.picker_step_ms, 20);
        assert_eq!(settings.toast_ms, 5_000);
        assert_eq!(settings.theme, Theme::Dark);
        Ok(())
    }
}
