use super::Database;
use crate::error::Result;
use crate::types::{Locale, NewLocale};
use rusqlite::{params, OptionalExtension, Row};

const LOCALE_COLUMNS: &str = "id, code, bcp47, name, script, is_rtl, enabled, legacy_column";

fn locale_from_row(row: &Row<'_>) -> rusqlite::Result<Locale> {
    Ok(Locale {
        id: row.get(0)?,
        code: row.get(1)?,
        bcp47: row.get(2)?,
        name: row.get(3)?,
        script: row.get(4)?,
        is_rtl: row.get(5)?,
        enabled: row.get(6)?,
        legacy_column: row.get(7)?,
    })
}

/// Listing filters for locales.
#[derive(Debug, Clone, Default)]
pub struct LocaleFilter {
    pub enabled_only: bool,
    /// Case-insensitive substring over code, bcp47, name and legacy column.
    pub search: Option<String>,
}

impl Database {
    pub fn insert_locale(&self, new: &NewLocale) -> Result<Locale> {
        self.conn.execute(
            "INSERT INTO locales (code, bcp47, name, script, is_rtl, enabled, legacy_column)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.code,
                new.bcp47,
                new.name,
                new.script,
                new.is_rtl,
                new.enabled,
                new.legacy_column
            ],
        )?;
        Ok(Locale {
            id: self.conn.last_insert_rowid(),
            code: new.code.clone(),
            bcp47: new.bcp47.clone(),
            name: new.name.clone(),
            script: new.script.clone(),
            is_rtl: new.is_rtl,
            enabled: new.enabled,
            legacy_column: new.legacy_column.clone(),
        })
    }

    pub fn update_locale(&self, locale: &Locale) -> Result<()> {
        self.conn.execute(
            "UPDATE locales SET code = ?2, bcp47 = ?3, name = ?4, script = ?5, is_rtl = ?6,
                enabled = ?7, legacy_column = ?8
             WHERE id = ?1",
            params![
                locale.id,
                locale.code,
                locale.bcp47,
                locale.name,
                locale.script,
                locale.is_rtl,
                locale.enabled,
                locale.legacy_column
            ],
        )?;
        Ok(())
    }

    pub fn get_locale_by_code(&self, code: &str) -> Result<Option<Locale>> {
        let sql = format!("SELECT {LOCALE_COLUMNS} FROM locales WHERE code = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![code], locale_from_row)
            .optional()?)
    }

    pub fn get_locale(&self, id: i64) -> Result<Option<Locale>> {
        let sql = format!("SELECT {LOCALE_COLUMNS} FROM locales WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], locale_from_row)
            .optional()?)
    }

    /// Locales ordered by code.
    pub fn list_locales(&self, filter: &LocaleFilter) -> Result<Vec<Locale>> {
        let sql = format!(
            "SELECT {LOCALE_COLUMNS} FROM locales
             WHERE (?1 = 0 OR enabled = 1)
               AND (?2 IS NULL
                    OR instr(lower(code), ?2) > 0
                    OR instr(lower(bcp47), ?2) > 0
                    OR instr(lower(name), ?2) > 0
                    OR instr(lower(coalesce(legacy_column, '')), ?2) > 0)
             ORDER BY code"
        );
        let search = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![filter.enabled_only, search], locale_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_locales(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM locales", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
