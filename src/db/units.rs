use super::Database;
use crate::error::{HubError, Result};
use crate::hashing::compute_source_hash;
use crate::qa::translation_qa_flags;
use crate::types::{StringUnit, TranslationStatus};
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

const UNIT_COLUMNS: &str = "id, location, message_id, source_text, source_updated_on, source_hash";

fn unit_from_row(row: &Row<'_>) -> rusqlite::Result<StringUnit> {
    Ok(StringUnit {
        id: row.get(0)?,
        location: row.get(1)?,
        message_id: row.get(2)?,
        source_text: row.get(3)?,
        source_updated_on: row.get(4)?,
        source_hash: row.get(5)?,
    })
}

impl Database {
    pub fn insert_string_unit(
        &self,
        location: &str,
        message_id: &str,
        source_text: &str,
        source_updated_on: &str,
    ) -> Result<StringUnit> {
        let source_hash = compute_source_hash(source_text);
        self.conn.execute(
            "INSERT INTO string_units
                (location, message_id, source_text, source_updated_on, source_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![location, message_id, source_text, source_updated_on, source_hash],
        )?;
        Ok(StringUnit {
            id: self.conn.last_insert_rowid(),
            location: location.to_string(),
            message_id: message_id.to_string(),
            source_text: source_text.to_string(),
            source_updated_on: source_updated_on.to_string(),
            source_hash,
        })
    }

    /// Persist a string unit, recomputing its source hash.
    ///
    /// When the hash changes, every translation with approved text becomes
    /// `STALE`, and QA flags of all its translations are recomputed against the
    /// new source. Returns how many translations were marked stale.
    pub fn save_string_unit(&self, unit: &mut StringUnit) -> Result<usize> {
        let new_hash = compute_source_hash(&unit.source_text);
        let old_hash: Option<String> = self
            .conn
            .query_row(
                "SELECT source_hash FROM string_units WHERE id = ?1",
                params![unit.id],
                |row| row.get(0),
            )
            .optional()?;
        let old_hash =
            old_hash.ok_or_else(|| HubError::NotFound(format!("string unit {}", unit.id)))?;

        unit.source_hash = new_hash;
        self.conn.execute(
            "UPDATE string_units
             SET location = ?2, message_id = ?3, source_text = ?4,
                 source_updated_on = ?5, source_hash = ?6
             WHERE id = ?1",
            params![
                unit.id,
                unit.location,
                unit.message_id,
                unit.source_text,
                unit.source_updated_on,
                unit.source_hash
            ],
        )?;

        if old_hash.is_empty() || old_hash == unit.source_hash {
            return Ok(0);
        }

        let mut stale = 0;
        for mut translation in self.translations_for_unit(unit.id)? {
            let approved = translation
                .approved_text
                .as_deref()
                .map_or(false, |t| !t.is_empty());
            let mut dirty = false;
            if approved && translation.status != TranslationStatus::Stale {
                translation.status = TranslationStatus::Stale;
                stale += 1;
                dirty = true;
            }
            let flags = translation_qa_flags(&unit.source_text, &translation);
            if flags != translation.qa_flags {
                translation.qa_flags = flags;
                dirty = true;
            }
            if dirty {
                self.update_status_and_qa(&translation)?;
            }
        }
        if stale > 0 {
            info!(unit = %unit, stale, "source changed; marked approved translations stale");
        }
        Ok(stale)
    }

    pub fn get_string_unit(&self, location: &str, message_id: &str) -> Result<Option<StringUnit>> {
        let sql = format!(
            "SELECT {UNIT_COLUMNS} FROM string_units WHERE location = ?1 AND message_id = ?2"
        );
        Ok(self
            .conn
            .query_row(&sql, params![location, message_id], unit_from_row)
            .optional()?)
    }

    pub fn get_string_unit_by_id(&self, id: i64) -> Result<Option<StringUnit>> {
        let sql = format!("SELECT {UNIT_COLUMNS} FROM string_units WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], unit_from_row)
            .optional()?)
    }

    /// All string units ordered by `(location, message_id)`.
    pub fn list_string_units(&self) -> Result<Vec<StringUnit>> {
        let sql = format!("SELECT {UNIT_COLUMNS} FROM string_units ORDER BY location, message_id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], unit_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_string_units(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM string_units", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
