use super::{parse_column, parse_timestamp, timestamp, Database};
use crate::error::{HubError, Result};
use crate::qa::{translation_qa_flags, QaFlag};
use crate::types::{NewTranslation, Provenance, Translation, TranslationRow, TranslationStatus};
use chrono::Utc;
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tracing::debug;

const TRANSLATION_COLUMNS: &str = "t.id, t.string_unit_id, t.locale_id, t.approved_text, \
     t.reviewer_text, t.machine_draft, t.status, t.provenance, t.source_hash_at_last_update, \
     t.reviewer_id, t.qa_flags, t.created_at, t.updated_at";

fn translation_from_row(row: &Row<'_>) -> rusqlite::Result<Translation> {
    let status: String = row.get(6)?;
    let provenance: String = row.get(7)?;
    let qa_flags: String = row.get(10)?;
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;

    Ok(Translation {
        id: row.get(0)?,
        string_unit_id: row.get(1)?,
        locale_id: row.get(2)?,
        approved_text: row.get(3)?,
        reviewer_text: row.get(4)?,
        machine_draft: row.get(5)?,
        status: parse_column::<TranslationStatus>(6, &status)?,
        provenance: parse_column::<Provenance>(7, &provenance)?,
        source_hash_at_last_update: row.get(8)?,
        reviewer_id: row.get(9)?,
        qa_flags: serde_json::from_str::<Vec<QaFlag>>(&qa_flags)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?,
        created_at: parse_timestamp(11, &created_at)?,
        updated_at: parse_timestamp(12, &updated_at)?,
    })
}

fn translation_row_from_row(row: &Row<'_>) -> rusqlite::Result<TranslationRow> {
    Ok(TranslationRow {
        translation: translation_from_row(row)?,
        locale_code: row.get(13)?,
        location: row.get(14)?,
        message_id: row.get(15)?,
        source_text: row.get(16)?,
        source_hash: row.get(17)?,
    })
}

/// Listing filters for translations. `None` means "no restriction".
#[derive(Debug, Clone, Default)]
pub struct TranslationFilter {
    /// Restrict to these locales (role scoping). An empty list matches nothing.
    pub locale_ids: Option<Vec<i64>>,
    /// Restrict to these translation ids (action selections).
    pub ids: Option<Vec<i64>>,
    pub locale_code: Option<String>,
    pub status: Option<TranslationStatus>,
    pub provenance: Option<Provenance>,
    pub has_qa_warnings: Option<bool>,
    /// Case-insensitive substring over location, message id, source and all translation texts.
    pub search: Option<String>,
}

fn in_clause(column: &str, values: &[i64], args: &mut Vec<Box<dyn ToSql>>) -> String {
    if values.is_empty() {
        return "0".to_string();
    }
    let placeholders: Vec<String> = values
        .iter()
        .map(|v| {
            args.push(Box::new(*v));
            format!("?{}", args.len())
        })
        .collect();
    format!("{column} IN ({})", placeholders.join(", "))
}

impl TranslationFilter {
    fn where_clause(&self, args: &mut Vec<Box<dyn ToSql>>) -> String {
        let mut clauses: Vec<String> = Vec::new();

        if let Some(locale_ids) = &self.locale_ids {
            clauses.push(in_clause("t.locale_id", locale_ids, args));
        }
        if let Some(ids) = &self.ids {
            clauses.push(in_clause("t.id", ids, args));
        }
        if let Some(code) = &self.locale_code {
            args.push(Box::new(code.clone()));
            clauses.push(format!("l.code = ?{}", args.len()));
        }
        if let Some(status) = self.status {
            args.push(Box::new(status.as_str()));
            clauses.push(format!("t.status = ?{}", args.len()));
        }
        if let Some(provenance) = self.provenance {
            args.push(Box::new(provenance.as_str()));
            clauses.push(format!("t.provenance = ?{}", args.len()));
        }
        match self.has_qa_warnings {
            Some(true) => clauses.push("t.qa_flags <> '[]'".to_string()),
            Some(false) => clauses.push("t.qa_flags = '[]'".to_string()),
            None => {}
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            args.push(Box::new(search.to_lowercase()));
            let n = args.len();
            clauses.push(format!(
                "(instr(lower(s.location), ?{n}) > 0
                  OR instr(lower(s.message_id), ?{n}) > 0
                  OR instr(lower(s.source_text), ?{n}) > 0
                  OR instr(lower(coalesce(t.approved_text, '')), ?{n}) > 0
                  OR instr(lower(coalesce(t.reviewer_text, '')), ?{n}) > 0
                  OR instr(lower(coalesce(t.machine_draft, '')), ?{n}) > 0)"
            ));
        }

        if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        }
    }
}

impl Database {
    pub fn insert_translation(&self, new: &NewTranslation) -> Result<Translation> {
        let unit = self
            .get_string_unit_by_id(new.string_unit_id)?
            .ok_or_else(|| HubError::NotFound(format!("string unit {}", new.string_unit_id)))?;

        let now = Utc::now();
        let mut translation = Translation {
            id: 0,
            string_unit_id: new.string_unit_id,
            locale_id: new.locale_id,
            approved_text: new.approved_text.clone(),
            reviewer_text: new.reviewer_text.clone(),
            machine_draft: new.machine_draft.clone(),
            status: new.status,
            provenance: new.provenance,
            source_hash_at_last_update: new.source_hash_at_last_update.clone(),
            reviewer_id: new.reviewer_id,
            qa_flags: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        translation.qa_flags = translation_qa_flags(&unit.source_text, &translation);

        self.conn.execute(
            "INSERT INTO translations (string_unit_id, locale_id, approved_text, reviewer_text,
                machine_draft, status, provenance, source_hash_at_last_update, reviewer_id,
                qa_flags, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                translation.string_unit_id,
                translation.locale_id,
                translation.approved_text,
                translation.reviewer_text,
                translation.machine_draft,
                translation.status.as_str(),
                translation.provenance.as_str(),
                translation.source_hash_at_last_update,
                translation.reviewer_id,
                serde_json::to_string(&translation.qa_flags)?,
                timestamp(&translation.created_at),
                timestamp(&translation.updated_at),
            ],
        )?;
        translation.id = self.conn.last_insert_rowid();
        Ok(translation)
    }

    /// Persist every field of `translation`, refreshing `updated_at` and its QA flags.
    pub fn save_translation(&self, translation: &mut Translation) -> Result<()> {
        let unit = self
            .get_string_unit_by_id(translation.string_unit_id)?
            .ok_or_else(|| {
                HubError::NotFound(format!("string unit {}", translation.string_unit_id))
            })?;
        self.save_translation_with_source(translation, &unit.source_text)
    }

    pub(crate) fn save_translation_with_source(
        &self,
        translation: &mut Translation,
        source_text: &str,
    ) -> Result<()> {
        translation.qa_flags = translation_qa_flags(source_text, translation);
        translation.updated_at = Utc::now();

        let changed = self.conn.execute(
            "UPDATE translations
             SET string_unit_id = ?2, locale_id = ?3, approved_text = ?4, reviewer_text = ?5,
                 machine_draft = ?6, status = ?7, provenance = ?8, source_hash_at_last_update = ?9,
                 reviewer_id = ?10, qa_flags = ?11, updated_at = ?12
             WHERE id = ?1",
            params![
                translation.id,
                translation.string_unit_id,
                translation.locale_id,
                translation.approved_text,
                translation.reviewer_text,
                translation.machine_draft,
                translation.status.as_str(),
                translation.provenance.as_str(),
                translation.source_hash_at_last_update,
                translation.reviewer_id,
                serde_json::to_string(&translation.qa_flags)?,
                timestamp(&translation.updated_at),
            ],
        )?;
        if changed == 0 {
            return Err(HubError::NotFound(format!("translation {}", translation.id)));
        }
        debug!(id = translation.id, status = %translation.status, "saved translation");
        Ok(())
    }

    /// Write only `status` and `qa_flags`; `updated_at` keeps its value.
    pub(crate) fn update_status_and_qa(&self, translation: &Translation) -> Result<()> {
        self.conn.execute(
            "UPDATE translations SET status = ?2, qa_flags = ?3 WHERE id = ?1",
            params![
                translation.id,
                translation.status.as_str(),
                serde_json::to_string(&translation.qa_flags)?,
            ],
        )?;
        Ok(())
    }

    pub fn get_translation(&self, id: i64) -> Result<Option<Translation>> {
        let sql = format!("SELECT {TRANSLATION_COLUMNS} FROM translations t WHERE t.id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], translation_from_row)
            .optional()?)
    }

    pub fn get_translation_for(
        &self,
        string_unit_id: i64,
        locale_id: i64,
    ) -> Result<Option<Translation>> {
        let sql = format!(
            "SELECT {TRANSLATION_COLUMNS} FROM translations t
             WHERE t.string_unit_id = ?1 AND t.locale_id = ?2"
        );
        Ok(self
            .conn
            .query_row(&sql, params![string_unit_id, locale_id], translation_from_row)
            .optional()?)
    }

    pub fn translations_for_unit(&self, string_unit_id: i64) -> Result<Vec<Translation>> {
        let sql = format!(
            "SELECT {TRANSLATION_COLUMNS} FROM translations t
             WHERE t.string_unit_id = ?1 ORDER BY t.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![string_unit_id], translation_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn translations_for_locale(&self, locale_id: i64) -> Result<Vec<Translation>> {
        let sql =
            format!("SELECT {TRANSLATION_COLUMNS} FROM translations t WHERE t.locale_id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![locale_id], translation_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Translations joined with locale and string unit, ordered by
    /// `(locale code, location, message_id)`.
    pub fn list_translations(&self, filter: &TranslationFilter) -> Result<Vec<TranslationRow>> {
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();
        let where_clause = filter.where_clause(&mut args);
        let sql = format!(
            "SELECT {TRANSLATION_COLUMNS},
                l.code, s.location, s.message_id, s.source_text, s.source_hash
             FROM translations t
             JOIN locales l ON l.id = t.locale_id
             JOIN string_units s ON s.id = t.string_unit_id
             {where_clause}
             ORDER BY l.code, s.location, s.message_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), translation_row_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_translations(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM translations", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qa::QaCode;
    use crate::types::NewLocale;

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    #[test]
    fn one_translation_per_unit_and_locale() {
        let db = db();
        let fr = db.insert_locale(&NewLocale::new("fr", "fr", "French")).unwrap();
        let unit = db.insert_string_unit("ui", "hello", "Hello", "").unwrap();
        db.insert_translation(&NewTranslation::new(unit.id, fr.id)).unwrap();
        assert!(db.insert_translation(&NewTranslation::new(unit.id, fr.id)).is_err());
    }

    #[test]
    fn save_refreshes_qa_flags_and_timestamp() {
        let db = db();
        let fr = db.insert_locale(&NewLocale::new("fr", "fr", "French")).unwrap();
        let unit = db.insert_string_unit("ui", "hello", "Hello {0}", "").unwrap();
        let mut new = NewTranslation::new(unit.id, fr.id);
        new.reviewer_text = Some("Bonjour".to_string());
        let mut t = db.insert_translation(&new).unwrap();
        assert!(t.qa_flags.iter().any(|f| f.code == QaCode::MissingPlaceholder));

        let before = t.updated_at;
        t.reviewer_text = Some("Bonjour {0}".to_string());
        db.save_translation(&mut t).unwrap();

        let stored = db.get_translation(t.id).unwrap().unwrap();
        assert!(stored.qa_flags.is_empty());
        assert!(stored.updated_at >= before);
        assert_eq!(stored.created_at.timestamp_micros(), t.created_at.timestamp_micros());
    }

    #[test]
    fn empty_translation_is_flagged_only_when_approved() {
        let db = db();
        let fr = db.insert_locale(&NewLocale::new("fr", "fr", "French")).unwrap();
        let unit = db.insert_string_unit("ui", "hello", "Hello", "").unwrap();
        let is_empty =
            |t: &Translation| t.qa_flags.iter().any(|f| f.code == QaCode::EmptyTranslation);

        let mut t = db.insert_translation(&NewTranslation::new(unit.id, fr.id)).unwrap();
        assert_eq!(t.status, TranslationStatus::InReview);
        assert!(!is_empty(&t));

        t.status = TranslationStatus::Approved;
        db.save_translation(&mut t).unwrap();
        assert!(is_empty(&db.get_translation(t.id).unwrap().unwrap()));

        t.status = TranslationStatus::Stale;
        db.save_translation(&mut t).unwrap();
        assert!(!is_empty(&db.get_translation(t.id).unwrap().unwrap()));
    }

    #[test]
    fn filters_combine() {
        let db = db();
        let fr = db.insert_locale(&NewLocale::new("fr", "fr", "French")).unwrap();
        let de = db.insert_locale(&NewLocale::new("de", "de", "German")).unwrap();
        let hello = db.insert_string_unit("ui", "hello", "Hello {0}", "").unwrap();
        let bye = db.insert_string_unit("ui", "bye", "Bye", "").unwrap();

        let mut t = NewTranslation::new(hello.id, fr.id);
        t.reviewer_text = Some("Bonjour".to_string());
        db.insert_translation(&t).unwrap();
        let mut t = NewTranslation::new(bye.id, fr.id);
        t.approved_text = Some("Au revoir".to_string());
        t.status = TranslationStatus::Approved;
        db.insert_translation(&t).unwrap();
        db.insert_translation(&NewTranslation::new(hello.id, de.id)).unwrap();

        let all = db.list_translations(&TranslationFilter::default()).unwrap();
        let keys: Vec<(String, String)> = all
            .iter()
            .map(|r| (r.locale_code.clone(), r.message_id.clone()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("de".to_string(), "hello".to_string()),
                ("fr".to_string(), "bye".to_string()),
                ("fr".to_string(), "hello".to_string()),
            ]
        );

        let scoped = db
            .list_translations(&TranslationFilter {
                locale_ids: Some(vec![fr.id]),
                status: Some(TranslationStatus::Approved),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].message_id, "bye");

        let warned = db
            .list_translations(&TranslationFilter {
                has_qa_warnings: Some(true),
                ..Default::default()
            })
            .unwrap();
        // The blank German row is missing `{0}` too.
        assert_eq!(warned.len(), 2);
        assert!(warned.iter().all(|r| r.message_id == "hello"));

        let searched = db
            .list_translations(&TranslationFilter {
                search: Some("REVOIR".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(searched.len(), 1);

        let none = db
            .list_translations(&TranslationFilter {
                locale_ids: Some(Vec::new()),
                ..Default::default()
            })
            .unwrap();
        assert!(none.is_empty());
    }
}
