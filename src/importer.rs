//! `import-voyant-csv`: load the upstream Voyant spreadsheet into the store.
//!
//! Each locale column becomes (or backfills) a [`Locale`], each row a
//! [`StringUnit`], and every non-blank cell an `APPROVED` / `IMPORTED`
//! translation. Re-importing the same file changes nothing.

use crate::db::Database;
use crate::error::{HubError, Result};
use crate::metrics::ImportMetrics;
use crate::types::{Locale, NewLocale, NewTranslation, Provenance, StringUnit, TranslationStatus};
use csv::{ReaderBuilder, StringRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Header codes whose locales are written right to left.
const RTL_LEGACY_COLUMNS: &[&str] = &["ar", "fa", "ur", "he"];

const COMMON_LOCALE_NAMES: &[(&str, &str)] = &[
    ("en", "English"),
    ("fr", "French"),
    ("de", "German"),
    ("es", "Spanish"),
    ("pt", "Portuguese"),
    ("it", "Italian"),
    ("hi", "Hindi"),
    ("yo", "Yoruba"),
    ("ar", "Arabic"),
    ("fa", "Persian"),
    ("ur", "Urdu"),
    ("he", "Hebrew"),
    ("cs", "Czech"),
    ("zh-hans", "Chinese (Simplified)"),
];

static TRAILING_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^()]+)\)\s*$").expect("valid regex"));
static NON_CODE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9-]+").expect("valid regex"));
static DASH_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("valid regex"));

/// Locale code carried by a column header: `"French (fr)"` gives `fr`, a bare
/// `"fr"` is returned as is.
pub fn extract_locale_code(header: &str) -> String {
    let raw = header.trim();
    match TRAILING_CODE.captures(raw) {
        Some(caps) => caps[1].trim().to_string(),
        None => raw.to_string(),
    }
}

/// Slug form of a legacy code: lowercase, `_`/space to `-`, other runs of
/// invalid characters to a single dash, no leading or trailing dashes.
pub fn normalize_code(raw: &str) -> String {
    let code = raw.trim().to_lowercase().replace(['_', ' '], "-");
    let code = NON_CODE_CHARS.replace_all(&code, "-");
    let code = DASH_RUNS.replace_all(&code, "-");
    code.trim_matches('-').to_string()
}

/// Where a legacy header code lands in the locale table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleTarget {
    pub code: String,
    pub bcp47: String,
    pub name: String,
    pub is_rtl: bool,
}

pub fn locale_target(legacy_column: &str) -> Result<LocaleTarget> {
    let legacy = legacy_column.trim();
    if legacy.is_empty() {
        return Err(HubError::command(
            "Encountered an empty locale column name in CSV header.",
        ));
    }
    let lower = legacy.to_lowercase();

    let (code, bcp47) = match lower.as_str() {
        "zh" => ("zh-hans".to_string(), "zh-Hans".to_string()),
        "cz" => ("cs".to_string(), "cs".to_string()),
        _ => {
            let code = normalize_code(legacy);
            if code.is_empty() {
                return Err(HubError::command(format!(
                    "Invalid locale column name: {legacy_column:?}"
                )));
            }
            (code.clone(), code)
        }
    };

    let name = COMMON_LOCALE_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, n)| n.to_string())
        .unwrap_or_else(|| code.to_uppercase());

    Ok(LocaleTarget {
        is_rtl: RTL_LEGACY_COLUMNS.contains(&lower.as_str()),
        code,
        bcp47,
        name,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleColumn {
    pub index: usize,
    pub header: String,
    pub legacy_code: String,
}

/// Resolved positions of the required columns plus every locale column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub location: usize,
    pub id: usize,
    pub en: usize,
    pub est: usize,
    pub locales: Vec<LocaleColumn>,
}

/// Resolve required columns (case-insensitive) from trimmed header names.
pub fn resolve_columns(headers: &[String]) -> Result<ColumnMap> {
    let by_lower: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect();

    let required = |name: &str| {
        by_lower
            .get(name)
            .copied()
            .ok_or_else(|| HubError::command("CSV missing required columns: Location, ID, est"))
    };
    let location = required("location")?;
    let id = required("id")?;
    let est = required("est")?;

    let en = by_lower
        .get("en")
        .copied()
        .or_else(|| {
            headers
                .iter()
                .position(|h| extract_locale_code(h).to_lowercase() == "en")
        })
        .ok_or_else(|| {
            HubError::command(
                "CSV missing required English column: \
                 expected 'en' or a header like 'English (en)'.",
            )
        })?;

    let locales = headers
        .iter()
        .enumerate()
        .filter(|(i, h)| !h.is_empty() && ![location, id, en, est].contains(i))
        .map(|(index, header)| LocaleColumn {
            index,
            header: header.clone(),
            legacy_code: extract_locale_code(header),
        })
        .collect();

    Ok(ColumnMap {
        location,
        id,
        en,
        est,
        locales,
    })
}

fn open_reader(path: &Path) -> Result<(csv::Reader<std::fs::File>, Vec<String>)> {
    if !path.is_file() {
        return Err(HubError::command(format!(
            "CSV file not found: {}",
            path.display()
        )));
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(HubError::command("CSV has no header row."));
    }
    Ok((reader, headers))
}

/// Read only the header of a Voyant CSV and resolve its columns.
pub fn inspect_csv(path: &Path) -> Result<ColumnMap> {
    let (_, headers) = open_reader(path)?;
    resolve_columns(&headers)
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub path: PathBuf,
    pub dry_run: bool,
    /// Stop after this many valid rows.
    pub limit: Option<usize>,
    /// Record a `[create]`/`[update]` line per translation.
    pub verbose: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub rows_total: usize,
    pub rows_skipped: usize,
    pub rows_processed: usize,
    pub locales_created: usize,
    pub locales_updated: usize,
    pub stringunits_created: usize,
    pub stringunits_updated: usize,
    pub translations_created: usize,
    pub translations_updated: usize,
}

impl fmt::Display for ImportCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Import summary:")?;
        writeln!(f, "- rows_total: {}", self.rows_total)?;
        writeln!(f, "- rows_skipped: {}", self.rows_skipped)?;
        writeln!(f, "- rows_processed: {}", self.rows_processed)?;
        writeln!(f, "- locales_created: {}", self.locales_created)?;
        writeln!(f, "- locales_updated: {}", self.locales_updated)?;
        writeln!(f, "- stringunits_created: {}", self.stringunits_created)?;
        writeln!(f, "- stringunits_updated: {}", self.stringunits_updated)?;
        writeln!(f, "- translations_created: {}", self.translations_created)?;
        write!(f, "- translations_updated: {}", self.translations_updated)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub counts: ImportCounts,
    /// Per-translation actions, only filled with `verbose`.
    pub row_actions: Vec<String>,
}

/// Create the locale for a header, or backfill an existing one without
/// clobbering manual edits.
fn upsert_locale(db: &Database, legacy_column: &str, counts: &mut ImportCounts) -> Result<Locale> {
    let target = locale_target(legacy_column)?;
    let legacy = legacy_column.trim();

    let Some(mut locale) = db.get_locale_by_code(&target.code)? else {
        let mut new = NewLocale::new(&target.code, &target.bcp47, &target.name);
        new.is_rtl = target.is_rtl;
        new.legacy_column = Some(legacy.to_string());
        let locale = db.insert_locale(&new)?;
        counts.locales_created += 1;
        debug!(locale = %locale, "created locale from CSV header");
        return Ok(locale);
    };

    let mut changed = false;
    if locale.legacy_column.as_deref().map_or(true, |c| c.trim().is_empty()) {
        locale.legacy_column = Some(legacy.to_string());
        changed = true;
    }
    if locale.bcp47.trim().is_empty() {
        locale.bcp47 = target.bcp47.clone();
        changed = true;
    }
    if locale.name.trim().is_empty() || locale.name == locale.code.to_uppercase() {
        if locale.name != target.name {
            locale.name = target.name.clone();
            changed = true;
        }
    }
    if target.is_rtl && !locale.is_rtl {
        locale.is_rtl = true;
        changed = true;
    }

    if changed {
        db.update_locale(&locale)?;
        counts.locales_updated += 1;
    }
    Ok(locale)
}

fn cell<'r>(record: &'r StringRecord, index: usize) -> &'r str {
    record.get(index).unwrap_or("")
}

fn strip_trailing_newlines(value: &str) -> &str {
    value.trim_end_matches(['\r', '\n'])
}

/// Upsert a unit; an existing unit goes through the stale-marking save when
/// its text or `est` changed. Returns the unit and whether it was created.
fn upsert_string_unit(
    db: &Database,
    location: &str,
    message_id: &str,
    source_text: &str,
    source_updated_on: &str,
    counts: &mut ImportCounts,
) -> Result<StringUnit> {
    let Some(mut unit) = db.get_string_unit(location, message_id)? else {
        counts.stringunits_created += 1;
        return db.insert_string_unit(location, message_id, source_text, source_updated_on);
    };

    if unit.source_text != source_text || unit.source_updated_on != source_updated_on {
        unit.source_text = source_text.to_string();
        unit.source_updated_on = source_updated_on.to_string();
        db.save_string_unit(&mut unit)?;
        counts.stringunits_updated += 1;
    } else if unit.source_hash.is_empty() {
        db.save_string_unit(&mut unit)?;
    }
    Ok(unit)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TranslationAction {
    Created,
    Updated,
    Unchanged,
}

/// Make the locale's translation of `unit` the imported approved text.
/// Reviewer text and machine drafts are left alone.
fn upsert_imported_translation(
    db: &Database,
    unit: &StringUnit,
    locale: &Locale,
    text: &str,
) -> Result<TranslationAction> {
    let Some(mut tr) = db.get_translation_for(unit.id, locale.id)? else {
        let mut new = NewTranslation::new(unit.id, locale.id);
        new.approved_text = Some(text.to_string());
        new.status = TranslationStatus::Approved;
        new.provenance = Provenance::Imported;
        new.source_hash_at_last_update = unit.source_hash.clone();
        db.insert_translation(&new)?;
        return Ok(TranslationAction::Created);
    };

    let mut changed = false;
    if tr.approved_text.as_deref() != Some(text) {
        tr.approved_text = Some(text.to_string());
        changed = true;
    }
    if tr.status != TranslationStatus::Approved {
        tr.status = TranslationStatus::Approved;
        changed = true;
    }
    if tr.provenance != Provenance::Imported {
        tr.provenance = Provenance::Imported;
        changed = true;
    }
    if tr.source_hash_at_last_update != unit.source_hash {
        tr.source_hash_at_last_update = unit.source_hash.clone();
        changed = true;
    }
    if tr.reviewer_id.is_some() {
        tr.reviewer_id = None;
        changed = true;
    }

    if !changed {
        return Ok(TranslationAction::Unchanged);
    }
    db.save_translation_with_source(&mut tr, &unit.source_text)?;
    Ok(TranslationAction::Updated)
}

/// Run a full import. All writes happen in one transaction that is rolled
/// back on `dry_run` or on any error.
pub fn import_voyant_csv(db: &Database, options: &ImportOptions) -> Result<ImportReport> {
    let started = Instant::now();
    let (mut reader, headers) = open_reader(&options.path)?;
    let columns = resolve_columns(&headers)?;
    info!(
        path = %options.path.display(),
        locale_columns = columns.locales.len(),
        dry_run = options.dry_run,
        "importing Voyant CSV"
    );

    let report = db.atomic(!options.dry_run, |db| {
        let mut report = ImportReport::default();
        let counts = &mut report.counts;

        let mut locales = Vec::with_capacity(columns.locales.len());
        for column in &columns.locales {
            locales.push((column.index, upsert_locale(db, &column.legacy_code, counts)?));
        }

        for record in reader.records() {
            let record = record?;
            counts.rows_total += 1;

            let location = cell(&record, columns.location).trim();
            let message_id = cell(&record, columns.id).trim();
            if location.is_empty() || message_id.is_empty() {
                counts.rows_skipped += 1;
                continue;
            }
            if options.limit.map_or(false, |limit| counts.rows_processed >= limit) {
                break;
            }

            let source_text = strip_trailing_newlines(cell(&record, columns.en));
            let source_updated_on = cell(&record, columns.est);
            let unit = upsert_string_unit(
                db,
                location,
                message_id,
                source_text,
                source_updated_on,
                counts,
            )?;

            for (index, locale) in &locales {
                let text = strip_trailing_newlines(cell(&record, *index));
                if text.trim().is_empty() {
                    continue;
                }
                let tag = match upsert_imported_translation(db, &unit, locale, text)? {
                    TranslationAction::Created => {
                        counts.translations_created += 1;
                        "create"
                    }
                    TranslationAction::Updated => {
                        counts.translations_updated += 1;
                        "update"
                    }
                    TranslationAction::Unchanged => continue,
                };
                if options.verbose {
                    report
                        .row_actions
                        .push(format!("[{tag}] {} {location}::{message_id}", locale.code));
                }
            }

            counts.rows_processed += 1;
        }
        Ok(report)
    })?;

    ImportMetrics::record_run(&report.counts, options.dry_run, started.elapsed().as_secs_f64());
    info!(
        rows_processed = report.counts.rows_processed,
        translations_created = report.counts.translations_created,
        translations_updated = report.counts.translations_updated,
        dry_run = options.dry_run,
        "import finished"
    );
    Ok(report)
}
