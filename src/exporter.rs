//! Per-locale CSV export in the uniform `voyant_<code>.csv` schema.

use crate::constants::{
    export_file_name, EXPORT_HEADER, EXPORT_SOURCE_UPDATED_COLUMN, EXPORT_STATUS_MISSING,
};
use crate::db::{Database, LocaleFilter};
use crate::error::{HubError, Result};
use crate::metrics::ExportMetrics;
use crate::types::{is_nonblank, Locale, TranslationStatus};
use chrono::SecondsFormat;
use csv::Writer;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub include_source_updated: bool,
    /// Written in place of the translation for rows without approved text.
    pub missing_marker: String,
    /// Omit approved rows from the file. Counts still cover every unit.
    pub only_missing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub total_string_units: usize,
    pub approved_count: usize,
    pub missing_count: usize,
    pub output_path: PathBuf,
}

impl fmt::Display for ExportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Export summary:")?;
        writeln!(f, "- total_string_units: {}", self.total_string_units)?;
        writeln!(f, "- approved_count: {}", self.approved_count)?;
        writeln!(f, "- missing_count: {}", self.missing_count)?;
        write!(f, "- output_path: {}", self.output_path.display())
    }
}

/// Write one locale's rows to `out`, one per string unit ordered by
/// `(location, message_id)`. `output_path` of the returned stats is left empty.
pub fn write_locale_csv<W: Write>(
    db: &Database,
    locale: &Locale,
    options: &ExportOptions,
    out: W,
) -> Result<ExportStats> {
    let approved: HashMap<i64, (Option<String>, String)> = db
        .translations_for_locale(locale.id)?
        .into_iter()
        .map(|t| {
            let updated_at = t.updated_at.to_rfc3339_opts(SecondsFormat::Micros, false);
            (t.string_unit_id, (t.approved_text, updated_at))
        })
        .collect();

    let mut header: Vec<&str> = EXPORT_HEADER.to_vec();
    if options.include_source_updated {
        header.push(EXPORT_SOURCE_UPDATED_COLUMN);
    }

    let mut writer = Writer::from_writer(out);
    writer.write_record(&header)?;

    let mut stats = ExportStats::default();
    for unit in db.list_string_units()? {
        stats.total_string_units += 1;

        let row = approved
            .get(&unit.id)
            .filter(|(text, _)| is_nonblank(text.as_deref()));
        let (translation, status, updated_at) = match row {
            Some((Some(text), updated_at)) => {
                stats.approved_count += 1;
                (text.as_str(), TranslationStatus::Approved.as_str(), updated_at.as_str())
            }
            _ => {
                stats.missing_count += 1;
                (options.missing_marker.as_str(), EXPORT_STATUS_MISSING, "")
            }
        };

        if options.only_missing && status != EXPORT_STATUS_MISSING {
            continue;
        }

        let mut record = vec![
            unit.location.as_str(),
            unit.message_id.as_str(),
            unit.source_text.as_str(),
            locale.code.as_str(),
            translation,
            status,
            unit.source_hash.as_str(),
            updated_at,
        ];
        if options.include_source_updated {
            record.push(unit.source_updated_on.as_str());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(stats)
}

/// Export one locale to `<out_dir>/voyant_<code>.csv`, creating the directory.
pub fn export_locale_csv(
    db: &Database,
    locale_code: &str,
    out_dir: &Path,
    options: &ExportOptions,
) -> Result<ExportStats> {
    let locale = db
        .get_locale_by_code(locale_code)?
        .ok_or_else(|| HubError::LocaleNotFound(locale_code.to_string()))?;
    create_out_dir(out_dir)?;

    let output_path = out_dir.join(export_file_name(locale_code));
    let file = File::create(&output_path)?;
    let mut stats = write_locale_csv(db, &locale, options, file)?;
    stats.output_path = output_path;

    ExportMetrics::record_locale(stats.approved_count, stats.missing_count);
    info!(
        locale = %locale.code,
        approved = stats.approved_count,
        missing = stats.missing_count,
        path = %stats.output_path.display(),
        "exported locale"
    );
    Ok(stats)
}

fn create_out_dir(out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir).map_err(|e| {
        HubError::command(format!(
            "Could not create output directory: {} ({e})",
            out_dir.display()
        ))
    })
}

/// Split a `--locales a,b,c` argument, dropping blanks.
pub fn parse_locales_arg(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct ExportAllReport {
    pub exported: Vec<(String, ExportStats)>,
    /// Requested codes that are disabled but were exported anyway.
    pub disabled_requested: Vec<String>,
    /// Requested codes with no matching locale.
    pub missing_requested: Vec<String>,
    pub out_dir: PathBuf,
}

impl ExportAllReport {
    pub fn total_approved(&self) -> usize {
        self.exported.iter().map(|(_, s)| s.approved_count).sum()
    }

    pub fn total_missing(&self) -> usize {
        self.exported.iter().map(|(_, s)| s.missing_count).sum()
    }

    pub fn locale_lines(&self) -> Vec<String> {
        self.exported
            .iter()
            .map(|(code, s)| {
                format!(
                    "{code}: approved={} missing={} -> {}",
                    s.approved_count,
                    s.missing_count,
                    s.output_path.display()
                )
            })
            .collect()
    }

    /// Fails when some requested locales do not exist. Call after the
    /// report has been printed so the exported files are still reported.
    pub fn ensure_complete(&self) -> Result<()> {
        if self.missing_requested.is_empty() || self.exported.is_empty() {
            return Ok(());
        }
        Err(HubError::command(format!(
            "One or more requested locales do not exist: {}",
            self.missing_requested.join(", ")
        )))
    }
}

impl fmt::Display for ExportAllReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exported.is_empty() {
            return write!(f, "No locales to export.");
        }
        for line in self.locale_lines() {
            writeln!(f, "{line}")?;
        }
        writeln!(f, "Final summary:")?;
        writeln!(f, "- locales_exported: {}", self.exported.len())?;
        writeln!(f, "- total_approved: {}", self.total_approved())?;
        writeln!(f, "- total_missing: {}", self.total_missing())?;
        write!(f, "- output_directory: {}", self.out_dir.display())
    }
}

/// Export every enabled locale, or exactly the `requested` codes (enabled or not).
pub fn export_all_locales(
    db: &Database,
    out_dir: &Path,
    requested: Option<&[String]>,
    options: &ExportOptions,
) -> Result<ExportAllReport> {
    create_out_dir(out_dir)?;
    let mut report = ExportAllReport {
        out_dir: out_dir.to_path_buf(),
        ..Default::default()
    };

    let locales: Vec<Locale> = match requested {
        Some(codes) => {
            let mut found = Vec::new();
            for code in codes {
                match db.get_locale_by_code(code)? {
                    Some(locale) => {
                        if !found.iter().any(|l: &Locale| l.id == locale.id) {
                            found.push(locale);
                        }
                    }
                    None => report.missing_requested.push(code.clone()),
                }
            }
            for locale in found.iter().filter(|l| !l.enabled) {
                warn!(
                    locale = %locale.code,
                    "locale is disabled but will be exported due to --locales"
                );
                report.disabled_requested.push(locale.code.clone());
            }
            found.sort_by(|a, b| a.code.cmp(&b.code));
            found
        }
        None => db.list_locales(&LocaleFilter {
            enabled_only: true,
            search: None,
        })?,
    };

    for locale in &locales {
        let stats = export_locale_csv(db, &locale.code, out_dir, options)?;
        report.exported.push((locale.code.clone(), stats));
    }
    Ok(report)
}
