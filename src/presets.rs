//! Curated locale presets and the `seed-locales` command.

use crate::db::Database;
use crate::error::{HubError, Result};
use crate::types::NewLocale;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocaleSeed {
    pub code: &'static str,
    pub bcp47: &'static str,
    pub name: &'static str,
    pub script: Option<&'static str>,
    pub is_rtl: bool,
}

const fn seed(
    code: &'static str,
    bcp47: &'static str,
    name: &'static str,
    script: &'static str,
) -> LocaleSeed {
    LocaleSeed {
        code,
        bcp47,
        name,
        script: Some(script),
        is_rtl: false,
    }
}

pub const PRESET_GLOBAL_PLUS_AFRICA_INDIA_CHINESE: &str = "global_plus_africa_india_chinese";

const GLOBAL_PLUS_AFRICA_INDIA_CHINESE: &[LocaleSeed] = &[
    // Chinese
    seed("zh-hans", "zh-Hans", "Chinese (Simplified)", "Hans"),
    seed("zh-hant", "zh-Hant", "Chinese (Traditional)", "Hant"),
    // India
    seed("ta", "ta", "Tamil", "Tamil"),
    seed("te", "te", "Telugu", "Telu"),
    seed("mr", "mr", "Marathi", "Deva"),
    seed("pa", "pa", "Punjabi", "Guru"),
    seed("kn", "kn", "Kannada", "Knda"),
    seed("ml", "ml", "Malayalam", "Mlym"),
    seed("or", "or", "Odia", "Orya"),
    seed("as", "as", "Assamese", "Beng"),
    // Africa
    seed("sw", "sw", "Swahili", "Latn"),
    seed("am", "am", "Amharic", "Ethi"),
    seed("ha", "ha", "Hausa", "Latn"),
    seed("yo", "yo", "Yoruba", "Latn"),
    seed("ig", "ig", "Igbo", "Latn"),
    seed("zu", "zu", "isiZulu", "Latn"),
    seed("xh", "xh", "isiXhosa", "Latn"),
    seed("so", "so", "Somali", "Latn"),
    seed("ti", "ti", "Tigrinya", "Ethi"),
    seed("rw", "rw", "Kinyarwanda", "Latn"),
    seed("sn", "sn", "Shona", "Latn"),
];

/// Look up a preset by name.
pub fn preset(name: &str) -> Option<&'static [LocaleSeed]> {
    match name {
        PRESET_GLOBAL_PLUS_AFRICA_INDIA_CHINESE => Some(GLOBAL_PLUS_AFRICA_INDIA_CHINESE),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeedOptions {
    pub preset: String,
    /// Seeded locales get `enabled = enable`; existing ones are brought in line.
    pub enable: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub created_count: usize,
    pub updated_count: usize,
    pub skipped_count: usize,
    pub created_codes: Vec<String>,
    pub dry_run: bool,
}

const CREATED_PREVIEW_LEN: usize = 12;

impl SeedSummary {
    pub fn created_preview(&self) -> String {
        let mut preview = self
            .created_codes
            .iter()
            .take(CREATED_PREVIEW_LEN)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if self.created_codes.len() > CREATED_PREVIEW_LEN {
            preview.push_str(&format!(
                " …(+{} more)",
                self.created_codes.len() - CREATED_PREVIEW_LEN
            ));
        }
        preview
    }
}

impl fmt::Display for SeedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Seed summary:")?;
        writeln!(f, "- created_count: {}", self.created_count)?;
        writeln!(f, "- updated_count: {}", self.updated_count)?;
        writeln!(f, "- skipped_count: {}", self.skipped_count)?;
        write!(f, "- created_codes: {}", self.created_preview())?;
        if self.dry_run {
            write!(f, "\n(dry-run: no changes were written)")?;
        }
        Ok(())
    }
}

/// Create or align every locale of a preset. Never touches `legacy_column`.
pub fn seed_locales(db: &Database, options: &SeedOptions) -> Result<SeedSummary> {
    let name = options.preset.trim();
    let seeds = preset(name).ok_or_else(|| {
        HubError::command(format!(
            "Unsupported preset: {name}. \
             Only '{PRESET_GLOBAL_PLUS_AFRICA_INDIA_CHINESE}' is allowed."
        ))
    })?;

    let mut summary = db.atomic(!options.dry_run, |db| {
        let mut summary = SeedSummary::default();
        for seed in seeds {
            let Some(mut locale) = db.get_locale_by_code(seed.code)? else {
                let mut new = NewLocale::new(seed.code, seed.bcp47, seed.name);
                new.script = seed.script.map(str::to_string);
                new.is_rtl = seed.is_rtl;
                new.enabled = options.enable;
                db.insert_locale(&new)?;
                summary.created_count += 1;
                summary.created_codes.push(seed.code.to_string());
                continue;
            };

            let mut changed = false;
            if locale.bcp47 != seed.bcp47 {
                locale.bcp47 = seed.bcp47.to_string();
                changed = true;
            }
            if locale.name != seed.name {
                locale.name = seed.name.to_string();
                changed = true;
            }
            if locale.script.as_deref() != seed.script {
                locale.script = seed.script.map(str::to_string);
                changed = true;
            }
            if locale.is_rtl != seed.is_rtl {
                locale.is_rtl = seed.is_rtl;
                changed = true;
            }
            if locale.enabled != options.enable {
                locale.enabled = options.enable;
                changed = true;
            }

            if changed {
                db.update_locale(&locale)?;
                summary.updated_count += 1;
            } else {
                summary.skipped_count += 1;
            }
        }
        Ok(summary)
    })?;
    summary.dry_run = options.dry_run;

    info!(
        preset = name,
        created = summary.created_count,
        updated = summary.updated_count,
        skipped = summary.skipped_count,
        dry_run = options.dry_run,
        "seeded locales"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_has_unique_codes() {
        let seeds = preset(PRESET_GLOBAL_PLUS_AFRICA_INDIA_CHINESE).unwrap();
        assert_eq!(seeds.len(), 21);
        let mut codes: Vec<&str> = seeds.iter().map(|s| s.code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 21);
        assert!(seeds.iter().all(|s| !s.is_rtl));
    }

    #[test]
    fn created_preview_truncates_after_twelve() {
        let summary = SeedSummary {
            created_codes: (0..15).map(|i| format!("c{i}")).collect(),
            ..Default::default()
        };
        let preview = summary.created_preview();
        assert!(preview.starts_with("c0, c1,"));
        assert!(preview.ends_with("c11 …(+3 more)"));
    }

    #[test]
    fn summary_mentions_dry_run() {
        let summary = SeedSummary {
            dry_run: true,
            ..Default::default()
        };
        let text = summary.to_string();
        assert!(text.starts_with("Seed summary:"));
        assert!(text.ends_with("(dry-run: no changes were written)"));
    }
}
