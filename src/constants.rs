/// Group names used by the review workflow. Both are guaranteed to exist after `migrate`.
pub const GROUP_REVIEWER: &str = "L10N_REVIEWER";
pub const GROUP_SUPERADMIN: &str = "L10N_SUPERADMIN";

/// Default location of the upstream Voyant spreadsheet.
pub const DEFAULT_IMPORT_CSV: &str = "data/voyant_strings.csv";
pub const DEFAULT_EXPORT_DIR: &str = "exports";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://voyant_hub.db";
pub const DEFAULT_CONFIG_FILE: &str = "voyant_hub.toml";
pub const DEFAULT_PORT: u16 = 8000;

// Environment variables (names kept from the existing deployment config vars)
pub const ENV_SECRET_KEY: &str = "DJANGO_SECRET_KEY";
pub const ENV_DEBUG: &str = "DJANGO_DEBUG";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_ALLOWED_HOSTS: &str = "DJANGO_ALLOWED_HOSTS";
pub const ENV_SUPERUSER_PASSWORD: &str = "DJANGO_SUPERUSER_PASSWORD";
pub const ENV_PORT: &str = "PORT";
pub const ENV_CONFIG_FILE: &str = "VOYANT_HUB_CONFIG";

/// Hosts allowed when `DJANGO_ALLOWED_HOSTS` is not set.
pub const DEFAULT_ALLOWED_HOSTS: &[&str] = &["localhost", "127.0.0.1", "[::1]", ".herokuapp.com"];

/// Exported file name for a locale: `voyant_<code>.csv`.
pub fn export_file_name(locale_code: &str) -> String {
    format!("voyant_{locale_code}.csv")
}

/// Uniform export schema, in column order.
pub const EXPORT_HEADER: [&str; 8] = [
    "location",
    "message_id",
    "source_en",
    "target_locale",
    "translation",
    "status",
    "source_hash",
    "translation_updated_at",
];
pub const EXPORT_SOURCE_UPDATED_COLUMN: &str = "source_updated_on";

/// Export row status when no approved text exists for the locale.
pub const EXPORT_STATUS_MISSING: &str = "MISSING";
