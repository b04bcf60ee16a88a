//! SQLite-backed store for locales, string units, translations and users.
//!
//! `Database` owns a single connection. Query methods live in the submodules as
//! `impl Database` blocks grouped by table.

mod locales;
mod translations;
mod units;
mod users;

pub use locales::LocaleFilter;
pub use translations::TranslationFilter;

use crate::config::DatabaseLocation;
use crate::constants::{GROUP_REVIEWER, GROUP_SUPERADMIN};
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_initial", include_str!("../../migrations/0001_initial.sql")),
    (
        "0002_review_workflow",
        include_str!("../../migrations/0002_review_workflow.sql"),
    ),
];

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(location: &DatabaseLocation) -> Result<Self> {
        let conn = match location {
            DatabaseLocation::Memory => Connection::open_in_memory()?,
            DatabaseLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let conn = Connection::open(path)?;
                conn.execute_batch("PRAGMA journal_mode=WAL;")?;
                conn
            }
        };
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        debug!(?location, "opened database");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(&DatabaseLocation::Memory)
    }

    /// Apply pending migrations, then make sure the workflow groups exist.
    /// Safe to run on every deploy.
    pub fn migrate(&self) -> Result<Vec<String>> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                name       TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            );",
        )?;

        let mut applied = Vec::new();
        for (name, sql) in MIGRATIONS {
            let done: Option<String> = self
                .conn
                .query_row(
                    "SELECT name FROM schema_migrations WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;
            if done.is_some() {
                continue;
            }

            self.atomic(true, |db| {
                db.conn.execute_batch(sql)?;
                db.conn.execute(
                    "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, ?2)",
                    params![name, timestamp(&Utc::now())],
                )?;
                Ok(())
            })?;
            info!(migration = name, "applied migration");
            applied.push(name.to_string());
        }

        for group in [GROUP_REVIEWER, GROUP_SUPERADMIN] {
            self.ensure_group(group)?;
        }
        Ok(applied)
    }

    /// Run `f` inside one transaction. The transaction commits only when `f`
    /// succeeds and `commit` is true; otherwise everything is rolled back
    /// (this is how dry runs work).
    pub fn atomic<T, F>(&self, commit: bool, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        if commit {
            tx.commit()?;
        } else {
            tx.rollback()?;
        }
        Ok(out)
    }
}

pub(crate) fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

pub(crate) fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a text column through `FromStr`, reporting failures as conversion errors.
pub(crate) fn parse_column<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
