#![allow(dead_code)]

use std::path::{Path, PathBuf};
use voyant_hub::db::Database;
use voyant_hub::types::{
    Locale, NewLocale, NewTranslation, StringUnit, Translation, TranslationStatus, User,
};

/// A fresh, migrated in-memory database.
pub fn db() -> Database {
    let db = Database::open_in_memory().expect("open in-memory database");
    db.migrate().expect("migrate");
    db
}

pub fn write_csv(dir: &Path, name: &str, rows: &[&[&str]]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = csv::Writer::from_path(&path).expect("create csv");
    for row in rows {
        writer.write_record(*row).expect("write row");
    }
    writer.flush().expect("flush csv");
    path
}

pub fn locale(db: &Database, code: &str, name: &str) -> Locale {
    db.insert_locale(&NewLocale::new(code, code, name)).expect("insert locale")
}

pub fn unit(db: &Database, location: &str, message_id: &str, source: &str) -> StringUnit {
    db.insert_string_unit(location, message_id, source, "")
        .expect("insert string unit")
}

pub fn approved(db: &Database, unit: &StringUnit, locale: &Locale, text: &str) -> Translation {
    let mut new = NewTranslation::new(unit.id, locale.id);
    new.approved_text = Some(text.to_string());
    new.status = TranslationStatus::Approved;
    db.insert_translation(&new).expect("insert translation")
}

pub fn user(db: &Database, username: &str, groups: &[&str], is_superuser: bool) -> User {
    let user = db
        .create_user(username, "", is_superuser, None)
        .expect("create user");
    for group in groups {
        db.add_user_to_group(user.id, group).expect("add to group");
    }
    user
}

pub fn read_csv(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .expect("open csv");
    reader
        .records()
        .map(|r| r.expect("record").iter().map(str::to_string).collect())
        .collect()
}
