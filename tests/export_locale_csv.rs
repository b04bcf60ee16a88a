mod common;

use voyant_hub::constants::EXPORT_HEADER;
use voyant_hub::error::HubError;
use voyant_hub::exporter::{export_locale_csv, ExportOptions};

fn seed(db: &voyant_hub::db::Database) {
    let fr = common::locale(db, "fr", "French");
    let b = common::unit(db, "ui", "b", "Bye");
    let a = common::unit(db, "ui", "a", "Hello");
    common::unit(db, "about", "z", "About");
    common::approved(db, &a, &fr, "Bonjour");
    common::approved(db, &b, &fr, "  ");
}

#[test]
fn exports_one_row_per_unit_ordered_by_location_and_id() {
    let db = common::db();
    seed(&db);
    let dir = tempfile::tempdir().unwrap();

    let stats = export_locale_csv(&db, "fr", dir.path(), &ExportOptions::default()).unwrap();
    assert_eq!(stats.total_string_units, 3);
    assert_eq!(stats.approved_count, 1);
    assert_eq!(stats.missing_count, 2);
    assert_eq!(stats.output_path, dir.path().join("voyant_fr.csv"));

    let rows = common::read_csv(&stats.output_path);
    assert_eq!(rows[0], EXPORT_HEADER.to_vec());
    assert_eq!(rows.len(), 4);

    let keys: Vec<(&str, &str)> = rows[1..]
        .iter()
        .map(|r| (r[0].as_str(), r[1].as_str()))
        .collect();
    assert_eq!(keys, vec![("about", "z"), ("ui", "a"), ("ui", "b")]);

    let hello = &rows[2];
    assert_eq!(hello[2], "Hello");
    assert_eq!(hello[3], "fr");
    assert_eq!(hello[4], "Bonjour");
    assert_eq!(hello[5], "APPROVED");
    assert_eq!(hello[6].len(), 64);
    assert!(!hello[7].is_empty());

    // Whitespace-only approved text counts as missing.
    let bye = &rows[3];
    assert_eq!(bye[4], "");
    assert_eq!(bye[5], "MISSING");
    assert_eq!(bye[7], "");
}

#[test]
fn missing_marker_only_missing_and_source_updated_column() {
    let db = common::db();
    seed(&db);
    let dir = tempfile::tempdir().unwrap();
    let options = ExportOptions {
        include_source_updated: true,
        missing_marker: "TODO".to_string(),
        only_missing: true,
    };

    let stats = export_locale_csv(&db, "fr", dir.path(), &options).unwrap();
    assert_eq!(stats.approved_count, 1);
    assert_eq!(stats.missing_count, 2);

    let rows = common::read_csv(&stats.output_path);
    assert_eq!(rows[0].last().map(String::as_str), Some("source_updated_on"));
    assert_eq!(rows.len(), 3);
    assert!(rows[1..].iter().all(|r| r[4] == "TODO" && r[5] == "MISSING"));
}

#[test]
fn unknown_locale_is_an_error() {
    let db = common::db();
    let dir = tempfile::tempdir().unwrap();

    let err = export_locale_csv(&db, "xx", dir.path(), &ExportOptions::default()).unwrap_err();
    assert!(matches!(err, HubError::LocaleNotFound(_)));
    assert_eq!(err.to_string(), "Locale not found: xx");
    assert!(!dir.path().join("voyant_xx.csv").exists());
}

#[test]
fn creates_the_output_directory() {
    let db = common::db();
    seed(&db);
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");

    let stats = export_locale_csv(&db, "fr", &nested, &ExportOptions::default()).unwrap();
    assert!(stats.output_path.is_file());
}
