mod common;

use voyant_hub::presets::{seed_locales, SeedOptions, PRESET_GLOBAL_PLUS_AFRICA_INDIA_CHINESE};
use voyant_hub::types::NewLocale;

fn options(enable: bool, dry_run: bool) -> SeedOptions {
    SeedOptions {
        preset: PRESET_GLOBAL_PLUS_AFRICA_INDIA_CHINESE.to_string(),
        enable,
        dry_run,
    }
}

#[test]
fn seeding_is_idempotent_and_disabled_by_default() {
    let db = common::db();

    let first = seed_locales(&db, &options(false, false)).unwrap();
    assert_eq!(first.created_count, 21);
    assert_eq!(first.updated_count, 0);
    assert_eq!(db.count_locales().unwrap(), 21);

    let sw = db.get_locale_by_code("sw").unwrap().unwrap();
    assert!(!sw.enabled);
    assert_eq!(sw.script.as_deref(), Some("Latn"));
    let zh = db.get_locale_by_code("zh-hans").unwrap().unwrap();
    assert_eq!(zh.bcp47, "zh-Hans");

    let second = seed_locales(&db, &options(false, false)).unwrap();
    assert_eq!(second.created_count, 0);
    assert_eq!(second.updated_count, 0);
    assert_eq!(second.skipped_count, 21);
    assert_eq!(db.count_locales().unwrap(), 21);
}

#[test]
fn enable_flag_enables_every_seeded_locale() {
    let db = common::db();
    seed_locales(&db, &options(false, false)).unwrap();

    let summary = seed_locales(&db, &options(true, false)).unwrap();
    assert_eq!(summary.updated_count, 21);
    let all = db.list_locales(&Default::default()).unwrap();
    assert!(all.iter().all(|l| l.enabled));
}

#[test]
fn existing_locale_is_aligned_but_keeps_its_legacy_column() {
    let db = common::db();
    let mut yo = NewLocale::new("yo", "yo", "YO");
    yo.legacy_column = Some("yo".to_string());
    yo.enabled = true;
    db.insert_locale(&yo).unwrap();

    let summary = seed_locales(&db, &options(false, false)).unwrap();
    assert_eq!(summary.created_count, 20);
    assert_eq!(summary.updated_count, 1);

    let yo = db.get_locale_by_code("yo").unwrap().unwrap();
    assert_eq!(yo.name, "Yoruba");
    assert_eq!(yo.legacy_column.as_deref(), Some("yo"));
    assert!(!yo.enabled);
}

#[test]
fn dry_run_reports_without_writing() {
    let db = common::db();

    let summary = seed_locales(&db, &options(false, true)).unwrap();
    assert_eq!(summary.created_count, 21);
    assert!(summary.dry_run);
    assert!(summary.to_string().ends_with("(dry-run: no changes were written)"));
    assert_eq!(db.count_locales().unwrap(), 0);
}

#[test]
fn unknown_preset_is_rejected() {
    let db = common::db();
    let err = seed_locales(
        &db,
        &SeedOptions {
            preset: "everything".to_string(),
            enable: false,
            dry_run: false,
        },
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unsupported preset: everything. Only 'global_plus_africa_india_chinese' is allowed."
    );
}
