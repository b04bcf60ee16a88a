mod common;

use voyant_hub::constants::{GROUP_REVIEWER, GROUP_SUPERADMIN};
use voyant_hub::db::{Database, TranslationFilter};
use voyant_hub::error::HubError;
use voyant_hub::qa::QaCode;
use voyant_hub::review::{
    refresh_qa, run_action, save_review, visible_translation, visible_translations, Actor,
    ReviewAction, ReviewEdit, REVIEWER_APPROVE_WARNING,
};
use voyant_hub::types::{NewTranslation, Provenance, Translation, TranslationStatus};

struct Fixture {
    db: Database,
    fr: Translation,
    de: Translation,
}

/// One unit with a French and a German draft; `rev` reviews French only.
fn fixture() -> Fixture {
    let db = common::db();
    let fr_locale = common::locale(&db, "fr", "French");
    let de_locale = common::locale(&db, "de", "German");
    let unit = common::unit(&db, "ui", "hello", "Hello {name}");

    let draft = |locale_id: i64, text: &str| {
        let mut new = NewTranslation::new(unit.id, locale_id);
        new.reviewer_text = Some(text.to_string());
        new.status = TranslationStatus::MachineDraft;
        new.provenance = Provenance::Human;
        db.insert_translation(&new).unwrap()
    };
    let fr = draft(fr_locale.id, "Bonjour {name}");
    let de = draft(de_locale.id, "Hallo {name}");

    let rev = common::user(&db, "rev", &[GROUP_REVIEWER], false);
    db.assign_locale(rev.id, fr_locale.id).unwrap();
    common::user(&db, "admin", &[GROUP_SUPERADMIN], false);
    common::user(&db, "root", &[], true);
    common::user(&db, "nobody", &[], false);

    Fixture { db, fr, de }
}

fn ids(rows: &[voyant_hub::types::TranslationRow]) -> Vec<i64> {
    rows.iter().map(|r| r.translation.id).collect()
}

#[test]
fn reviewers_only_see_assigned_locales() {
    let f = fixture();
    let rev = Actor::by_username(&f.db, "rev").unwrap();
    let admin = Actor::by_username(&f.db, "admin").unwrap();
    let root = Actor::by_username(&f.db, "root").unwrap();
    let nobody = Actor::by_username(&f.db, "nobody").unwrap();

    assert!(rev.is_reviewer());
    assert!(admin.is_superadmin());
    assert!(root.is_superadmin());

    let all = TranslationFilter::default;
    assert_eq!(ids(&visible_translations(&f.db, &rev, all()).unwrap()), vec![f.fr.id]);
    assert_eq!(visible_translations(&f.db, &admin, all()).unwrap().len(), 2);
    assert!(visible_translations(&f.db, &nobody, all()).unwrap().is_empty());

    // Asking for a locale outside the assignment yields nothing.
    let de_only = TranslationFilter {
        locale_code: Some("de".to_string()),
        ..Default::default()
    };
    assert!(visible_translations(&f.db, &rev, de_only).unwrap().is_empty());

    let err = visible_translation(&f.db, &rev, f.de.id).unwrap_err();
    assert!(matches!(err, HubError::NotFound(_)));
}

#[test]
fn reviewer_edits_skip_readonly_fields_and_never_approve() {
    let f = fixture();
    let rev = Actor::by_username(&f.db, "rev").unwrap();

    let edit = ReviewEdit {
        reviewer_text: Some("Salut {name}".to_string()),
        approved_text: Some("Sneaky".to_string()),
        status: Some(TranslationStatus::Approved),
        ..Default::default()
    };
    let outcome = save_review(&f.db, &rev, f.fr.id, edit).unwrap();

    assert_eq!(outcome.ignored_fields, vec!["approved_text"]);
    assert_eq!(outcome.warnings, vec![REVIEWER_APPROVE_WARNING.to_string()]);

    let saved = f.db.get_translation(f.fr.id).unwrap().unwrap();
    assert_eq!(saved.status, TranslationStatus::InReview);
    assert_eq!(saved.reviewer_text.as_deref(), Some("Salut {name}"));
    assert!(saved.approved_text.is_none());
    assert_eq!(saved.reviewer_id, Some(rev.user.id));
}

#[test]
fn reviewers_cannot_touch_unassigned_locales() {
    let f = fixture();
    let rev = Actor::by_username(&f.db, "rev").unwrap();

    let err = save_review(&f.db, &rev, f.de.id, ReviewEdit::default()).unwrap_err();
    assert!(matches!(err, HubError::PermissionDenied(_)));
}

#[test]
fn superadmin_edits_are_applied_and_qa_is_persisted() {
    let f = fixture();
    let admin = Actor::by_username(&f.db, "admin").unwrap();

    let edit = ReviewEdit {
        approved_text: Some("Bonjour".to_string()),
        status: Some(TranslationStatus::Approved),
        source_hash_at_last_update: Some("ignored".to_string()),
        ..Default::default()
    };
    let outcome = save_review(&f.db, &admin, f.fr.id, edit).unwrap();
    assert_eq!(outcome.ignored_fields, vec!["source_hash_at_last_update"]);
    assert!(outcome.warnings.is_empty());

    let saved = f.db.get_translation(f.fr.id).unwrap().unwrap();
    assert_eq!(saved.status, TranslationStatus::Approved);
    assert!(saved.reviewer_id.is_none());
    let codes: Vec<QaCode> = saved.qa_flags.iter().map(|q| q.code).collect();
    assert_eq!(codes, vec![QaCode::MissingPlaceholder]);
    assert!(saved.updated_at >= f.fr.updated_at);
}

#[test]
fn edits_pointing_at_missing_rows_are_rejected() {
    let f = fixture();
    let admin = Actor::by_username(&f.db, "admin").unwrap();

    let edit = ReviewEdit {
        locale_id: Some(999),
        ..Default::default()
    };
    let err = save_review(&f.db, &admin, f.fr.id, edit).unwrap_err();
    assert!(matches!(err, HubError::Validation(_)), "{err}");

    let edit = ReviewEdit {
        reviewer_id: Some(999),
        ..Default::default()
    };
    let err = save_review(&f.db, &admin, f.fr.id, edit).unwrap_err();
    assert!(matches!(err, HubError::Validation(_)), "{err}");

    let saved = f.db.get_translation(f.fr.id).unwrap().unwrap();
    assert_eq!(saved.locale_id, f.fr.locale_id);
    assert!(saved.reviewer_id.is_none());
}

#[test]
fn only_superadmins_can_approve() {
    let f = fixture();
    let rev = Actor::by_username(&f.db, "rev").unwrap();

    let err = run_action(&f.db, &rev, ReviewAction::Approve, &[f.fr.id]).unwrap_err();
    assert!(matches!(err, HubError::PermissionDenied(_)));
    assert_eq!(
        err.to_string(),
        "Permission denied: You do not have permission to approve translations."
    );

    let admin = Actor::by_username(&f.db, "admin").unwrap();
    let outcome = run_action(&f.db, &admin, ReviewAction::Approve, &[f.fr.id]).unwrap();
    assert_eq!(outcome.selected, 1);
    assert_eq!(outcome.changed, 1);

    let approved = f.db.get_translation(f.fr.id).unwrap().unwrap();
    assert_eq!(approved.status, TranslationStatus::Approved);
    assert_eq!(approved.approved_text.as_deref(), Some("Bonjour {name}"));
    assert_eq!(approved.provenance, Provenance::Human);
    let unit = f.db.get_string_unit("ui", "hello").unwrap().unwrap();
    assert_eq!(approved.source_hash_at_last_update, unit.source_hash);

    let again = run_action(&f.db, &admin, ReviewAction::Approve, &[f.fr.id]).unwrap();
    assert_eq!(again.changed, 0);
}

#[test]
fn bulk_status_actions_respect_scope() {
    let f = fixture();
    let rev = Actor::by_username(&f.db, "rev").unwrap();

    let outcome = run_action(&f.db, &rev, ReviewAction::Flag, &[f.fr.id, f.de.id]).unwrap();
    assert_eq!(outcome.selected, 1);
    assert_eq!(outcome.changed, 1);
    assert_eq!(
        f.db.get_translation(f.fr.id).unwrap().unwrap().status,
        TranslationStatus::Flagged
    );
    assert_eq!(
        f.db.get_translation(f.de.id).unwrap().unwrap().status,
        TranslationStatus::MachineDraft
    );

    let outcome = run_action(&f.db, &rev, ReviewAction::MarkInReview, &[f.fr.id]).unwrap();
    assert_eq!(outcome.changed, 1);
    let outcome = run_action(&f.db, &rev, ReviewAction::MarkInReview, &[f.fr.id]).unwrap();
    assert_eq!(outcome.changed, 0);
}

#[test]
fn refresh_qa_rewrites_only_outdated_flags() {
    let f = fixture();
    assert_eq!(refresh_qa(&f.db).unwrap().changed, 0);

    let mut unit = f.db.get_string_unit("ui", "hello").unwrap().unwrap();
    unit.source_text = "Hello {name}, <b>welcome</b>".to_string();
    f.db.save_string_unit(&mut unit).unwrap();

    // Saving the unit already refreshed its translations.
    let summary = refresh_qa(&f.db).unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.changed, 0);

    let fr = f.db.get_translation(f.fr.id).unwrap().unwrap();
    assert!(fr.qa_flags.iter().any(|q| q.code == QaCode::HtmlTagMismatch));

    let flagged = f
        .db
        .list_translations(&TranslationFilter {
            has_qa_warnings: Some(true),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(flagged.len(), 2);
}
