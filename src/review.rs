//! Review workflow: who sees which translations, what they may edit, and the
//! bulk actions (mark in review, flag, approve).

use crate::constants::{GROUP_REVIEWER, GROUP_SUPERADMIN};
use crate::db::{Database, TranslationFilter};
use crate::error::{HubError, Result};
use crate::metrics::ReviewMetrics;
use crate::qa::translation_qa_flags;
use crate::types::{is_nonblank, Provenance, Translation, TranslationRow, TranslationStatus, User};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Fields nobody can edit through the review workflow.
pub const ALWAYS_READONLY: &[&str] = &[
    "location",
    "message_id",
    "source_text",
    "source_hash",
    "source_hash_at_last_update",
    "qa_flags",
    "created_at",
    "updated_at",
];

/// Extra fields locked for reviewers.
pub const REVIEWER_READONLY: &[&str] = &[
    "approved_text",
    "provenance",
    "machine_draft",
    "locale",
    "string_unit",
    "reviewer",
];

pub const REVIEWER_APPROVE_WARNING: &str =
    "Reviewers cannot set status=APPROVED. Set to IN_REVIEW instead.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    SuperAdmin,
    Reviewer { locale_ids: Vec<i64> },
    NoAccess,
}

/// A user together with the role the workflow grants them.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user: User,
    pub role: Role,
}

impl Actor {
    pub fn load(db: &Database, user: User) -> Result<Self> {
        let groups = db.user_groups(user.id)?;
        let in_group = |name: &str| groups.iter().any(|g| g == name);

        let role = if user.is_superuser || in_group(GROUP_SUPERADMIN) {
            Role::SuperAdmin
        } else if in_group(GROUP_REVIEWER) {
            Role::Reviewer {
                locale_ids: db.assigned_locale_ids(user.id)?,
            }
        } else {
            Role::NoAccess
        };
        Ok(Self { user, role })
    }

    pub fn by_username(db: &Database, username: &str) -> Result<Self> {
        let user = db
            .get_user_by_username(username)?
            .ok_or_else(|| HubError::NotFound(format!("user '{username}'")))?;
        Self::load(db, user)
    }

    pub fn is_superadmin(&self) -> bool {
        matches!(self.role, Role::SuperAdmin)
    }

    pub fn is_reviewer(&self) -> bool {
        matches!(self.role, Role::Reviewer { .. })
    }

    pub fn can_change(&self, translation: &Translation) -> bool {
        match &self.role {
            Role::SuperAdmin => true,
            Role::Reviewer { locale_ids } => locale_ids.contains(&translation.locale_id),
            Role::NoAccess => false,
        }
    }

    pub fn readonly_fields(&self) -> Vec<&'static str> {
        let mut fields = ALWAYS_READONLY.to_vec();
        if !self.is_superadmin() {
            fields.extend_from_slice(REVIEWER_READONLY);
        }
        fields
    }

    /// Narrow `filter` to what this actor may see.
    pub fn scope(&self, mut filter: TranslationFilter) -> TranslationFilter {
        filter.locale_ids = match &self.role {
            Role::SuperAdmin => filter.locale_ids,
            Role::Reviewer { locale_ids } => Some(match filter.locale_ids {
                Some(requested) => requested
                    .into_iter()
                    .filter(|id| locale_ids.contains(id))
                    .collect(),
                None => locale_ids.clone(),
            }),
            Role::NoAccess => Some(Vec::new()),
        };
        filter
    }
}

pub fn visible_translations(
    db: &Database,
    actor: &Actor,
    filter: TranslationFilter,
) -> Result<Vec<TranslationRow>> {
    db.list_translations(&actor.scope(filter))
}

/// One visible translation, or `NotFound` when it does not exist for this actor.
pub fn visible_translation(db: &Database, actor: &Actor, id: i64) -> Result<TranslationRow> {
    let filter = TranslationFilter {
        ids: Some(vec![id]),
        ..Default::default()
    };
    visible_translations(db, actor, filter)?
        .into_iter()
        .next()
        .ok_or_else(|| HubError::NotFound(format!("translation {id}")))
}

/// Submitted changes to a translation. Absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReviewEdit {
    pub approved_text: Option<String>,
    pub reviewer_text: Option<String>,
    pub machine_draft: Option<String>,
    pub status: Option<TranslationStatus>,
    pub provenance: Option<Provenance>,
    pub locale_id: Option<i64>,
    pub string_unit_id: Option<i64>,
    pub reviewer_id: Option<i64>,
    pub source_hash_at_last_update: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub translation: Translation,
    pub warnings: Vec<String>,
    /// Submitted fields that were discarded as read-only.
    pub ignored_fields: Vec<&'static str>,
}

/// Apply `edit` as `actor` and save. Reviewers always become the
/// translation's reviewer and cannot approve.
pub fn save_review(
    db: &Database,
    actor: &Actor,
    id: i64,
    edit: ReviewEdit,
) -> Result<ReviewOutcome> {
    let mut translation = db
        .get_translation(id)?
        .ok_or_else(|| HubError::NotFound(format!("translation {id}")))?;
    if !actor.can_change(&translation) {
        return Err(HubError::PermissionDenied(format!(
            "{} cannot change translation {id}",
            actor.user.username
        )));
    }

    let readonly = actor.readonly_fields();
    let mut ignored = Vec::new();
    let mut allow = |field: &'static str, submitted: bool| {
        if !submitted {
            return false;
        }
        if readonly.contains(&field) {
            ignored.push(field);
            return false;
        }
        true
    };

    if allow("approved_text", edit.approved_text.is_some()) {
        translation.approved_text = edit.approved_text;
    }
    if allow("reviewer_text", edit.reviewer_text.is_some()) {
        translation.reviewer_text = edit.reviewer_text;
    }
    if allow("machine_draft", edit.machine_draft.is_some()) {
        translation.machine_draft = edit.machine_draft;
    }
    if let Some(status) = edit.status.filter(|_| allow("status", true)) {
        translation.status = status;
    }
    if let Some(provenance) = edit.provenance.filter(|_| allow("provenance", true)) {
        translation.provenance = provenance;
    }
    if let Some(locale_id) = edit.locale_id.filter(|_| allow("locale", true)) {
        translation.locale_id = locale_id;
    }
    if let Some(unit_id) = edit.string_unit_id.filter(|_| allow("string_unit", true)) {
        translation.string_unit_id = unit_id;
    }
    if let Some(reviewer_id) = edit.reviewer_id.filter(|_| allow("reviewer", true)) {
        translation.reviewer_id = Some(reviewer_id);
    }
    allow(
        "source_hash_at_last_update",
        edit.source_hash_at_last_update.is_some(),
    );

    check_references(db, &translation)?;

    let mut warnings = Vec::new();
    if !actor.is_superadmin() {
        translation.reviewer_id = Some(actor.user.id);
        if translation.status == TranslationStatus::Approved {
            translation.status = TranslationStatus::InReview;
            warnings.push(REVIEWER_APPROVE_WARNING.to_string());
            warn!(user = %actor.user.username, id, "reviewer tried to approve; kept IN_REVIEW");
        }
    }

    db.atomic(true, |db| db.save_translation(&mut translation))?;
    info!(user = %actor.user.username, id, status = %translation.status, "review saved");

    Ok(ReviewOutcome {
        translation,
        warnings,
        ignored_fields: ignored,
    })
}

/// Reject edits pointing at a locale, string unit or reviewer that does not exist.
fn check_references(db: &Database, translation: &Translation) -> Result<()> {
    if db.get_locale(translation.locale_id)?.is_none() {
        return Err(HubError::Validation(format!(
            "locale {} does not exist",
            translation.locale_id
        )));
    }
    if db.get_string_unit_by_id(translation.string_unit_id)?.is_none() {
        return Err(HubError::Validation(format!(
            "string unit {} does not exist",
            translation.string_unit_id
        )));
    }
    if let Some(reviewer_id) = translation.reviewer_id {
        if db.get_user(reviewer_id)?.is_none() {
            return Err(HubError::Validation(format!("user {reviewer_id} does not exist")));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewAction {
    MarkInReview,
    Flag,
    Approve,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::MarkInReview => "mark-in-review",
            ReviewAction::Flag => "flag",
            ReviewAction::Approve => "approve",
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewAction {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "mark-in-review" => Ok(ReviewAction::MarkInReview),
            "flag" | "flag-selected" => Ok(ReviewAction::Flag),
            "approve" | "approve-selected" => Ok(ReviewAction::Approve),
            other => Err(HubError::Validation(format!("unknown action '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub selected: usize,
    pub changed: usize,
}

/// Run a bulk action over the selected ids the actor can see. Invisible ids
/// are silently left out of the selection.
pub fn run_action(
    db: &Database,
    actor: &Actor,
    action: ReviewAction,
    ids: &[i64],
) -> Result<ActionOutcome> {
    if action == ReviewAction::Approve && !actor.is_superadmin() {
        ReviewMetrics::record_denied(action.as_str());
        return Err(HubError::PermissionDenied(
            "You do not have permission to approve translations.".to_string(),
        ));
    }

    let selection = visible_translations(
        db,
        actor,
        TranslationFilter {
            ids: Some(ids.to_vec()),
            ..Default::default()
        },
    )?;

    let changed = db.atomic(true, |db| {
        let mut changed = 0;
        for row in selection.iter() {
            let mut translation = row.translation.clone();
            let dirty = match action {
                ReviewAction::MarkInReview => {
                    set_status(&mut translation, TranslationStatus::InReview)
                }
                ReviewAction::Flag => set_status(&mut translation, TranslationStatus::Flagged),
                ReviewAction::Approve => approve(&mut translation, &row.source_hash),
            };
            if dirty {
                db.save_translation_with_source(&mut translation, &row.source_text)?;
                changed += 1;
            }
        }
        Ok(changed)
    })?;

    ReviewMetrics::record_action(action.as_str(), changed);
    info!(
        user = %actor.user.username,
        %action,
        selected = selection.len(),
        changed,
        "review action"
    );
    Ok(ActionOutcome {
        selected: selection.len(),
        changed,
    })
}

fn set_status(translation: &mut Translation, status: TranslationStatus) -> bool {
    if translation.status == status {
        return false;
    }
    translation.status = status;
    true
}

fn approve(translation: &mut Translation, source_hash: &str) -> bool {
    let mut changed = false;
    if !translation.has_approved_text() && is_nonblank(translation.reviewer_text.as_deref()) {
        translation.approved_text = translation.reviewer_text.clone();
        changed = true;
    }
    changed |= set_status(translation, TranslationStatus::Approved);
    if !matches!(translation.provenance, Provenance::Imported | Provenance::Human) {
        translation.provenance = Provenance::Human;
        changed = true;
    }
    if translation.source_hash_at_last_update != source_hash {
        translation.source_hash_at_last_update = source_hash.to_string();
        changed = true;
    }
    changed
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub total: usize,
    pub changed: usize,
}

/// Recompute QA flags for every translation; only rows whose flags changed are written.
pub fn refresh_qa(db: &Database) -> Result<RefreshSummary> {
    db.atomic(true, |db| {
        let rows = db.list_translations(&TranslationFilter::default())?;
        let mut summary = RefreshSummary {
            total: rows.len(),
            changed: 0,
        };
        for row in rows {
            let mut translation = row.translation;
            if translation_qa_flags(&row.source_text, &translation) != translation.qa_flags {
                db.save_translation_with_source(&mut translation, &row.source_text)?;
                summary.changed += 1;
            }
        }
        info!(total = summary.total, changed = summary.changed, "refreshed QA flags");
        Ok(summary)
    })
}
