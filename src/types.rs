use crate::error::HubError;
use crate::qa::QaFlag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    pub id: i64,
    pub code: String,
    pub bcp47: String,
    pub name: String,
    pub script: Option<String>,
    pub is_rtl: bool,
    pub enabled: bool,
    pub legacy_column: Option<String>,
}

/// Fields for inserting a locale; the id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewLocale {
    pub code: String,
    pub bcp47: String,
    pub name: String,
    pub script: Option<String>,
    pub is_rtl: bool,
    pub enabled: bool,
    pub legacy_column: Option<String>,
}

impl NewLocale {
    pub fn new(code: &str, bcp47: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            bcp47: bcp47.to_string(),
            name: name.to_string(),
            script: None,
            is_rtl: false,
            enabled: true,
            legacy_column: None,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.name)
    }
}

/// One English source string, keyed by `(location, message_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringUnit {
    pub id: i64,
    pub location: String,
    pub message_id: String,
    pub source_text: String,
    pub source_updated_on: String,
    /// Derived from `source_text` on every save; never set by callers.
    pub source_hash: String,
}

impl fmt::Display for StringUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} :: {}", self.location, self.message_id)
    }
}

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = HubError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| {
                        HubError::Validation(format!(
                            "unknown {} '{}'",
                            stringify!($name),
                            s
                        ))
                    })
            }
        }
    };
}

text_enum!(TranslationStatus {
    Approved => "APPROVED",
    Stale => "STALE",
    InReview => "IN_REVIEW",
    MachineDraft => "MACHINE_DRAFT",
    Rejected => "REJECTED",
    Flagged => "FLAGGED",
});

text_enum!(Provenance {
    Imported => "IMPORTED",
    Human => "HUMAN",
    Llm => "LLM",
    Mt => "MT",
});

impl Default for TranslationStatus {
    fn default() -> Self {
        TranslationStatus::InReview
    }
}

impl Default for Provenance {
    fn default() -> Self {
        Provenance::Human
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub id: i64,
    pub string_unit_id: i64,
    pub locale_id: i64,
    pub approved_text: Option<String>,
    pub reviewer_text: Option<String>,
    pub machine_draft: Option<String>,
    pub status: TranslationStatus,
    pub provenance: Provenance,
    pub source_hash_at_last_update: String,
    pub reviewer_id: Option<i64>,
    pub qa_flags: Vec<QaFlag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Translation {
    pub fn has_approved_text(&self) -> bool {
        is_nonblank(self.approved_text.as_deref())
    }

    pub fn has_qa_warnings(&self) -> bool {
        !self.qa_flags.is_empty()
    }
}

/// Fields for inserting a translation.
#[derive(Debug, Clone, Default)]
pub struct NewTranslation {
    pub string_unit_id: i64,
    pub locale_id: i64,
    pub approved_text: Option<String>,
    pub reviewer_text: Option<String>,
    pub machine_draft: Option<String>,
    pub status: TranslationStatus,
    pub provenance: Provenance,
    pub source_hash_at_last_update: String,
    pub reviewer_id: Option<i64>,
}

impl NewTranslation {
    pub fn new(string_unit_id: i64, locale_id: i64) -> Self {
        Self {
            string_unit_id,
            locale_id,
            ..Default::default()
        }
    }
}

/// A translation joined with the locale and string-unit columns listings need.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationRow {
    #[serde(flatten)]
    pub translation: Translation,
    pub locale_code: String,
    pub location: String,
    pub message_id: String,
    pub source_text: String,
    pub source_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocaleAssignment {
    pub id: i64,
    pub user_id: i64,
    pub locale_id: i64,
    pub username: String,
    pub locale_code: String,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn is_nonblank(value: Option<&str>) -> bool {
    value.map_or(false, |v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("approved".parse::<TranslationStatus>().unwrap(), TranslationStatus::Approved);
        assert_eq!("in-review".parse::<TranslationStatus>().unwrap(), TranslationStatus::InReview);
        assert!("done".parse::<TranslationStatus>().is_err());
    }

    #[test]
    fn enums_serialize_as_stored_text() {
        assert_eq!(
            serde_json::to_string(&TranslationStatus::MachineDraft).unwrap(),
            "\"MACHINE_DRAFT\""
        );
        assert_eq!(serde_json::to_string(&Provenance::Llm).unwrap(), "\"LLM\"");
        assert_eq!(Provenance::Mt.as_str(), "MT");
    }

    #[test]
    fn defaults_match_new_translations() {
        let t = NewTranslation::new(1, 2);
        assert_eq!(t.status, TranslationStatus::InReview);
        assert_eq!(t.provenance, Provenance::Human);
    }
}
