//! Heuristic QA checks run against every translation on save.
//!
//! The checks compare a target string against its English source and report
//! placeholder drift, unbalanced braces, HTML tag count mismatches and empty
//! translations. Flags are stored with the translation as JSON.

use crate::types::{is_nonblank, Translation, TranslationStatus};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

static PERCENT_NAMED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%\([A-Za-z_][A-Za-z0-9_]*\)[sdfox]").expect("valid regex"));
static PERCENT_POSITIONAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%\d+\$[sdfox]").expect("valid regex"));
static PERCENT_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"%[sdfox]").expect("valid regex"));
static CURLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^{}]+\}").expect("valid regex"));
static HTML_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*(/)?\s*(b|i|strong|em|span|a)\b[^>]*>").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaCode {
    MissingPlaceholder,
    ExtraPlaceholder,
    UnbalancedBraces,
    HtmlTagMismatch,
    EmptyTranslation,
}

impl QaCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QaCode::MissingPlaceholder => "missing_placeholder",
            QaCode::ExtraPlaceholder => "extra_placeholder",
            QaCode::UnbalancedBraces => "unbalanced_braces",
            QaCode::HtmlTagMismatch => "html_tag_mismatch",
            QaCode::EmptyTranslation => "empty_translation",
        }
    }
}

impl fmt::Display for QaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaFlag {
    pub code: QaCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl QaFlag {
    fn new(code: QaCode, message: &str, details: Option<Value>) -> Self {
        Self {
            code,
            message: message.to_string(),
            details,
        }
    }
}

/// All placeholders in `text`: printf-style (`%s`, `%1$s`, `%(name)s`) and
/// curly (`{0}`, `{name}`, without nesting).
pub fn extract_placeholders(text: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    if text.is_empty() {
        return found;
    }

    for pattern in [&*PERCENT_NAMED, &*PERCENT_POSITIONAL, &*PERCENT_BARE, &*CURLY] {
        found.extend(pattern.find_iter(text).map(|m| m.as_str().to_string()));
    }
    found
}

/// Counts of opening and closing inline HTML tags, keyed `"{tag}_open"` / `"{tag}_close"`.
pub fn extract_html_tags(text: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for caps in HTML_TAG.captures_iter(text) {
        let kind = if caps.get(1).is_some() { "close" } else { "open" };
        let tag = caps[2].to_ascii_lowercase();
        *counts.entry(format!("{tag}_{kind}")).or_insert(0) += 1;
    }
    counts
}

pub fn compute_qa_flags(source: &str, target: &str) -> Vec<QaFlag> {
    let mut flags = Vec::new();

    let src_placeholders = extract_placeholders(source);
    let tgt_placeholders = extract_placeholders(target);

    let missing: Vec<&String> = src_placeholders.difference(&tgt_placeholders).collect();
    if !missing.is_empty() {
        flags.push(QaFlag::new(
            QaCode::MissingPlaceholder,
            "Translation is missing placeholder(s) present in the source.",
            Some(json!({ "missing": missing })),
        ));
    }

    let extra: Vec<&String> = tgt_placeholders.difference(&src_placeholders).collect();
    if !extra.is_empty() {
        flags.push(QaFlag::new(
            QaCode::ExtraPlaceholder,
            "Translation contains placeholder(s) not present in the source.",
            Some(json!({ "extra": extra })),
        ));
    }

    let open = target.matches('{').count();
    let close = target.matches('}').count();
    if open != close {
        flags.push(QaFlag::new(
            QaCode::UnbalancedBraces,
            "Translation has unbalanced curly braces.",
            Some(json!({ "open": open, "close": close })),
        ));
    }

    let src_tags = extract_html_tags(source);
    let tgt_tags = extract_html_tags(target);
    let keys: BTreeSet<&String> = src_tags.keys().chain(tgt_tags.keys()).collect();

    let mut mismatches = serde_json::Map::new();
    for key in keys {
        let s = src_tags.get(key).copied().unwrap_or(0);
        let t = tgt_tags.get(key).copied().unwrap_or(0);
        if s != t {
            mismatches.insert(key.clone(), json!({ "source": s, "target": t }));
        }
    }
    if !mismatches.is_empty() {
        flags.push(QaFlag::new(
            QaCode::HtmlTagMismatch,
            "Translation HTML tag counts do not match the source.",
            Some(json!({ "mismatches": mismatches })),
        ));
    }

    if !source.trim().is_empty() && target.trim().is_empty() {
        flags.push(QaFlag::new(
            QaCode::EmptyTranslation,
            "Translation is empty while the source is not.",
            None,
        ));
    }

    flags
}

/// The text QA runs against: approved text, else the reviewer's text, else the machine draft.
pub fn qa_target(translation: &Translation) -> &str {
    [
        translation.approved_text.as_deref(),
        translation.reviewer_text.as_deref(),
        translation.machine_draft.as_deref(),
    ]
    .into_iter()
    .find(|text| is_nonblank(*text))
    .flatten()
    .unwrap_or("")
}

/// Flags stored on a translation. An empty translation is only a problem once it is approved.
pub fn translation_qa_flags(source: &str, translation: &Translation) -> Vec<QaFlag> {
    let mut flags = compute_qa_flags(source, qa_target(translation));
    if translation.status != TranslationStatus::Approved {
        flags.retain(|f| f.code != QaCode::EmptyTranslation);
    }
    flags
}
