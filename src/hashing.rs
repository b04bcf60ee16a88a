use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Fingerprint of an English source string.
///
/// The text is NFC-normalized and trimmed before hashing so that visually
/// identical sources (composed vs. decomposed accents, stray whitespace) keep
/// the same hash and do not mark translations stale.
pub fn compute_source_hash(text: &str) -> String {
    let normalized: String = text.nfc().collect();

    let mut hasher = Sha256::new();
    hasher.update(normalized.trim().as_bytes());
    hex::encode(hasher.finalize())
}
