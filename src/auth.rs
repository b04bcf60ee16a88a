//! User accounts: argon2 password hashing, validation, and HTTP Basic credentials.

use crate::db::Database;
use crate::error::{HubError, Result};
use crate::types::User;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use tracing::{debug, info};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_USERNAME_LENGTH: usize = 150;

/// Argon2id PHC string for `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| HubError::Password(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HubError::Password(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| HubError::Password(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(HubError::Validation("username cannot be blank".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(HubError::Validation(format!(
            "username must be at most {MAX_USERNAME_LENGTH} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(HubError::Validation(
            "username may contain only letters, digits and @/./+/-/_".to_string(),
        ));
    }
    Ok(())
}

/// Reject short, all-numeric, or username-equal passwords. All problems are
/// reported together.
pub fn validate_password(password: &str, username: &str) -> Result<()> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }
    if !username.is_empty() && password.eq_ignore_ascii_case(username) {
        problems.push("The password is too similar to the username.".to_string());
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(HubError::Validation(problems.join(" ")))
    }
}

/// Validate and create a user. A `None` password leaves the account unusable
/// for login until one is set.
pub fn create_user(
    db: &Database,
    username: &str,
    email: &str,
    password: Option<&str>,
    is_superuser: bool,
) -> Result<User> {
    validate_username(username)?;
    let hash = match password {
        Some(password) => {
            validate_password(password, username)?;
            Some(hash_password(password)?)
        }
        None => None,
    };
    let user = db.create_user(username, email.trim(), is_superuser, hash.as_deref())?;
    info!(username, is_superuser, "created user");
    Ok(user)
}

pub fn change_password(db: &Database, username: &str, password: &str) -> Result<()> {
    let user = db
        .get_user_by_username(username)?
        .ok_or_else(|| HubError::NotFound(format!("user '{username}'")))?;
    validate_password(password, username)?;
    db.set_password_hash(user.id, &hash_password(password)?)?;
    info!(username, "changed password");
    Ok(())
}

/// The active user matching these credentials, if any.
pub fn authenticate(db: &Database, username: &str, password: &str) -> Result<Option<User>> {
    let Some(user) = db.get_user_by_username(username)? else {
        debug!(username, "unknown user");
        return Ok(None);
    };
    if !user.is_active {
        debug!(username, "inactive user");
        return Ok(None);
    }
    let Some(hash) = user.password_hash.as_deref() else {
        return Ok(None);
    };
    if verify_password(password, hash)? {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

/// Decode an `Authorization: Basic …` header value into `(username, password)`.
pub fn parse_basic_auth(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_and_are_salted() {
        let first = hash_password("correct horse").unwrap();
        let second = hash_password("correct horse").unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &first).unwrap());
        assert!(!verify_password("wrong horse", &first).unwrap());
        assert!(verify_password("x", "not a hash").is_err());
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("s3cure-enough", "ada").is_ok());
        assert!(validate_password("short", "ada").is_err());
        assert!(validate_password("1234567890", "ada").is_err());
        assert!(validate_password("reviewer1", "Reviewer1").is_err());
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("ada.lovelace+l10n@example.org").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"a".repeat(151)).is_err());
    }

    #[test]
    fn parses_basic_credentials() {
        let header = format!("Basic {}", STANDARD.encode("ada:pa:ss"));
        assert_eq!(
            parse_basic_auth(&header),
            Some(("ada".to_string(), "pa:ss".to_string()))
        );
        assert_eq!(parse_basic_auth("Bearer abc"), None);
        assert_eq!(parse_basic_auth("Basic !!!"), None);
    }

    #[test]
    fn inactive_users_cannot_authenticate() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let user = create_user(&db, "ada", "", Some("s3cure-enough"), false).unwrap();
        assert!(authenticate(&db, "ada", "s3cure-enough").unwrap().is_some());
        assert!(authenticate(&db, "ada", "wrong-password").unwrap().is_none());

        db.set_user_active(user.id, false).unwrap();
        assert!(authenticate(&db, "ada", "s3cure-enough").unwrap().is_none());
    }
}
