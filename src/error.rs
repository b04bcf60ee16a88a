use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A management command refused to run or failed in a user-visible way.
    #[error("{0}")]
    Command(String),

    #[error("Locale not found: {0}")]
    LocaleNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Password hashing failed: {0}")]
    Password(String),
}

impl HubError {
    pub fn command(message: impl Into<String>) -> Self {
        HubError::Command(message.into())
    }
}

pub type Result<T> = std::result::Result<T, HubError>;
