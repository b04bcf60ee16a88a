use crate::constants::*;
use crate::error::{HubError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Runtime settings, read from the environment (and `.env` via dotenv in the binaries)
/// plus an optional TOML file for path defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub secret_key: Option<String>,
    pub debug: bool,
    pub database: DatabaseLocation,
    pub allowed_hosts: Vec<String>,
    pub port: u16,
    pub paths: PathSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub import_csv: PathBuf,
    pub export_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            import_csv: PathBuf::from(DEFAULT_IMPORT_CSV),
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    paths: PathSettings,
}

/// Where the SQLite store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Parse a `DATABASE_URL`. Accepts `sqlite://relative.db`, `sqlite:///abs/path.db`,
    /// `sqlite::memory:` and bare file paths.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(HubError::Config("DATABASE_URL is empty".to_string()));
        }
        if url == "sqlite::memory:" || url == ":memory:" || url == "sqlite://:memory:" {
            return Ok(DatabaseLocation::Memory);
        }
        if let Some(rest) = url.strip_prefix("sqlite://") {
            if rest.is_empty() {
                return Err(HubError::Config(format!("DATABASE_URL has no path: {url}")));
            }
            return Ok(DatabaseLocation::File(PathBuf::from(rest)));
        }
        if let Some(rest) = url.strip_prefix("sqlite:") {
            return Ok(DatabaseLocation::File(PathBuf::from(rest)));
        }
        if let Some((scheme, _)) = url.split_once("://") {
            return Err(HubError::Config(format!(
                "unsupported database backend '{scheme}' in DATABASE_URL; only sqlite is supported"
            )));
        }
        Ok(DatabaseLocation::File(PathBuf::from(url)))
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let debug = non_blank(ENV_DEBUG).map_or(false, |v| parse_bool(&v));
        let secret_key = non_blank(ENV_SECRET_KEY);
        let database_url =
            non_blank(ENV_DATABASE_URL).unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let database = DatabaseLocation::parse(&database_url)?;
        let allowed_hosts = parse_allowed_hosts(lookup(ENV_ALLOWED_HOSTS).as_deref());

        let port = match non_blank(ENV_PORT) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| HubError::Config(format!("invalid {ENV_PORT} '{raw}': {e}")))?,
            None => DEFAULT_PORT,
        };

        let config_path = non_blank(ENV_CONFIG_FILE).map(PathBuf::from);
        let paths = load_path_settings(config_path.as_deref())?;

        Ok(Self {
            secret_key,
            debug,
            database,
            allowed_hosts,
            port,
            paths,
        })
    }

    /// The secret key, or a fixed development key when debug is on.
    pub fn require_secret_key(&self) -> Result<String> {
        match (&self.secret_key, self.debug) {
            (Some(key), _) => Ok(key.clone()),
            (None, true) => {
                warn!("{ENV_SECRET_KEY} is not set; using an insecure development key");
                Ok("voyant-hub-insecure-development-key".to_string())
            }
            (None, false) => Err(HubError::Config(format!(
                "{ENV_SECRET_KEY} must be set when {ENV_DEBUG} is off"
            ))),
        }
    }

    pub fn is_host_allowed(&self, host: &str) -> bool {
        is_host_allowed(host, &self.allowed_hosts)
    }

    /// Deployment warnings in the spirit of a `check --deploy` run.
    pub fn deploy_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.debug {
            warnings.push(format!("{ENV_DEBUG} is on; do not run with debug in production."));
        }
        match &self.secret_key {
            None => warnings.push(format!("{ENV_SECRET_KEY} is not set.")),
            Some(key) if key.chars().count() < 50 => warnings.push(format!(
                "{ENV_SECRET_KEY} is shorter than 50 characters; generate a longer random key."
            )),
            Some(_) => {}
        }
        if self.allowed_hosts.iter().any(|h| h == "*") {
            warnings.push(format!(
                "{ENV_ALLOWED_HOSTS} contains '*'; every Host header is accepted."
            ));
        }
        if self.database == DatabaseLocation::Memory {
            warnings.push(
                "DATABASE_URL points at an in-memory database; data will not persist.".to_string(),
            );
        }
        warnings
    }
}

fn load_path_settings(explicit: Option<&Path>) -> Result<PathSettings> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.is_file() {
                return Ok(PathSettings::default());
            }
            default
        }
    };

    let content = fs::read_to_string(&path).map_err(|e| {
        HubError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
    })?;
    let config: FileConfig = toml::from_str(&content)?;
    debug!(path = %path.display(), "loaded config file");
    Ok(config.paths)
}

pub fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Comma-separated host patterns. Falls back to local hosts plus `.herokuapp.com`
/// when unset so a fresh deploy does not reject every request.
pub fn parse_allowed_hosts(raw: Option<&str>) -> Vec<String> {
    let hosts: Vec<String> = raw
        .unwrap_or("")
        .split(',')
        .map(|h| h.trim().to_ascii_lowercase())
        .filter(|h| !h.is_empty())
        .collect();

    if hosts.is_empty() {
        DEFAULT_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect()
    } else {
        hosts
    }
}

/// Strip the port from a Host header value (`example.com:8000`, `[::1]:8000`).
pub fn split_host(host: &str) -> &str {
    let host = host.trim();
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

pub fn is_host_allowed(host: &str, allowed: &[String]) -> bool {
    let name = split_host(host).trim_end_matches('.').to_ascii_lowercase();
    if name.is_empty() {
        return false;
    }
    allowed.iter().any(|pattern| {
        if pattern == "*" {
            return true;
        }
        if let Some(domain) = pattern.strip_prefix('.') {
            return name == domain || name.ends_with(pattern.as_str());
        }
        name == *pattern
    })
}
