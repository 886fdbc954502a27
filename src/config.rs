//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Wizard runtime configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Base URL of the registration API, without trailing slash.
    pub api_base_url: String,
    /// Directory holding the local draft files.
    pub draft_dir: PathBuf,
    /// Per-request timeout for backend calls.
    pub request_timeout: Duration,
    /// Optional bearer token sent with every backend request.
    pub api_token: Option<SecretString>,
    /// Use the in-process backend instead of HTTP.
    pub dry_run: bool,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            draft_dir: PathBuf::from("./data/drafts"),
            request_timeout: Duration::from_secs(15),
            api_token: None,
            dry_run: false,
        }
    }
}

impl WizardConfig {
    /// Build configuration from `ENROLL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_base_url = match std::env::var("ENROLL_API_URL") {
            Ok(url) => normalize_base_url(&url)?,
            Err(_) => defaults.api_base_url,
        };

        let draft_dir = std::env::var("ENROLL_DRAFT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.draft_dir);

        let timeout_secs: u64 = std::env::var("ENROLL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(15);

        let api_token = std::env::var("ENROLL_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);

        let dry_run = std::env::var("ENROLL_DRY_RUN")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            api_base_url,
            draft_dir,
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
            api_token,
            dry_run,
        })
    }
}

/// Validate a base URL and strip any trailing slash.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            key: "ENROLL_API_URL".into(),
            message: format!("expected an http(s) URL, got {trimmed:?}"),
        });
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}
