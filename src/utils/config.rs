use std::path::Path;
use log::warn;

pub const GITHUB_APP_ID: &str = "GITHUB_APP_ID";
pub const GITHUB_PRIVATE_KEY: &str = "GITHUB_PRIVATE_KEY";
pub const GITHUB_CLIENT_ID: &str = "GITHUB_CLIENT_ID";
pub const GITHUB_CLIENT_SECRET: &str = "GITHUB_CLIENT_SECRET";
pub const GITHUB_REDIRECT_URI: &str = "GITHUB_REDIRECT_URI";
pub const GITHUB_WEBHOOK_SECRET: &str = "GITHUB_WEBHOOK_SECRET";

/// Every variable that must be set before the integration starts.
pub const REQUIRED_VARS: [&str; 6] = [
    GITHUB_APP_ID,
    GITHUB_PRIVATE_KEY,
    GITHUB_CLIENT_ID,
    GITHUB_CLIENT_SECRET,
    GITHUB_REDIRECT_URI,
    GITHUB_WEBHOOK_SECRET,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubAppConfig {
    pub app_id: String,
    pub private_key: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub webhook_secret: String,
}

/// Reads a variable from the process environment.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Resolves a credential that is either a path to a file or the material itself.
///
/// An existing file yields its contents, anything else is returned unchanged.
/// No validation of the key format happens here.
pub async fn resolve_credential(value: Option<String>) -> Option<String> {
    let value = value.filter(|v| !v.is_empty())?;

    let is_file = tokio::fs::metadata(Path::new(&value))
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        return Some(value);
    }

    match tokio::fs::read_to_string(&value).await {
        Ok(contents) => Some(contents),
        Err(e) => {
            warn!("Failed to read credential file {}: {}", value, e);
            Some(value)
        }
    }
}

impl GitHubAppConfig {
    /// Loads the configuration through `lookup`. Returns `None` when any
    /// required value is missing or empty; the missing names are logged.
    pub async fn load<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|name| get(*name).is_none())
            .collect();
        if !missing.is_empty() {
            warn!(
                "GitHub App integration disabled, missing: {}",
                missing.join(", ")
            );
            return None;
        }

        Some(GitHubAppConfig {
            app_id: get(GITHUB_APP_ID)?,
            private_key: resolve_credential(get(GITHUB_PRIVATE_KEY)).await?,
            client_id: get(GITHUB_CLIENT_ID)?,
            client_secret: get(GITHUB_CLIENT_SECRET)?,
            redirect_uri: get(GITHUB_REDIRECT_URI)?,
            webhook_secret: get(GITHUB_WEBHOOK_SECRET)?,
        })
    }

    /// Loads the configuration from the process environment.
    pub async fn from_env() -> Option<Self> {
        Self::load(env_lookup).await
    }
}
