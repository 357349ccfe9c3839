use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

pub const APP_NAME: &str = "Parlor";

/// Title given to every freshly created conversation.
pub const DEFAULT_TITLE: &str = "New Chat";
pub const TITLE_MAX_CHARS: usize = 50;

/// Largest file accepted for staging (10 MiB).
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

pub const CHAT_MESSAGE_PATH: &str = "/api/chat/message";
pub const HEALTH_PATH: &str = "/health";

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_ENVIRONMENT: &str = "development";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_base_url: Url,
    pub request_timeout_secs: u64,
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_URL).expect("default API url is valid"),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            environment: DEFAULT_ENVIRONMENT.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("PARLOR_API_URL") {
            config.api_base_url = Url::parse(raw.trim())
                .with_context(|| format!("PARLOR_API_URL is not a valid URL: {}", raw))?;
        }

        if let Some(raw) = lookup("PARLOR_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = raw.trim().parse().with_context(|| {
                format!("PARLOR_REQUEST_TIMEOUT_SECS must be a whole number: {}", raw)
            })?;
        }

        if let Some(raw) = lookup("PARLOR_ENVIRONMENT") {
            if !raw.trim().is_empty() {
                config.environment = raw.trim().to_string();
            }
        }

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Join an absolute API path onto the configured base, keeping any base path prefix.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.api_base_url.as_str().trim_end_matches('/'),
            path
        )
    }
}
