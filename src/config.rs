use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub mailbox: MailboxConfig,
    pub log_file: Option<String>,
    pub log_level: Option<String>,
    #[serde(default)]
    pub quiet: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub attempt_timeout_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailboxConfig {
    pub base_url: String,
    pub poll_attempts: u32,
    pub poll_interval_seconds: u64,
    pub attempt_timeout_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub cleanup: bool,
}

pub const DEFAULT_BACKEND_URL: &str = "https://web-production-47450.up.railway.app";
pub const DEFAULT_MAILBOX_URL: &str = "https://api.temp-mail.solutions";
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_POLL_ATTEMPTS: u32 = 30;
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 5;

impl AppConfig {
    // Load config from defaults, then file (if exists), then environment variables
    pub fn new() -> Result<Self, ConfigError> {
        Self::configure_defaults()?
            .add_source(File::with_name("config").required(false))
            // e.g. APP_BACKEND__BASE_URL=... APP_MAILBOX__POLL_ATTEMPTS=...
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize::<Self>()
            .map(Self::normalized)
    }

    // Load config from a specific file path
    pub fn new_from_file(path: &str) -> Result<Self, ConfigError> {
        Self::configure_defaults()?
            .add_source(File::with_name(path).required(true))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize::<Self>()
            .map(Self::normalized)
    }

    fn configure_defaults()
    -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("backend.base_url", DEFAULT_BACKEND_URL)?
            .set_default("backend.retries", DEFAULT_RETRIES as i64)?
            .set_default("backend.retry_delay_ms", DEFAULT_RETRY_DELAY_MS as i64)?
            .set_default("mailbox.base_url", DEFAULT_MAILBOX_URL)?
            .set_default("mailbox.poll_attempts", DEFAULT_POLL_ATTEMPTS as i64)?
            .set_default("mailbox.poll_interval_seconds", DEFAULT_POLL_INTERVAL_SECONDS as i64)?
            .set_default("mailbox.cleanup", true)
    }

    fn normalized(mut self) -> Self {
        self.backend.base_url = trim_base_url(&self.backend.base_url);
        self.mailbox.base_url = trim_base_url(&self.mailbox.base_url);
        self
    }
}

impl BackendConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            delay: Duration::from_millis(self.retry_delay_ms),
            attempt_timeout: self.attempt_timeout_seconds.map(Duration::from_secs),
        }
    }
}

impl MailboxConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_seconds.map(Duration::from_secs)
    }
}

pub fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
