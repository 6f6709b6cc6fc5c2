//! Application configuration structures.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variable that overrides `publisher.bearer_token`.
pub const BEARER_TOKEN_ENV: &str = "BILLWATCH_BEARER_TOKEN";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Record store location
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Upstream feed settings
    #[serde(default)]
    pub source: SourceConfig,

    /// URL shortener settings
    #[serde(default)]
    pub shortener: ShortenerConfig,

    /// Publish target settings
    #[serde(default)]
    pub publisher: PublisherConfig,

    /// Cycle timing and bounds
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply overrides taken from the process environment.
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(BEARER_TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.publisher.bearer_token = token;
            }
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(AppError::validation("database.path is empty"));
        }
        if self.source.congress == 0 {
            return Err(AppError::validation("source.congress must be > 0"));
        }
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if self.shortener.enabled {
            if self.shortener.timeout_secs == 0 {
                return Err(AppError::validation("shortener.timeout_secs must be > 0"));
            }
            if self.shortener.hourly_limit == 0 {
                return Err(AppError::validation("shortener.hourly_limit must be > 0"));
            }
        }
        if self.publisher.timeout_secs == 0 {
            return Err(AppError::validation("publisher.timeout_secs must be > 0"));
        }
        if self.publisher.max_length < defaults::MIN_POST_LENGTH {
            return Err(AppError::validation(format!(
                "publisher.max_length must be >= {}",
                defaults::MIN_POST_LENGTH
            )));
        }
        if self.scheduler.max_iterations == 0 {
            return Err(AppError::validation("scheduler.max_iterations must be > 0"));
        }
        if self.scheduler.ingest_every == 0 {
            return Err(AppError::validation("scheduler.ingest_every must be > 0"));
        }
        Ok(())
    }
}

/// Where the SQLite database lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "defaults::database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: defaults::database_path(),
        }
    }
}

/// Upstream bill feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Congress session number, substituted for `{congress}` in feed locations
    #[serde(default = "defaults::congress")]
    pub congress: u32,

    /// Feed locations (http(s) URLs, file URLs or plain paths)
    #[serde(default)]
    pub feeds: Vec<String>,

    /// Relevance keywords; empty keeps every entry
    #[serde(default)]
    pub keywords: Vec<String>,

    /// User-Agent header for feed requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::source_timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            congress: defaults::congress(),
            feeds: Vec::new(),
            keywords: Vec::new(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::source_timeout(),
        }
    }
}

/// is.gd shortener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenerConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    #[serde(default = "defaults::shortener_endpoint")]
    pub endpoint: String,

    /// Requests allowed per rolling hour
    #[serde(default = "defaults::hourly_limit")]
    pub hourly_limit: u32,

    #[serde(default = "defaults::shortener_timeout")]
    pub timeout_secs: u64,
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            endpoint: defaults::shortener_endpoint(),
            hourly_limit: defaults::hourly_limit(),
            timeout_secs: defaults::shortener_timeout(),
        }
    }
}

/// Social feed publisher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// API base URL
    #[serde(default = "defaults::publisher_endpoint")]
    pub endpoint: String,

    /// OAuth 2.0 user access token
    #[serde(default)]
    pub bearer_token: String,

    /// Maximum post length in characters
    #[serde(default = "defaults::max_length")]
    pub max_length: usize,

    #[serde(default = "defaults::publisher_timeout")]
    pub timeout_secs: u64,

    /// Sponsor "Last, First" to account handle
    #[serde(default)]
    pub handles: HashMap<String, String>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::publisher_endpoint(),
            bearer_token: String::new(),
            max_length: defaults::max_length(),
            timeout_secs: defaults::publisher_timeout(),
            handles: HashMap::new(),
        }
    }
}

/// Cycle timing and bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Pause between cycles in seconds
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Completed sleeps before the scheduler stops
    #[serde(default = "defaults::max_iterations")]
    pub max_iterations: u32,

    /// Ingest on the first cycle and then every N cycles
    #[serde(default = "defaults::ingest_every")]
    pub ingest_every: u32,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            max_iterations: defaults::max_iterations(),
            ingest_every: defaults::ingest_every(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub const MIN_POST_LENGTH: usize = 40;

    pub fn database_path() -> PathBuf {
        PathBuf::from("data/bills.db")
    }

    // Source defaults
    pub fn congress() -> u32 {
        115
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; billwatch/0.1)".into()
    }
    pub fn source_timeout() -> u64 {
        30
    }

    // Shortener defaults
    pub fn enabled() -> bool {
        true
    }
    pub fn shortener_endpoint() -> String {
        "https://is.gd/create.php".into()
    }
    pub fn hourly_limit() -> u32 {
        200
    }
    pub fn shortener_timeout() -> u64 {
        10
    }

    // Publisher defaults
    pub fn publisher_endpoint() -> String {
        "https://api.twitter.com/2".into()
    }
    pub fn max_length() -> usize {
        280
    }
    pub fn publisher_timeout() -> u64 {
        15
    }

    // Scheduler defaults
    pub fn interval() -> u64 {
        3600
    }
    pub fn max_iterations() -> u32 {
        9
    }
    pub fn ingest_every() -> u32 {
        1
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
