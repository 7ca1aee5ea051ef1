//! # Client Configuration
//!
//! Startup configuration loaded from environment variables (and a `.env` file,
//! via `dotenvy`). Everything is resolved once when the [`crate::app::App`] is
//! built.
//!
//! Loading never fails: unset or malformed values fall back to safe defaults and
//! are reported by [`ClientConfig::validate`], so the application can render a
//! blocking configuration notice instead of crashing.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `STRATMARKET_API_URL` | unset |
//! | `STRATMARKET_AUTH_URL` | unset |
//! | `STRATMARKET_AUTH_KEY` | unset |
//! | `STRATMARKET_TRADING_MODE` | `crypto` |
//! | `STRATMARKET_STATE_DIR` | `.stratmarket` |
//! | `STRATMARKET_RESTORE_TIMEOUT_MS` | `5000` |
//! | `STRATMARKET_REQUEST_TIMEOUT_SECS` | `10` |

use std::path::PathBuf;
use std::time::Duration;

use shared::TradingMode;

use crate::core::error::ConfigError;

pub const API_URL_VAR: &str = "STRATMARKET_API_URL";
pub const AUTH_URL_VAR: &str = "STRATMARKET_AUTH_URL";
pub const AUTH_KEY_VAR: &str = "STRATMARKET_AUTH_KEY";
pub const TRADING_MODE_VAR: &str = "STRATMARKET_TRADING_MODE";
pub const STATE_DIR_VAR: &str = "STRATMARKET_STATE_DIR";
pub const RESTORE_TIMEOUT_VAR: &str = "STRATMARKET_RESTORE_TIMEOUT_MS";
pub const REQUEST_TIMEOUT_VAR: &str = "STRATMARKET_REQUEST_TIMEOUT_SECS";

const DEFAULT_RESTORE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Backend API base URL, without trailing slash
    pub api_url: Option<String>,

    /// Identity service base URL, without trailing slash
    pub auth_url: Option<String>,

    /// Public (anon) key sent to the identity service
    pub auth_key: Option<String>,

    /// Trading mode used until the user picks one
    pub default_trading_mode: TradingMode,

    /// Directory for file-backed local persistence
    pub state_dir: PathBuf,

    /// Upper bound on startup session restoration
    pub restore_timeout: Duration,

    /// Per-request transport timeout
    pub request_timeout: Duration,

    /// Problems found while parsing, reported by `validate`
    parse_issues: Vec<ConfigError>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            auth_url: None,
            auth_key: None,
            default_trading_mode: TradingMode::default(),
            state_dir: PathBuf::from(".stratmarket"),
            restore_timeout: Duration::from_millis(DEFAULT_RESTORE_TIMEOUT_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            parse_issues: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        config.api_url = read(API_URL_VAR).map(normalize_url);
        config.auth_url = read(AUTH_URL_VAR).map(normalize_url);
        config.auth_key = read(AUTH_KEY_VAR);

        if let Some(raw) = read(TRADING_MODE_VAR) {
            match raw.parse::<TradingMode>() {
                Ok(mode) => config.default_trading_mode = mode,
                Err(reason) => config.parse_issues.push(ConfigError::Invalid {
                    key: TRADING_MODE_VAR,
                    reason,
                }),
            }
        }

        if let Some(dir) = read(STATE_DIR_VAR) {
            config.state_dir = PathBuf::from(dir);
        }

        if let Some(raw) = read(RESTORE_TIMEOUT_VAR) {
            match raw.parse::<u64>() {
                Ok(ms) => config.restore_timeout = Duration::from_millis(ms),
                Err(e) => config.parse_issues.push(ConfigError::Invalid {
                    key: RESTORE_TIMEOUT_VAR,
                    reason: e.to_string(),
                }),
            }
        }

        if let Some(raw) = read(REQUEST_TIMEOUT_VAR) {
            match raw.parse::<u64>() {
                Ok(secs) => config.request_timeout = Duration::from_secs(secs),
                Err(e) => config.parse_issues.push(ConfigError::Invalid {
                    key: REQUEST_TIMEOUT_VAR,
                    reason: e.to_string(),
                }),
            }
        }

        config
    }

    /// Builder-style override of the backend URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(normalize_url(url.into()));
        self
    }

    /// Builder-style override of the identity service URL and key.
    pub fn with_auth(mut self, url: impl Into<String>, key: impl Into<String>) -> Self {
        self.auth_url = Some(normalize_url(url.into()));
        self.auth_key = Some(key.into());
        self
    }

    /// Check configuration values.
    ///
    /// Returns every problem found; an empty list means the client is fully usable.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut issues = self.parse_issues.clone();

        for (key, value) in [(API_URL_VAR, &self.api_url), (AUTH_URL_VAR, &self.auth_url)] {
            match value {
                None => issues.push(ConfigError::Missing(key)),
                Some(url) => {
                    if let Err(e) = reqwest::Url::parse(url) {
                        issues.push(ConfigError::Invalid {
                            key,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        if self.auth_key.is_none() {
            issues.push(ConfigError::Missing(AUTH_KEY_VAR));
        }

        if self.restore_timeout.is_zero() {
            issues.push(ConfigError::Invalid {
                key: RESTORE_TIMEOUT_VAR,
                reason: "must be greater than zero".to_string(),
            });
        }

        issues
    }
}

fn normalize_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
