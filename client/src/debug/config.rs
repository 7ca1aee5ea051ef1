//! Logging configuration from environment variables

use std::path::PathBuf;

pub const LOG_DIR_ENV: &str = "STRATMARKET_LOG_DIR";
pub const LOG_STDERR_ENV: &str = "STRATMARKET_LOG_STDERR";

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_LEVEL: &str = "stratmarket=info,warn";

/// Name of the rolling log file inside `log_dir`
pub const LOG_FILE_NAME: &str = "stratmarket.log";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugConfig {
    /// Directory for the daily-rolling log file
    pub log_dir: PathBuf,
    /// Log level filter (e.g., "stratmarket=debug,info")
    pub log_level: String,
    /// Mirror log output to stderr
    pub log_to_stderr: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_to_stderr: cfg!(feature = "debug-mode"),
        }
    }
}

impl DebugConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            log_dir: lookup(LOG_DIR_ENV)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            log_level: lookup("RUST_LOG")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.log_level),
            log_to_stderr: lookup(LOG_STDERR_ENV)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.log_to_stderr),
        }
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }

    /// Check if debug logging is enabled
    pub fn is_debug_enabled(&self) -> bool {
        self.log_level.contains("debug") || self.log_level.contains("trace")
    }
}
