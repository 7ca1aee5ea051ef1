//! # Common Error Types
//!
//! Error taxonomy for the client core.
//!
//! ## Error Categories
//!
//! - [`AuthError`]: identity-service failures (bad credentials, unverified account,
//!   expired session). Surfaced directly to the initiating form.
//! - [`ApiError`]: backend request failures. Advisory providers swallow these into
//!   safe defaults; user-initiated actions show them inline.
//! - [`ConfigError`]: a required endpoint or key is missing at startup. Shown as a
//!   blocking notice since nothing else can function.
//! - [`StoreError`]: local persistence failures.
//!
//! [`AppError`] wraps all of them for callers that do not care which layer failed.
//!
//! ## Usage Pattern
//!
//! ```rust,no_run
//! use stratmarket::core::error::{ApiError, AppError};
//!
//! fn require_plan(plan: &str) -> Result<(), AppError> {
//!     if plan.is_empty() {
//!         return Err(AppError::Validation("Plan is required".to_string()));
//!     }
//!     Ok(())
//! }
//!
//! let err: AppError = ApiError::Network("connection refused".to_string()).into();
//! assert!(err.to_string().contains("connection refused"));
//! ```

use thiserror::Error;

/// Failure of a call made through the authenticated request client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Transport failure: DNS, connection refused, TLS, timeout or a CORS rejection.
    ///
    /// The message is user-facing and never carries a raw error chain.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response from the backend.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// HTTP 401, or a call marked `requires_auth` issued without a credential.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The backend base URL is not configured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request could not be built (e.g. a malformed header), nothing was sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 2xx response whose JSON did not match the expected shape.
    #[error("Failed to parse response: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status carried by the error, if the request reached the server.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::Unauthorized(_) => Some(401),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}

/// Failure of an identity operation (login, registration, callbacks, refresh).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email address has not been confirmed yet")]
    Unverified,

    #[error("Session expired, please sign in again")]
    SessionExpired,

    /// A newer identity operation was issued before this one completed.
    #[error("Request superseded by a newer sign-in attempt")]
    Superseded,

    /// The identity service refused the request with its own message.
    #[error("{0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// A missing or invalid startup setting.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Local persistence failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Input rejected before any request was made.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Convenience type alias for `Result<T, AppError>`.
pub type Result<T> = std::result::Result<T, AppError>;
