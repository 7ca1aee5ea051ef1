//! # Application Events
//!
//! Results of background commands, sent from spawned tasks to whoever drives
//! the view.

use std::sync::Arc;

use shared::{CookieConsent, SubscriptionSnapshot, TradingMode};

use crate::core::error::{AuthError, ConfigError};
use crate::session::{Registration, Session, SessionState};

/// Async task results sent to the view
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Startup session restoration finished
    Restored(SessionState),
    /// Login completed
    LoginResult(Result<Session, AuthError>),
    /// Registration completed
    RegisterResult(Result<Registration, AuthError>),
    /// Email-verification link handled
    VerificationResult(Result<Session, AuthError>),
    /// External (OAuth) sign-in redirect handled
    ExternalSignInResult(Result<Session, AuthError>),
    /// Password-reset email requested
    PasswordResetRequested(Result<(), AuthError>),
    /// New password set from a reset link
    PasswordResetResult(Result<Session, AuthError>),
    LoggedOut,
    SubscriptionUpdated(Arc<SubscriptionSnapshot>),
    TradingModeChanged(Result<TradingMode, String>),
    ConsentSaved(Result<CookieConsent, String>),
    /// Required settings are missing; nothing network-bound will work
    ConfigurationProblem(Vec<ConfigError>),
    /// Loading state
    Loading(String),
}

impl AppEvent {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::Restored(_) => "Restored",
            AppEvent::LoginResult(_) => "LoginResult",
            AppEvent::RegisterResult(_) => "RegisterResult",
            AppEvent::VerificationResult(_) => "VerificationResult",
            AppEvent::ExternalSignInResult(_) => "ExternalSignInResult",
            AppEvent::PasswordResetRequested(_) => "PasswordResetRequested",
            AppEvent::PasswordResetResult(_) => "PasswordResetResult",
            AppEvent::LoggedOut => "LoggedOut",
            AppEvent::SubscriptionUpdated(_) => "SubscriptionUpdated",
            AppEvent::TradingModeChanged(_) => "TradingModeChanged",
            AppEvent::ConsentSaved(_) => "ConsentSaved",
            AppEvent::ConfigurationProblem(_) => "ConfigurationProblem",
            AppEvent::Loading(_) => "Loading",
        }
    }
}
