//! # View State
//!
//! What the view renders besides the session itself: the active auth form
//! with its inline error, a loading message and blocking notices.
//!
//! Errors follow one rule: failures of a user-initiated action show inline on
//! the form that started it, a missing configuration shows as a blocking
//! notice, and background (advisory) failures never show at all.

use crate::app::events::AppEvent;
use crate::core::error::AuthError;
use crate::session::Registration;

/// Authentication sub-state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthForm {
    Login {
        email: String,
        error: Option<String>,
    },
    Register {
        email: String,
        error: Option<String>,
    },
    /// Registered; waiting for the emailed confirmation link
    AwaitingVerification { email: String },
    ResetPassword {
        email: String,
        sent: bool,
        error: Option<String>,
    },
}

impl Default for AuthForm {
    fn default() -> Self {
        AuthForm::Login {
            email: String::new(),
            error: None,
        }
    }
}

impl AuthForm {
    pub fn error(&self) -> Option<&str> {
        match self {
            AuthForm::Login { error, .. }
            | AuthForm::Register { error, .. }
            | AuthForm::ResetPassword { error, .. } => error.as_deref(),
            AuthForm::AwaitingVerification { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub auth: AuthForm,
    pub loading: Option<String>,
    /// Blocking configuration notice
    pub notice: Option<String>,
    /// Inline error on the settings panel
    pub settings_error: Option<String>,
}

impl ViewState {
    /// Show `message` inline on whichever auth form is active.
    pub fn set_form_error(&mut self, message: impl Into<String>) {
        let message = Some(message.into());
        match &mut self.auth {
            AuthForm::Login { error, .. }
            | AuthForm::Register { error, .. }
            | AuthForm::ResetPassword { error, .. } => *error = message,
            AuthForm::AwaitingVerification { email } => {
                self.auth = AuthForm::Login {
                    email: std::mem::take(email),
                    error: message,
                };
            }
        }
    }

    fn auth_failed(&mut self, error: &AuthError) {
        // A superseded attempt was replaced by a newer one the user started
        if *error != AuthError::Superseded {
            self.set_form_error(error.to_string());
        }
    }

    /// Fold a command result into the view.
    pub fn apply(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Loading(message) => {
                self.loading = Some(message.clone());
                return;
            }
            AppEvent::LoginResult(Ok(session))
            | AppEvent::VerificationResult(Ok(session))
            | AppEvent::ExternalSignInResult(Ok(session))
            | AppEvent::PasswordResetResult(Ok(session)) => {
                self.auth = AuthForm::Login {
                    email: session.email.clone(),
                    error: None,
                };
            }
            AppEvent::LoginResult(Err(e))
            | AppEvent::VerificationResult(Err(e))
            | AppEvent::ExternalSignInResult(Err(e))
            | AppEvent::PasswordResetResult(Err(e))
            | AppEvent::RegisterResult(Err(e))
            | AppEvent::PasswordResetRequested(Err(e)) => self.auth_failed(e),
            AppEvent::RegisterResult(Ok(Registration::VerificationPending { email })) => {
                self.auth = AuthForm::AwaitingVerification { email: email.clone() };
            }
            AppEvent::RegisterResult(Ok(Registration::SignedIn(session))) => {
                self.auth = AuthForm::Login {
                    email: session.email.clone(),
                    error: None,
                };
            }
            AppEvent::PasswordResetRequested(Ok(())) => {
                if let AuthForm::ResetPassword { sent, error, .. } = &mut self.auth {
                    *sent = true;
                    *error = None;
                }
            }
            AppEvent::TradingModeChanged(result) => {
                self.settings_error = result.as_ref().err().cloned();
            }
            AppEvent::ConsentSaved(result) => {
                self.settings_error = result.as_ref().err().cloned();
            }
            AppEvent::ConfigurationProblem(issues) => {
                let details: Vec<String> = issues.iter().map(ToString::to_string).collect();
                self.notice = Some(format!("Configuration error: {}", details.join("; ")));
            }
            AppEvent::Restored(_) | AppEvent::LoggedOut | AppEvent::SubscriptionUpdated(_) => {}
        }
        self.loading = None;
    }
}
