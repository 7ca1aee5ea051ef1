//! # Authentication Handlers
//!
//! Handlers for login, registration, logout and the identity-service redirects.

use std::sync::Arc;

use async_channel::Sender;
use parking_lot::RwLock;
use shared::ProfileFields;

use crate::app::events::AppEvent;
use crate::app::state::{AuthForm, ViewState};
use crate::debug::spawn_tracked;
use crate::session::SessionStore;
use crate::utils::validation::{
    validate_email, validate_login, validate_password, validate_password_confirmation, validate_phone,
    ValidationResult,
};

/// Registration form contents
#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
}

impl RegisterForm {
    fn validate(&self) -> ValidationResult {
        ValidationResult::first_error([
            validate_email(&self.email),
            validate_password(&self.password),
            validate_password_confirmation(&self.password, &self.confirm_password),
            validate_phone(self.phone.as_deref()),
        ])
    }

    fn profile(&self) -> ProfileFields {
        let field = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        ProfileFields {
            name: field(&self.name),
            phone: field(&self.phone),
            country: field(&self.country),
        }
    }
}

/// Show the first validation failure inline. Returns whether input was valid.
fn accept(view: &RwLock<ViewState>, check: ValidationResult) -> bool {
    match check.error {
        Some(message) => {
            view.write().set_form_error(message);
            false
        }
        None => true,
    }
}

/// Handle login button click
///
/// Internal handler function - use [`crate::app::App::handle_login_click`] instead.
pub(crate) fn handle_login_click(
    view: Arc<RwLock<ViewState>>,
    event_tx: Sender<AppEvent>,
    session: Arc<SessionStore>,
    email: String,
    password: String,
) -> bool {
    if !accept(&view, validate_login(&email, &password)) {
        return false;
    }

    let email = email.trim().to_string();
    view.write().auth = AuthForm::Login {
        email: email.clone(),
        error: None,
    };

    spawn_tracked("login", async move {
        let _ = event_tx.send(AppEvent::Loading("Signing in...".to_string())).await;
        let result = session.login(&email, &password).await;
        let _ = event_tx.send(AppEvent::LoginResult(result)).await;
    });
    true
}

/// Handle registration submit
///
/// Internal handler function - use [`crate::app::App::handle_register_click`] instead.
pub(crate) fn handle_register_click(
    view: Arc<RwLock<ViewState>>,
    event_tx: Sender<AppEvent>,
    session: Arc<SessionStore>,
    form: RegisterForm,
) -> bool {
    if !accept(&view, form.validate()) {
        return false;
    }

    let email = form.email.trim().to_string();
    view.write().auth = AuthForm::Register {
        email: email.clone(),
        error: None,
    };

    spawn_tracked("register", async move {
        let _ = event_tx.send(AppEvent::Loading("Creating account...".to_string())).await;
        let result = session.register(&email, &form.password, &form.profile()).await;
        let _ = event_tx.send(AppEvent::RegisterResult(result)).await;
    });
    true
}

/// Handle logout click. Local state clears before the task even runs remote revocation.
pub(crate) fn handle_logout_click(event_tx: Sender<AppEvent>, session: Arc<SessionStore>) {
    spawn_tracked("logout", async move {
        session.logout().await;
        let _ = event_tx.send(AppEvent::LoggedOut).await;
    });
}

/// Handle the email-verification link
pub(crate) fn handle_verification_link(event_tx: Sender<AppEvent>, session: Arc<SessionStore>, token_hash: String) {
    spawn_tracked("verify_email", async move {
        let _ = event_tx.send(AppEvent::Loading("Confirming email...".to_string())).await;
        let result = session.complete_verification(&token_hash).await;
        let _ = event_tx.send(AppEvent::VerificationResult(result)).await;
    });
}

/// Handle the redirect back from an external sign-in
pub(crate) fn handle_external_callback(event_tx: Sender<AppEvent>, session: Arc<SessionStore>, code: String) {
    spawn_tracked("external_sign_in", async move {
        let _ = event_tx.send(AppEvent::Loading("Signing in...".to_string())).await;
        let result = session.complete_external_sign_in(&code).await;
        let _ = event_tx.send(AppEvent::ExternalSignInResult(result)).await;
    });
}

/// Handle "forgot password" submit
pub(crate) fn handle_reset_request(
    view: Arc<RwLock<ViewState>>,
    event_tx: Sender<AppEvent>,
    session: Arc<SessionStore>,
    email: String,
    redirect_to: Option<String>,
) -> bool {
    let email = email.trim().to_string();
    view.write().auth = AuthForm::ResetPassword {
        email: email.clone(),
        sent: false,
        error: None,
    };
    if !accept(&view, validate_email(&email)) {
        return false;
    }

    spawn_tracked("password_reset_request", async move {
        let _ = event_tx.send(AppEvent::Loading("Sending reset email...".to_string())).await;
        let result = session.request_password_reset(&email, redirect_to.as_deref()).await;
        let _ = event_tx.send(AppEvent::PasswordResetRequested(result)).await;
    });
    true
}

/// Handle the new-password form opened from a reset link
pub(crate) fn handle_reset_complete(
    view: Arc<RwLock<ViewState>>,
    event_tx: Sender<AppEvent>,
    session: Arc<SessionStore>,
    code: String,
    new_password: String,
    confirm_password: String,
) -> bool {
    let check = ValidationResult::first_error([
        validate_password(&new_password),
        validate_password_confirmation(&new_password, &confirm_password),
    ]);
    if !accept(&view, check) {
        return false;
    }

    spawn_tracked("password_reset", async move {
        let _ = event_tx.send(AppEvent::Loading("Updating password...".to_string())).await;
        let result = session.complete_password_reset(&code, &new_password).await;
        let _ = event_tx.send(AppEvent::PasswordResetResult(result)).await;
    });
    true
}

/// Switch to login form
pub(crate) fn handle_switch_to_login(view: &RwLock<ViewState>) {
    view.write().auth = AuthForm::default();
}

/// Switch to registration form
pub(crate) fn handle_switch_to_register(view: &RwLock<ViewState>) {
    view.write().auth = AuthForm::Register {
        email: String::new(),
        error: None,
    };
}

/// Switch to the password-reset form
pub(crate) fn handle_switch_to_reset(view: &RwLock<ViewState>) {
    view.write().auth = AuthForm::ResetPassword {
        email: String::new(),
        sent: false,
        error: None,
    };
}
