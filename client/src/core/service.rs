//! # Service Traits
//!
//! Seams between the client core and the outside world. Each trait has one
//! production implementation in [`crate::services`] and is mocked in tests.

use async_trait::async_trait;
use shared::{IdentityUser, ProfileFields, SubscriptionSnapshot};

use crate::core::error::{ApiError, AuthError, StoreError};
use crate::services::identity::{AuthGrant, SignUpOutcome};

/// The external identity service.
///
/// Implementations are stateless with respect to credentials: every grant is
/// returned to the caller, and only the session store decides whether to keep it.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange email and password for a credential
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthGrant, AuthError>;

    /// Create an account
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &ProfileFields,
    ) -> Result<SignUpOutcome, AuthError>;

    /// Exchange the token from an email-verification link for a credential
    async fn verify_email(&self, token_hash: &str) -> Result<AuthGrant, AuthError>;

    /// Exchange an authorization code (OAuth or password-reset redirect) for a credential
    async fn exchange_code(&self, code: &str) -> Result<AuthGrant, AuthError>;

    /// Trade a refresh token for a fresh credential
    async fn refresh(&self, refresh_token: &str) -> Result<AuthGrant, AuthError>;

    /// Current user for an access token
    async fn fetch_user(&self, access_token: &str) -> Result<IdentityUser, AuthError>;

    /// Revoke the credential server-side
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Send a password-reset email
    async fn request_password_reset(&self, email: &str, redirect_to: Option<&str>) -> Result<(), AuthError>;

    /// Set a new password for the user owning `access_token`
    async fn update_password(&self, access_token: &str, new_password: &str) -> Result<(), AuthError>;

    /// URL that starts an external (OAuth) sign-in
    fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String, AuthError>;
}

/// Backend endpoints consumed by the derived-state providers.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Subscription snapshot for the signed-in user
    async fn subscription_status(&self) -> Result<SubscriptionSnapshot, ApiError>;
}

/// Supplies bearer credentials to the request client.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Current access token, if a session is held
    async fn bearer_token(&self) -> Option<String>;

    /// Called when the backend rejected `token` with HTTP 401
    fn on_unauthorized(&self, token: &str);
}

/// Durable client-side key/value persistence.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
