//! In-process doubles for the identity service and the backend, used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use shared::{IdentityUser, ProfileFields, SubscriptionSnapshot, UserMetadata};
use tokio::sync::Notify;

use crate::core::error::{ApiError, AuthError};
use crate::core::service::{BackendApi, IdentityProvider};
use crate::services::identity::{AuthGrant, Credential, SignUpOutcome};

/// Identity service keyed by email. Tokens embed the email so `fetch_user`
/// can resolve them: `access:<email>:<n>` and `refresh:<email>`.
#[derive(Default)]
pub(crate) struct MockIdentity {
    accounts: Mutex<HashMap<String, String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
    issued: AtomicU64,
    pub confirm_signups: AtomicBool,
    pub hang_fetch_user: AtomicBool,
    pub reject_refresh: AtomicBool,
    pub fetch_user_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub sign_outs: AtomicUsize,
}

impl MockIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, email: &str, password: &str) -> Self {
        self.accounts
            .lock()
            .insert(email.to_string(), password.to_string());
        self
    }

    /// Hold password sign-ins for `email` until the returned gate is notified.
    pub fn gate(&self, email: &str) -> Arc<Notify> {
        self.gates
            .lock()
            .entry(email.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    pub fn was_called(&self, call: &str) -> bool {
        self.calls.lock().iter().any(|c| c == call)
    }

    /// Yield until `call` has been recorded.
    pub async fn wait_for_call(&self, call: &str) {
        while !self.was_called(call) {
            tokio::task::yield_now().await;
        }
    }

    pub fn user(email: &str) -> IdentityUser {
        IdentityUser {
            id: format!("id-{}", email),
            email: Some(email.to_string()),
            phone: None,
            created_at: "2024-01-01T00:00:00Z".parse().unwrap(),
            email_confirmed_at: None,
            user_metadata: UserMetadata::default(),
            identities: Vec::new(),
        }
    }

    pub fn credential(email: &str, n: u64) -> Credential {
        Credential {
            access_token: format!("access:{}:{}", email, n),
            refresh_token: Some(format!("refresh:{}", email)),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            token_type: "bearer".to_string(),
        }
    }

    fn grant(&self, email: &str) -> AuthGrant {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        AuthGrant {
            credential: Self::credential(email, n),
            user: Some(Self::user(email)),
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

fn email_in(token: &str) -> Option<&str> {
    token.split(':').nth(1)
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthGrant, AuthError> {
        self.record(format!("sign_in:{}", email));
        let gate = self.gates.lock().get(email).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match self.accounts.lock().get(email) {
            Some(expected) if expected == password => {}
            _ => return Err(AuthError::InvalidCredentials),
        }
        Ok(self.grant(email))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _profile: &ProfileFields,
    ) -> Result<SignUpOutcome, AuthError> {
        self.record(format!("sign_up:{}", email));
        self.accounts
            .lock()
            .insert(email.to_string(), password.to_string());

        if self.confirm_signups.load(Ordering::SeqCst) {
            Ok(SignUpOutcome::ConfirmationRequired {
                email: email.to_string(),
            })
        } else {
            Ok(SignUpOutcome::Session(self.grant(email)))
        }
    }

    async fn verify_email(&self, token_hash: &str) -> Result<AuthGrant, AuthError> {
        self.record(format!("verify:{}", token_hash));
        Ok(self.grant(token_hash))
    }

    async fn exchange_code(&self, code: &str) -> Result<AuthGrant, AuthError> {
        self.record(format!("exchange:{}", code));
        Ok(self.grant(code))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthGrant, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_refresh.load(Ordering::SeqCst) {
            return Err(AuthError::SessionExpired);
        }
        let email = email_in(refresh_token).ok_or(AuthError::SessionExpired)?;
        Ok(self.grant(email))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<IdentityUser, AuthError> {
        self.fetch_user_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_fetch_user.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let email = email_in(access_token).ok_or(AuthError::SessionExpired)?;
        Ok(Self::user(email))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Err(AuthError::Network("offline".to_string()))
    }

    async fn request_password_reset(&self, email: &str, _redirect_to: Option<&str>) -> Result<(), AuthError> {
        self.record(format!("recover:{}", email));
        Ok(())
    }

    async fn update_password(&self, access_token: &str, new_password: &str) -> Result<(), AuthError> {
        let email = email_in(access_token).ok_or(AuthError::SessionExpired)?;
        self.record(format!("update_password:{}", email));
        self.accounts
            .lock()
            .insert(email.to_string(), new_password.to_string());
        Ok(())
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String, AuthError> {
        Ok(format!("https://id.test/authorize?provider={}&redirect_to={}", provider, redirect_to))
    }
}

/// Backend returning a configurable subscription result, optionally held behind a gate.
pub(crate) struct MockBackend {
    response: Mutex<Result<SubscriptionSnapshot, ApiError>>,
    gate: Mutex<Option<Arc<Notify>>>,
    pub calls: AtomicUsize,
}

impl MockBackend {
    pub fn returning(response: Result<SubscriptionSnapshot, ApiError>) -> Self {
        Self {
            response: Mutex::new(response),
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn pro() -> Self {
        Self::returning(Ok(pro_snapshot()))
    }

    pub fn set_response(&self, response: Result<SubscriptionSnapshot, ApiError>) {
        *self.response.lock() = response;
    }

    /// Hold every following fetch until the returned gate is notified.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Yield until at least `n` fetches have started.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.call_count() < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl BackendApi for MockBackend {
    async fn subscription_status(&self) -> Result<SubscriptionSnapshot, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.response.lock().clone()
    }
}

pub(crate) fn pro_snapshot() -> SubscriptionSnapshot {
    SubscriptionSnapshot {
        plan: "pro".to_string(),
        is_active: true,
        can_run_backtest: true,
        backtests_remaining: 100,
        ..SubscriptionSnapshot::free_tier()
    }
}
