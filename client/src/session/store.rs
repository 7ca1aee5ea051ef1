//! The session store: sole owner of identity state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use shared::{mask_email, ProfileFields};
use tokio::sync::{watch, OnceCell};

use crate::core::error::AuthError;
use crate::core::service::{CredentialSource, IdentityProvider, LocalStore};
use crate::services::identity::{AuthGrant, Credential, CredentialStore, SignUpOutcome};
use crate::session::state::{Session, SessionPhase, SessionState};

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// The identity service confirmed the account immediately
    SignedIn(Session),
    /// A confirmation email was sent to `email`
    VerificationPending { email: String },
}

/// Proof that a result belongs to the newest identity operation.
///
/// `issued` is the operation counter at issue time. Background work
/// (credential refresh, identity reload) does not issue a new number; it also
/// records the state epoch so that any state change made while it ran makes
/// its result stale.
#[derive(Debug, Clone, Copy)]
struct Ticket {
    issued: u64,
    epoch: Option<u64>,
}

#[derive(Debug, Default)]
struct Ledger {
    /// Bumped on every committed state change
    epoch: u64,
    /// Bumped on every sign-in
    generation: u64,
}

enum Transition {
    SignedIn(Session),
    IdentityRefreshed(Session),
    SignedOut,
    VerificationPending(String),
}

impl Transition {
    fn phase(&self) -> SessionPhase {
        match self {
            Transition::SignedIn(_) | Transition::IdentityRefreshed(_) => SessionPhase::Authenticated,
            Transition::SignedOut => SessionPhase::Unauthenticated,
            Transition::VerificationPending(_) => SessionPhase::PendingVerification,
        }
    }
}

enum CredentialChange {
    Keep,
    Save(Credential),
    Clear,
}

/// Owns the session state machine and the held credential.
///
/// Every identity operation (login, register, logout, callbacks) takes a
/// monotonically increasing ticket when issued. Its result is applied only if
/// no newer operation was issued meanwhile, so overlapping calls always settle
/// on the outcome of the last one issued. State is published on a
/// [`watch`] channel.
pub struct SessionStore {
    identity: Arc<dyn IdentityProvider>,
    credentials: CredentialStore,
    state: watch::Sender<SessionState>,
    issued: AtomicU64,
    ledger: Mutex<Ledger>,
    refresh_lock: tokio::sync::Mutex<()>,
    restored: OnceCell<()>,
    restore_timeout: Duration,
}

impl SessionStore {
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn LocalStore>, restore_timeout: Duration) -> Self {
        let (state, _) = watch::channel(SessionState::Initializing);
        Self {
            identity,
            credentials: CredentialStore::new(store),
            state,
            issued: AtomicU64::new(0),
            ledger: Mutex::new(Ledger::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
            restored: OnceCell::new(),
            restore_timeout,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolve once the state has left `Initializing`.
    pub async fn wait_until_settled(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(SessionState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }

    // ------------------------------------------------------------------
    // Restoration
    // ------------------------------------------------------------------

    /// Resume the persisted session, if any.
    ///
    /// Runs at most once per store; later calls return the current state.
    /// Always settles within the configured timeout. A credential that cannot
    /// be checked in time, or because the identity service is unreachable, is
    /// kept for the next launch and the session starts signed out.
    pub async fn restore(&self) -> SessionState {
        self.restored.get_or_init(|| self.run_restore()).await;
        self.state()
    }

    async fn run_restore(&self) {
        if self.state.borrow().is_settled() {
            tracing::debug!("Session already settled, skipping restore");
            return;
        }

        let ticket = self.issue();
        let start = Instant::now();

        let (transition, credential) = match tokio::time::timeout(self.restore_timeout, self.resume_persisted()).await
        {
            Ok(Ok(Some((credential, session)))) => {
                (Transition::SignedIn(session), CredentialChange::Save(credential))
            }
            Ok(Ok(None)) => (Transition::SignedOut, CredentialChange::Keep),
            Ok(Err(e @ (AuthError::Network(_) | AuthError::Configuration(_)))) => {
                tracing::warn!(error = %e, "Could not verify persisted credential, starting signed out");
                (Transition::SignedOut, CredentialChange::Keep)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Persisted credential rejected");
                (Transition::SignedOut, CredentialChange::Clear)
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.restore_timeout.as_millis(),
                    "Session restore timed out, starting signed out"
                );
                (Transition::SignedOut, CredentialChange::Keep)
            }
        };

        if !self.commit(ticket, Some(transition), credential) {
            // An operation issued meanwhile owns the outcome, but the startup
            // phase must still end within the timeout
            self.settle_signed_out();
        }
        tracing::info!(
            state = %self.state.borrow().phase(),
            duration_ms = start.elapsed().as_millis(),
            "Session restore finished"
        );
    }

    async fn resume_persisted(&self) -> Result<Option<(Credential, Session)>, AuthError> {
        let Some(mut credential) = self.credentials.load() else {
            return Ok(None);
        };

        if credential.is_expired(Utc::now()) {
            let refresh_token = credential
                .refresh_token
                .clone()
                .ok_or(AuthError::SessionExpired)?;
            credential = self.identity.refresh(&refresh_token).await?.credential;
        }

        let user = self.identity.fetch_user(&credential.access_token).await?;
        Ok(Some((credential, Session::from_user(&user))))
    }

    // ------------------------------------------------------------------
    // Identity operations
    // ------------------------------------------------------------------

    /// Sign in with email and password.
    ///
    /// A failure leaves the state unchanged. Returns
    /// [`AuthError::Superseded`] when a newer identity operation was issued
    /// before this one completed.
    #[tracing::instrument(skip_all, fields(email = %mask_email(email)))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let ticket = self.issue();
        let start = Instant::now();

        let result = match self.identity.sign_in_with_password(email, password).await {
            Ok(grant) => self.establish(ticket, grant).await,
            Err(e) => Err(e),
        };
        self.finish("login", start, result)
    }

    /// Create an account.
    ///
    /// Depending on the identity service this either signs in immediately or
    /// moves to `PendingVerification` until the emailed link is followed.
    #[tracing::instrument(skip_all, fields(email = %mask_email(email)))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        profile: &ProfileFields,
    ) -> Result<Registration, AuthError> {
        if self.state.borrow().is_authenticated() {
            return Err(AuthError::Rejected(
                "Sign out before creating another account".to_string(),
            ));
        }

        let ticket = self.issue();
        let start = Instant::now();

        let result = match self.identity.sign_up(email, password, profile).await {
            Ok(SignUpOutcome::Session(grant)) => self.establish(ticket, grant).await.map(Registration::SignedIn),
            Ok(SignUpOutcome::ConfirmationRequired { email }) => {
                let pending = Transition::VerificationPending(email.clone());
                if self.commit(ticket, Some(pending), CredentialChange::Keep) {
                    Ok(Registration::VerificationPending { email })
                } else {
                    Err(AuthError::Superseded)
                }
            }
            Err(e) => Err(e),
        };
        self.finish("register", start, result)
    }

    /// Complete sign-up from an email-verification link.
    #[tracing::instrument(skip_all)]
    pub async fn complete_verification(&self, token_hash: &str) -> Result<Session, AuthError> {
        let ticket = self.issue();
        let start = Instant::now();

        let result = match self.identity.verify_email(token_hash).await {
            Ok(grant) => self.establish(ticket, grant).await,
            Err(e) => Err(e),
        };
        self.finish("verify_email", start, result)
    }

    /// Complete an external (OAuth) sign-in from its redirect code.
    #[tracing::instrument(skip_all)]
    pub async fn complete_external_sign_in(&self, code: &str) -> Result<Session, AuthError> {
        let ticket = self.issue();
        let start = Instant::now();

        let result = match self.identity.exchange_code(code).await {
            Ok(grant) => self.establish(ticket, grant).await,
            Err(e) => Err(e),
        };
        self.finish("external_sign_in", start, result)
    }

    /// URL that starts an external sign-in with `provider`.
    pub fn external_sign_in_url(&self, provider: &str, redirect_to: &str) -> Result<String, AuthError> {
        self.identity.authorize_url(provider, redirect_to)
    }

    /// Send a password-reset email. Does not touch the session.
    #[tracing::instrument(skip_all, fields(email = %mask_email(email)))]
    pub async fn request_password_reset(&self, email: &str, redirect_to: Option<&str>) -> Result<(), AuthError> {
        self.identity
            .request_password_reset(email, redirect_to)
            .await
            .inspect(|_| tracing::info!("Password reset email requested"))
            .inspect_err(|e| tracing::warn!(error = %e, "Password reset request failed"))
    }

    /// Set a new password from a reset link's code and sign in with it.
    #[tracing::instrument(skip_all)]
    pub async fn complete_password_reset(&self, code: &str, new_password: &str) -> Result<Session, AuthError> {
        let ticket = self.issue();
        let start = Instant::now();

        let result = async {
            let grant = self.identity.exchange_code(code).await?;
            self.identity
                .update_password(&grant.credential.access_token, new_password)
                .await?;
            self.establish(ticket, grant).await
        }
        .await;
        self.finish("password_reset", start, result)
    }

    /// Sign out.
    ///
    /// Local state and the held credential are cleared immediately; the
    /// remote revocation runs afterwards and its failure is only logged.
    #[tracing::instrument(skip_all)]
    pub async fn logout(&self) {
        let ticket = self.issue();
        let credential = self.credentials.load();

        self.commit(ticket, Some(Transition::SignedOut), CredentialChange::Clear);

        if let Some(credential) = credential {
            match self.identity.sign_out(&credential.access_token).await {
                Ok(()) => tracing::debug!("Credential revoked"),
                Err(e) => tracing::warn!(error = %e, "Remote sign-out failed, local session already cleared"),
            }
        }
    }

    /// Reload the signed-in user's profile without starting a new session.
    ///
    /// Returns `Ok(None)` when nobody is signed in.
    #[tracing::instrument(skip_all)]
    pub async fn refresh_identity(&self) -> Result<Option<Session>, AuthError> {
        if !self.state.borrow().is_authenticated() {
            return Ok(None);
        }

        let ticket = self.observe();
        let Some(token) = self.access_token().await else {
            return Ok(None);
        };

        match self.identity.fetch_user(&token).await {
            Ok(user) => {
                let session = Session::from_user(&user);
                let refreshed = Transition::IdentityRefreshed(session.clone());
                if self.commit(ticket, Some(refreshed), CredentialChange::Keep) {
                    Ok(Some(session))
                } else {
                    Err(AuthError::Superseded)
                }
            }
            Err(AuthError::SessionExpired) => {
                self.expire_token(&token);
                Err(AuthError::SessionExpired)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Identity reload failed");
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Credential access
    // ------------------------------------------------------------------

    /// The current bearer token, refreshed first if it has expired.
    ///
    /// `None` unless authenticated. A refresh the identity service rejects
    /// ends the session; one that fails in transit does not.
    pub async fn access_token(&self) -> Option<String> {
        if !self.state.borrow().is_authenticated() {
            return None;
        }
        let credential = self.credentials.load()?;
        if !credential.is_expired(Utc::now()) {
            return Some(credential.access_token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        let credential = self.credentials.load()?;
        if !credential.is_expired(Utc::now()) {
            return Some(credential.access_token);
        }

        let ticket = self.observe();
        let Some(refresh_token) = credential.refresh_token.clone() else {
            self.expire_token(&credential.access_token);
            return None;
        };

        match self.identity.refresh(&refresh_token).await {
            Ok(grant) => {
                let token = grant.credential.access_token.clone();
                if self.commit(ticket, None, CredentialChange::Save(grant.credential)) {
                    tracing::debug!("Credential refreshed");
                    Some(token)
                } else {
                    None
                }
            }
            Err(e @ AuthError::Network(_)) => {
                tracing::warn!(error = %e, "Credential refresh failed in transit");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Credential refresh rejected");
                self.expire_token(&credential.access_token);
                None
            }
        }
    }

    /// End the session if `token` is still the held credential.
    ///
    /// A rejection of a credential that has since been replaced is ignored.
    pub fn expire_token(&self, token: &str) -> bool {
        let mut ledger = self.ledger.lock();
        let held = self.credentials.load();
        if held.as_ref().map(|c| c.access_token.as_str()) != Some(token) {
            tracing::debug!("Ignoring rejection of a credential no longer held");
            return false;
        }
        self.expire_locked(&mut ledger)
    }

    /// Leave `Initializing` for `Unauthenticated` regardless of tickets.
    ///
    /// Does nothing once the state has settled.
    fn settle_signed_out(&self) {
        let mut ledger = self.ledger.lock();
        if self.state.borrow().is_settled() {
            return;
        }
        ledger.epoch += 1;
        self.state.send_replace(SessionState::Unauthenticated);
        tracing::info!(from = %SessionPhase::Initializing, to = %SessionPhase::Unauthenticated, "Session state changed");
    }

    fn expire_locked(&self, ledger: &mut Ledger) -> bool {
        if !self.state.borrow().is_authenticated() {
            return false;
        }
        if let Err(e) = self.credentials.clear() {
            tracing::warn!(error = %e, "Failed to clear persisted credential");
        }
        ledger.epoch += 1;
        self.state.send_replace(SessionState::Unauthenticated);
        tracing::warn!("Session expired");
        true
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn issue(&self) -> Ticket {
        Ticket {
            issued: self.issued.fetch_add(1, Ordering::SeqCst) + 1,
            epoch: None,
        }
    }

    fn observe(&self) -> Ticket {
        let ledger = self.ledger.lock();
        Ticket {
            issued: self.issued.load(Ordering::SeqCst),
            epoch: Some(ledger.epoch),
        }
    }

    async fn establish(&self, ticket: Ticket, grant: AuthGrant) -> Result<Session, AuthError> {
        let user = match self.identity.fetch_user(&grant.credential.access_token).await {
            Ok(user) => user,
            Err(e) => match grant.user.clone() {
                Some(user) => {
                    tracing::debug!(error = %e, "Using user record from the grant");
                    user
                }
                None => return Err(e),
            },
        };

        let session = Session::from_user(&user);
        if self.commit(
            ticket,
            Some(Transition::SignedIn(session.clone())),
            CredentialChange::Save(grant.credential),
        ) {
            Ok(session)
        } else {
            Err(AuthError::Superseded)
        }
    }

    fn finish<T>(
        &self,
        operation: &'static str,
        start: Instant,
        result: Result<T, AuthError>,
    ) -> Result<T, AuthError> {
        let duration_ms = start.elapsed().as_millis();
        match &result {
            Ok(_) => tracing::info!(operation, duration_ms, "Identity operation succeeded"),
            Err(AuthError::Superseded) => {
                tracing::debug!(operation, duration_ms, "Identity operation superseded")
            }
            Err(e) => {
                tracing::warn!(operation, duration_ms, error = %e, "Identity operation failed");
                // A failure during startup still has to settle the state
                self.settle_signed_out();
            }
        }
        result
    }

    /// Apply a result if `ticket` is still current. Returns whether it was applied.
    fn commit(&self, ticket: Ticket, transition: Option<Transition>, credential: CredentialChange) -> bool {
        let mut ledger = self.ledger.lock();

        let stale = self.issued.load(Ordering::SeqCst) != ticket.issued
            || ticket.epoch.is_some_and(|epoch| epoch != ledger.epoch);
        if stale {
            tracing::debug!(ticket = ticket.issued, "Discarding superseded session result");
            return false;
        }

        let current = self.state.borrow().phase();
        if let Some(transition) = &transition {
            let refresh_without_session =
                matches!(transition, Transition::IdentityRefreshed(_)) && current != SessionPhase::Authenticated;
            if refresh_without_session || !current.can_transition_to(transition.phase()) {
                tracing::warn!(from = %current, to = %transition.phase(), "Rejected session transition");
                return false;
            }
        }

        let persisted = match credential {
            CredentialChange::Keep => Ok(()),
            CredentialChange::Save(credential) => self.credentials.save(credential),
            CredentialChange::Clear => self.credentials.clear(),
        };
        if let Err(e) = persisted {
            tracing::warn!(error = %e, "Failed to persist credential change");
        }

        let Some(transition) = transition else {
            return true;
        };

        let next = match transition {
            Transition::SignedIn(session) => {
                ledger.generation += 1;
                SessionState::Authenticated {
                    session,
                    generation: ledger.generation,
                }
            }
            Transition::IdentityRefreshed(session) => {
                let generation = self.state.borrow().generation().unwrap_or(ledger.generation);
                SessionState::Authenticated { session, generation }
            }
            Transition::SignedOut => SessionState::Unauthenticated,
            Transition::VerificationPending(email) => SessionState::PendingVerification { email },
        };

        ledger.epoch += 1;
        tracing::info!(from = %current, to = %next.phase(), "Session state changed");
        self.state.send_replace(next);
        true
    }
}

#[async_trait]
impl CredentialSource for SessionStore {
    async fn bearer_token(&self) -> Option<String> {
        self.access_token().await
    }

    fn on_unauthorized(&self, token: &str) {
        self.expire_token(token);
    }
}
