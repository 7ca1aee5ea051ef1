//! # Application Context
//!
//! The [`App`] struct owns every long-lived service of the client and hands
//! out the handles the view needs. It is built once at startup and passed
//! around explicitly; nothing lives in globals.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  View (CLI or UI)                                          │
//! │  - handle_*_click() - user actions, validated inline       │
//! │  - next_event()     - command results, folded into view    │
//! │  - session.subscribe(), subscription.read(), ...           │
//! └──────────────┬──────────────────────────▲─────────────────┘
//!                │ spawn_tracked            │ async_channel
//! ┌──────────────▼──────────────────────────┴─────────────────┐
//! │  Handlers (auth, settings)                                 │
//! └──────────────┬────────────────────────────────────────────┘
//!                │
//! ┌──────────────▼────────────────────────────────────────────┐
//! │  SessionStore ◄── ApiClient ◄── SubscriptionProvider       │
//! │  (identity)       (requests)    TradingModeProvider        │
//! │                                 ConsentStore               │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Components
//!
//! - **[`App`]**: service container and action entry points
//! - **[`ViewState`]**: active auth form, inline errors, notices (see [`state`])
//! - **[`AppEvent`]**: results of background commands (see [`events`])
//! - **[`handlers`]**: user action handlers (auth, settings)

pub mod events;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use async_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use shared::{SubscriptionSnapshot, TradingMode};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::core::error::{ApiError, AppError, ConfigError};
use crate::core::service::{BackendApi, IdentityProvider, LocalStore};
use crate::providers::{ConsentStore, SubscriptionProvider, TradingModeProvider};
use crate::services::api::{ApiClient, RequestDescriptor};
use crate::services::identity::HttpIdentityProvider;
use crate::services::storage::{FileStore, MemoryStore};
use crate::session::{SessionState, SessionStore};

pub use events::AppEvent;
pub use handlers::auth::RegisterForm;
pub use state::{AuthForm, ViewState};

/// File under the state directory holding all persisted client state
pub const STATE_FILE: &str = "state.json";

/// Application context.
///
/// # Example
///
/// ```rust,no_run
/// use stratmarket::app::App;
/// use stratmarket::config::ClientConfig;
///
/// # async fn run() {
/// let app = App::from_config(ClientConfig::from_env());
/// let state = app.start().await;
///
/// app.handle_login_click("trader@example.com".into(), "secret".into());
/// while let Some(event) = app.next_event().await {
///     println!("{}", event.name());
/// }
/// # }
/// ```
pub struct App {
    config: ClientConfig,

    /// Identity state; the only writer of session state
    pub session: Arc<SessionStore>,

    /// Authenticated request client for view-level backend calls
    pub api: Arc<ApiClient>,

    pub subscription: Arc<SubscriptionProvider>,
    pub trading_mode: Arc<TradingModeProvider>,
    pub consent: Arc<ConsentStore>,

    /// Form and notice state for the view.
    ///
    /// Hold locks briefly; handlers write to it from the calling thread.
    pub view: Arc<RwLock<ViewState>>,

    config_issues: Vec<ConfigError>,
    event_tx: Sender<AppEvent>,
    event_rx: Receiver<AppEvent>,
    session_watch: Mutex<Option<JoinHandle<()>>>,
}

impl App {
    /// Build the production context: HTTP identity provider, HTTP backend and
    /// file-backed storage under `config.state_dir`.
    pub fn from_config(config: ClientConfig) -> Self {
        let identity = Arc::new(HttpIdentityProvider::with_timeout(
            config.auth_url.as_deref(),
            config.auth_key.as_deref(),
            config.request_timeout,
        ));
        let store = open_store(&config);
        Self::new(config, identity, store)
    }

    /// Build a context whose backend is reached through the [`ApiClient`].
    pub fn new(config: ClientConfig, identity: Arc<dyn IdentityProvider>, store: Arc<dyn LocalStore>) -> Self {
        Self::assemble(config, identity, store, None)
    }

    /// Build a context with an explicit backend (used by tests).
    pub fn with_backend(
        config: ClientConfig,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn LocalStore>,
        backend: Arc<dyn BackendApi>,
    ) -> Self {
        Self::assemble(config, identity, store, Some(backend))
    }

    fn assemble(
        config: ClientConfig,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn LocalStore>,
        backend: Option<Arc<dyn BackendApi>>,
    ) -> Self {
        let config_issues = config.validate();
        for issue in &config_issues {
            tracing::error!(issue = %issue, "Configuration problem");
        }

        let session = Arc::new(SessionStore::new(identity, store.clone(), config.restore_timeout));
        let api = Arc::new(
            ApiClient::new(config.api_url.as_deref(), config.request_timeout).with_credentials(session.clone()),
        );
        let backend = backend.unwrap_or_else(|| api.clone() as Arc<dyn BackendApi>);

        let subscription = Arc::new(SubscriptionProvider::new(backend, session.clone()));
        let trading_mode = Arc::new(TradingModeProvider::new(store.clone(), config.default_trading_mode));
        let consent = Arc::new(ConsentStore::new(store));

        let (event_tx, event_rx) = async_channel::unbounded();

        tracing::info!(
            api_url = ?config.api_url,
            auth_url = ?config.auth_url,
            trading_mode = %trading_mode.read(),
            "Application context created"
        );

        Self {
            config,
            session,
            api,
            subscription,
            trading_mode,
            consent,
            view: Arc::new(RwLock::new(ViewState::default())),
            config_issues,
            event_tx,
            event_rx,
            session_watch: Mutex::new(None),
        }
    }

    /// Start background work and restore the persisted session.
    ///
    /// Configuration problems are reported as a blocking notice first.
    /// Calling this again only returns the current session state.
    pub async fn start(&self) -> SessionState {
        {
            let mut watch = self.session_watch.lock();
            if watch.is_some() {
                return self.session.state();
            }
            *watch = Some(self.subscription.watch_session());
        }

        if !self.config_issues.is_empty() {
            self.publish(AppEvent::ConfigurationProblem(self.config_issues.clone()));
        }

        let state = self.session.restore().await;
        self.publish(AppEvent::Restored(state.clone()));
        state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Missing or invalid settings found at startup
    pub fn configuration_issues(&self) -> &[ConfigError] {
        &self.config_issues
    }

    /// Receiver of command results. Cloning it splits events between receivers.
    pub fn events(&self) -> Receiver<AppEvent> {
        self.event_rx.clone()
    }

    /// Get the event sender, for views that post their own events.
    pub fn event_tx(&self) -> Sender<AppEvent> {
        self.event_tx.clone()
    }

    /// Wait for the next command result and fold it into the view state.
    pub async fn next_event(&self) -> Option<AppEvent> {
        let event = self.event_rx.recv().await.ok()?;
        self.handle_event(&event);
        Some(event)
    }

    /// Fold a command result into the view state
    pub fn handle_event(&self, event: &AppEvent) {
        tracing::debug!(event = event.name(), "Processing event");
        self.view.write().apply(event);
    }

    fn publish(&self, event: AppEvent) {
        if self.event_tx.try_send(event).is_err() {
            tracing::warn!("Event channel closed");
        }
    }

    /// Issue a backend request through the authenticated client.
    pub async fn call(&self, descriptor: RequestDescriptor) -> Result<Value, ApiError> {
        self.api.call(descriptor).await
    }

    /// Current subscription snapshot (free tier when unknown)
    pub fn subscription(&self) -> Arc<SubscriptionSnapshot> {
        self.subscription.read()
    }

    /// Change the trading mode and reload session-scoped state.
    pub async fn set_trading_mode(&self, mode: TradingMode) -> Result<TradingMode, AppError> {
        handlers::settings::switch_trading_mode(&self.trading_mode, &self.session, &self.subscription, mode).await
    }

    // ========== Action Methods - Delegating to Handlers ==========

    /// Handle login button click. Returns false if the input was rejected inline.
    pub fn handle_login_click(&self, email: String, password: String) -> bool {
        handlers::auth::handle_login_click(
            self.view.clone(),
            self.event_tx.clone(),
            self.session.clone(),
            email,
            password,
        )
    }

    /// Handle registration submit. Returns false if the input was rejected inline.
    pub fn handle_register_click(&self, form: RegisterForm) -> bool {
        handlers::auth::handle_register_click(self.view.clone(), self.event_tx.clone(), self.session.clone(), form)
    }

    pub fn handle_logout_click(&self) {
        handlers::auth::handle_logout_click(self.event_tx.clone(), self.session.clone());
    }

    /// Handle an email-verification link
    pub fn handle_verification_link(&self, token_hash: String) {
        handlers::auth::handle_verification_link(self.event_tx.clone(), self.session.clone(), token_hash);
    }

    /// Handle the redirect back from an external sign-in
    pub fn handle_external_callback(&self, code: String) {
        handlers::auth::handle_external_callback(self.event_tx.clone(), self.session.clone(), code);
    }

    /// URL to open for an external sign-in with `provider`
    pub fn external_sign_in_url(&self, provider: &str, redirect_to: &str) -> Result<String, AppError> {
        Ok(self.session.external_sign_in_url(provider, redirect_to)?)
    }

    /// Handle "forgot password" submit. Returns false if the input was rejected inline.
    pub fn handle_reset_request(&self, email: String, redirect_to: Option<String>) -> bool {
        handlers::auth::handle_reset_request(
            self.view.clone(),
            self.event_tx.clone(),
            self.session.clone(),
            email,
            redirect_to,
        )
    }

    /// Handle the new-password form. Returns false if the input was rejected inline.
    pub fn handle_reset_complete(&self, code: String, new_password: String, confirm_password: String) -> bool {
        handlers::auth::handle_reset_complete(
            self.view.clone(),
            self.event_tx.clone(),
            self.session.clone(),
            code,
            new_password,
            confirm_password,
        )
    }

    pub fn handle_switch_to_login(&self) {
        handlers::auth::handle_switch_to_login(&self.view);
    }

    pub fn handle_switch_to_register(&self) {
        handlers::auth::handle_switch_to_register(&self.view);
    }

    pub fn handle_switch_to_reset(&self) {
        handlers::auth::handle_switch_to_reset(&self.view);
    }

    pub fn handle_trading_mode_change(&self, mode: TradingMode) {
        handlers::settings::handle_trading_mode_change(
            self.event_tx.clone(),
            self.trading_mode.clone(),
            self.session.clone(),
            self.subscription.clone(),
            mode,
        );
    }

    pub fn handle_cookie_choice(&self, accept_all: bool) {
        handlers::settings::handle_cookie_choice(self.event_tx.clone(), &self.consent, accept_all);
    }

    pub fn handle_subscription_refresh(&self) {
        handlers::settings::handle_subscription_refresh(self.event_tx.clone(), self.subscription.clone());
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if let Some(watch) = self.session_watch.lock().take() {
            watch.abort();
        }
    }
}

/// File-backed store under the state directory, or memory if it cannot be opened.
fn open_store(config: &ClientConfig) -> Arc<dyn LocalStore> {
    let path = config.state_dir.join(STATE_FILE);
    match FileStore::open(&path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Local state unreadable, falling back to in-memory storage"
            );
            Arc::new(MemoryStore::new())
        }
    }
}
