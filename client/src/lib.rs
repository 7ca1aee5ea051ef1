//! # StratMarket Client Core - Library Root
//!
//! Session and API orchestration for the strategy marketplace front end.
//! This library crate contains everything below the view layer; the
//! `stratmarket` binary (`main.rs`) is a thin command-line view on top of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │              stratmarket (this crate)                  │
//! ├────────────────────────────────────────────────────────┤
//! │  app        - Context, handlers, events, view state    │
//! │  session    - Identity state machine                   │
//! │  providers  - Subscription, trading mode, consent      │
//! │  services   - HTTP clients and local storage           │
//! └────────────────────────────────────────────────────────┘
//!          │                              │
//!          │ HTTP (bearer)                │ HTTP (apikey)
//!          ▼                              ▼
//! ┌─────────────────┐          ┌─────────────────────────┐
//! │  Backend API    │          │   Identity service      │
//! │  (marketplace)  │          │   (/auth/v1)            │
//! └─────────────────┘          └─────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - **app**: [`App`] context built once at startup and passed explicitly
//! - **session**: [`SessionStore`](session::SessionStore), the only writer of
//!   session state. Overlapping identity operations settle on the last one issued.
//! - **providers**: derived state that answers reads immediately with a value
//!   or a safe default (free tier, default trading mode)
//! - **services**: `api` (authenticated request client), `identity` (identity
//!   service client, credential persistence), `storage` (local key/value)
//! - **config**: environment configuration and its validation
//! - **core**: error types and the service traits used for dependency injection
//! - **debug**: file logging and task tracking
//! - **utils**: form validation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stratmarket::app::App;
//! use stratmarket::config::ClientConfig;
//!
//! # async fn run() {
//! let app = App::from_config(ClientConfig::from_env());
//! app.start().await;
//!
//! if let Ok(session) = app.session.login("trader@example.com", "secret").await {
//!     println!("Signed in as {}", session.display_name());
//! }
//! println!("Plan: {}", app.subscription().plan);
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test -p stratmarket-client
//! ```

pub mod app;
pub mod config;
pub mod core;
pub mod debug;
pub mod providers;
pub mod services;
pub mod session;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types for convenience
pub use app::{App, AppEvent};
pub use config::ClientConfig;
pub use self::core::{AppError, Result};
pub use session::{Session, SessionState};
