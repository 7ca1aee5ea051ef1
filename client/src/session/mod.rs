//! # Session
//!
//! Identity state for the whole client.
//!
//! ```text
//! session/
//! ├── mod.rs    - Re-exports
//! ├── state.rs  - SessionState, Session and the transition rules
//! └── store.rs  - SessionStore: restore, login, register, logout, callbacks
//! ```
//!
//! [`SessionStore`] is the only writer of session state. Readers take
//! snapshots with [`SessionStore::state`] or follow changes through
//! [`SessionStore::subscribe`].

pub mod state;
pub mod store;

pub use state::{Session, SessionPhase, SessionState};
pub use store::{Registration, SessionStore};
