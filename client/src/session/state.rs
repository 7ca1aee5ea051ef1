//! Session lifecycle states and the transitions allowed between them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::IdentityUser;

/// The signed-in identity as the rest of the client sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    /// When an external (OAuth) account was first linked, if ever
    pub external_linked_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn from_user(user: &IdentityUser) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone().unwrap_or_default(),
            name: user.user_metadata.name.clone(),
            phone: user
                .user_metadata
                .phone
                .clone()
                .or_else(|| user.phone.clone()),
            country: user.user_metadata.country.clone(),
            created_at: user.created_at,
            external_linked_at: user.external_linked_at(),
        }
    }

    /// Name to greet the user with: profile name, else the email's local part.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Restoration from persisted credentials has not finished
    Initializing,
    Unauthenticated,
    /// An account was created and is waiting for email confirmation
    PendingVerification { email: String },
    /// `generation` changes on every sign-in and stays fixed while the same
    /// sign-in is refreshed, so derived state can be scoped to it.
    Authenticated { session: Session, generation: u64 },
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Initializing => SessionPhase::Initializing,
            SessionState::Unauthenticated => SessionPhase::Unauthenticated,
            SessionState::PendingVerification { .. } => SessionPhase::PendingVerification,
            SessionState::Authenticated { .. } => SessionPhase::Authenticated,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated { session, .. } => Some(session),
            _ => None,
        }
    }

    pub fn generation(&self) -> Option<u64> {
        match self {
            SessionState::Authenticated { generation, .. } => Some(*generation),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, SessionState::Initializing)
    }
}

/// Payload-free view of [`SessionState`], used for transition checks and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    Initializing,
    Unauthenticated,
    PendingVerification,
    Authenticated,
}

impl SessionPhase {
    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Nothing ever returns to `Initializing`, and a signed-in session has to
    /// sign out before it can register another account.
    pub fn can_transition_to(self, next: SessionPhase) -> bool {
        use SessionPhase::*;

        if self == next {
            return true;
        }

        matches!(
            (self, next),
            (Initializing, Unauthenticated)
                | (Initializing, PendingVerification)
                | (Initializing, Authenticated)
                | (Unauthenticated, Authenticated)
                | (Unauthenticated, PendingVerification)
                | (PendingVerification, Authenticated)
                | (PendingVerification, Unauthenticated)
                | (Authenticated, Unauthenticated)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Initializing => "initializing",
            SessionPhase::Unauthenticated => "unauthenticated",
            SessionPhase::PendingVerification => "pending_verification",
            SessionPhase::Authenticated => "authenticated",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
