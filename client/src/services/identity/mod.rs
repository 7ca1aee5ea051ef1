//! # Identity Service Boundary
//!
//! Everything the client knows about the external identity service.
//!
//! ```text
//! identity/
//! ├── mod.rs          - Grant and sign-up outcome types
//! ├── credentials.rs  - Credential record and its persistence
//! └── http.rs         - IdentityProvider over the service's REST API
//! ```

pub mod credentials;
pub mod http;

use shared::IdentityUser;

pub use credentials::{Credential, CredentialStore};
pub use http::HttpIdentityProvider;

/// A credential issued by the identity service, with the user record when the
/// service included one in the same response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub credential: Credential,
    pub user: Option<IdentityUser>,
}

/// Result of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The account was confirmed immediately and a session issued
    Session(AuthGrant),
    /// A confirmation email was sent; no session yet
    ConfirmationRequired { email: String },
}
