//! # Core Abstractions
//!
//! Error types and the service traits used for dependency injection.
//!
//! - **[`error`]**: error taxonomy (`ApiError`, `AuthError`, `ConfigError`, `StoreError`, `AppError`)
//! - **[`service`]**: seams to the outside world (`IdentityProvider`, `BackendApi`, `CredentialSource`, `LocalStore`)
//!
//! ## Dependency Injection
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stratmarket::core::service::{IdentityProvider, LocalStore};
//! use stratmarket::services::identity::HttpIdentityProvider;
//! use stratmarket::services::storage::MemoryStore;
//!
//! // In production: the HTTP identity provider
//! let identity: Arc<dyn IdentityProvider> =
//!     Arc::new(HttpIdentityProvider::new(Some("https://id.example.com"), Some("public-key")));
//!
//! // In tests: an in-memory store and a mock provider
//! let store: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());
//! ```

pub mod error;
pub mod service;

pub use error::{ApiError, AppError, AuthError, ConfigError, Result, StoreError};
pub use service::{BackendApi, CredentialSource, IdentityProvider, LocalStore};
