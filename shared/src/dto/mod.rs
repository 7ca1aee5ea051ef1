//! # Data Transfer Objects (DTOs)
//!
//! Data structures exchanged with the backend API and the identity service, plus
//! the small preference records the client persists locally.
//!
//! ## Module Organization
//!
//! - [`account`] - Backend account profile
//! - [`auth`] - Sign-in, sign-up, verification, recovery and user payloads
//! - [`subscription`] - Plan tier, limits and usage counters
//! - [`settings`] - Trading mode and cookie consent
//!
//! ## Example JSON Communication
//!
//! ```text
//! POST /auth/v1/token?grant_type=password
//! apikey: <public key>
//! Content-Type: application/json
//!
//! { "email": "alice@example.com", "password": "MyPassword123!" }
//! ```
//!
//! ```text
//! HTTP/1.1 200 OK
//! Content-Type: application/json
//!
//! {
//!   "access_token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...",
//!   "token_type": "bearer",
//!   "expires_in": 3600,
//!   "refresh_token": "v1.MWQ...",
//!   "user": { "id": "8d0f...", "email": "alice@example.com", "created_at": "2024-01-01T00:00:00Z" }
//! }
//! ```

pub mod account;
pub mod auth;
pub mod settings;
pub mod subscription;

pub use account::*;
pub use auth::*;
pub use settings::*;
pub use subscription::*;
