//! # Shared Data Transfer Objects Library
//!
//! This library defines the wire contract between the StratMarket client core and
//! the two remote services it talks to: the marketplace backend API and the
//! identity service. All DTOs use JSON serialization via `serde`.
//!
//! ## Structure
//!
//! - **[`dto`]**: Data Transfer Objects
//!   - **[`dto::auth`]**: Identity-service requests, token payloads and user records
//!   - **[`dto::subscription`]**: Subscription snapshot returned by the backend
//!   - **[`dto::settings`]**: Locally persisted preferences (trading mode, cookie consent)
//! - **[`utils`]**: Shared utility functions
//!   - **[`utils::mask_email`]**: Mask an email address for log output
//!
//! ## Wire Format
//!
//! - Identity-service DTOs use **snake_case** field names (the service's convention)
//! - Backend DTOs use **camelCase** field names (`#[serde(rename_all = "camelCase")]`)
//! - Optional fields are omitted from JSON when `None`
//!
//! ## Usage
//!
//! ```rust
//! use shared::dto::subscription::SubscriptionSnapshot;
//!
//! let snapshot = SubscriptionSnapshot::free_tier();
//! assert_eq!(snapshot.plan, "free");
//! assert_eq!(snapshot.backtests_remaining, 3);
//! ```

pub mod dto;
pub mod utils;

// Wildcard re-exports: shared is a DTO library where all exports are public API
pub use dto::*;
pub use utils::*;
