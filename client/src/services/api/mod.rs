//! # Backend API Client Module
//!
//! HTTP client for the marketplace backend.
//!
//! ## Module Structure
//!
//! ```text
//! api/
//! ├── mod.rs           - Module exports and documentation
//! ├── account.rs       - Account profile endpoint
//! ├── client.rs        - ApiClient, RequestDescriptor and error normalization
//! ├── subscription.rs  - Subscription status endpoint
//! └── system.rs        - Health probe
//! ```

pub mod account;
pub mod client;
pub mod subscription;
pub mod system;

pub use account::get_account_profile;
pub use client::{ApiClient, RequestDescriptor};
pub use subscription::get_subscription_status;
pub use system::get_health;
