//! # Derived-State Providers
//!
//! Caches of state fetched or loaded on behalf of the session.
//!
//! - **[`subscription`]**: plan and usage limits, free tier when unknown
//! - **[`trading_mode`]**: crypto or stocks preference
//! - **[`consent`]**: cookie-consent choice
//! - **[`derived`]**: the token-guarded cell the fetched providers build on
//!
//! Every provider answers reads immediately with either its latest value or
//! a safe default. Fetch failures are logged, never raised.

pub mod consent;
pub mod derived;
pub mod subscription;
pub mod trading_mode;

pub use consent::ConsentStore;
pub use derived::DerivedState;
pub use subscription::SubscriptionProvider;
pub use trading_mode::TradingModeProvider;
