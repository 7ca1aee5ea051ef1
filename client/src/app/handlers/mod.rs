//! # Event Handlers
//!
//! Command handlers organized by domain. Each validates its input
//! synchronously, shows failures inline, and otherwise spawns the work and
//! reports the result as an [`AppEvent`](crate::app::AppEvent).

pub mod auth;
pub mod settings;
