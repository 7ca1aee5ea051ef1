//! # Utility Functions
//!
//! - **[`validation`]**: form input validation (email, password, phone)
//!
//! See also [`shared::utils`] for helpers shared with other crates (email masking).

pub mod validation;
