//! # Shared Utility Functions
//!
//! ## Email Masking
//!
//! [`mask_email`] hides most of the local part of an address so that log lines
//! can identify an account without recording the full address.
//!
//! ```rust
//! use shared::utils::mask_email;
//!
//! assert_eq!(mask_email("alice@example.com"), "a***@example.com");
//! ```

/// Mask the local part of an email address, keeping its first character.
///
/// Input without an `@` is fully masked.
///
/// # Examples
///
/// ```rust
/// use shared::utils::mask_email;
///
/// assert_eq!(mask_email("bob@b.com"), "b***@b.com");
/// assert_eq!(mask_email("@b.com"), "***@b.com");
/// assert_eq!(mask_email("not-an-email"), "***");
/// ```
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{}***@{}", first, domain)
        }
        None => "***".to_string(),
    }
}
