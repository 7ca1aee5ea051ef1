//! # Service Layer
//!
//! Production implementations of the traits in [`crate::core::service`].
//!
//! ```text
//! services/
//! ├── api/        - Authenticated request client and backend endpoints
//! ├── identity/   - Identity service client and credential persistence
//! └── storage.rs  - Local key/value stores (memory and file backed)
//! ```

pub mod api;
pub mod identity;
pub mod storage;
