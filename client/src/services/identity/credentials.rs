//! Credential record and its persistence.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared::TokenResponse;

use crate::core::error::StoreError;
use crate::core::service::LocalStore;
use crate::services::storage::CREDENTIAL_KEY;

/// Tokens are treated as expired this long before their real expiry.
const EXPIRY_LEEWAY_SECS: i64 = 30;

/// Bearer token plus refresh metadata.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub token_type: String,
}

impl Credential {
    /// Build a credential from a grant payload received at `now`.
    pub fn from_token_response(response: &TokenResponse, now: DateTime<Utc>) -> Self {
        let expires_at = response
            .expires_at
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .or_else(|| response.expires_in.map(|secs| now + Duration::seconds(secs)));

        Self {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            expires_at,
            token_type: response.token_type.clone(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expiry| expiry - Duration::seconds(EXPIRY_LEEWAY_SECS) <= now)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// The auth mechanism's own credential persistence.
///
/// Holds the live credential in memory and mirrors it into the local store so a
/// reload can restore the session.
pub struct CredentialStore {
    store: Arc<dyn LocalStore>,
    current: RwLock<Option<Credential>>,
}

impl CredentialStore {
    /// Create the store, loading any persisted credential.
    ///
    /// An unreadable record is discarded rather than failing startup.
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        let current = match store.get(CREDENTIAL_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Credential>(&raw) {
                Ok(credential) => Some(credential),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable persisted credential");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted credential");
                None
            }
        };

        Self {
            store,
            current: RwLock::new(current),
        }
    }

    pub fn load(&self) -> Option<Credential> {
        self.current.read().clone()
    }

    /// Replace the held credential. Memory is updated even if persisting fails.
    pub fn save(&self, credential: Credential) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&credential)?;
        *self.current.write() = Some(credential);
        self.store.set(CREDENTIAL_KEY, &raw)
    }

    /// Forget the held credential. Memory is cleared even if persisting fails.
    pub fn clear(&self) -> Result<(), StoreError> {
        *self.current.write() = None;
        self.store.remove(CREDENTIAL_KEY)
    }
}
