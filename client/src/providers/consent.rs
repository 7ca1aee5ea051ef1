//! Cookie-consent choice, persisted locally.

use std::sync::Arc;

use chrono::Utc;
use shared::CookieConsent;

use crate::core::error::StoreError;
use crate::core::service::LocalStore;
use crate::services::storage::COOKIE_CONSENT_KEY;

pub struct ConsentStore {
    store: Arc<dyn LocalStore>,
}

impl ConsentStore {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// The recorded choice, or `None` if the user has not decided yet.
    pub fn read(&self) -> Option<CookieConsent> {
        match self.store.get(COOKIE_CONSENT_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw)
                .inspect_err(|e| tracing::warn!(error = %e, "Ignoring unreadable cookie consent"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cookie consent");
                None
            }
        }
    }

    pub fn has_decided(&self) -> bool {
        self.read().is_some()
    }

    pub fn set(&self, consent: &CookieConsent) -> Result<(), StoreError> {
        let raw = serde_json::to_string(consent)?;
        self.store.set(COOKIE_CONSENT_KEY, &raw)?;
        tracing::info!(
            analytics = consent.analytics,
            marketing = consent.marketing,
            "Cookie consent recorded"
        );
        Ok(())
    }

    pub fn accept_all(&self) -> Result<CookieConsent, StoreError> {
        let consent = CookieConsent::accept_all(Utc::now());
        self.set(&consent)?;
        Ok(consent)
    }

    pub fn reject_optional(&self) -> Result<CookieConsent, StoreError> {
        let consent = CookieConsent::necessary_only(Utc::now());
        self.set(&consent)?;
        Ok(consent)
    }
}
