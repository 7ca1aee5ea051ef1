//! Persisted trading-mode preference.

use std::sync::Arc;

use shared::TradingMode;
use tokio::sync::watch;

use crate::core::error::StoreError;
use crate::core::service::LocalStore;
use crate::services::storage::TRADING_MODE_KEY;

/// The user's market preference (crypto or stocks).
///
/// Read synchronously from local storage on construction. Changing it only
/// persists and publishes the value; the caller (see
/// [`App::set_trading_mode`](crate::app::App::set_trading_mode)) is
/// responsible for invalidating the state that depends on it.
pub struct TradingModeProvider {
    store: Arc<dyn LocalStore>,
    current: watch::Sender<TradingMode>,
}

impl TradingModeProvider {
    pub fn new(store: Arc<dyn LocalStore>, default: TradingMode) -> Self {
        let initial = match store.get(TRADING_MODE_KEY) {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "Ignoring unknown persisted trading mode");
                default
            }),
            Ok(None) => default,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read trading mode");
                default
            }
        };

        let (current, _) = watch::channel(initial);
        Self { store, current }
    }

    pub fn read(&self) -> TradingMode {
        *self.current.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TradingMode> {
        self.current.subscribe()
    }

    /// Persist and publish `mode`, returning the previous mode.
    ///
    /// Nothing changes when persisting fails.
    pub fn set(&self, mode: TradingMode) -> Result<TradingMode, StoreError> {
        self.store.set(TRADING_MODE_KEY, mode.as_str())?;
        let previous = self.current.send_replace(mode);
        tracing::info!(from = %previous, to = %mode, "Trading mode changed");
        Ok(previous)
    }
}
