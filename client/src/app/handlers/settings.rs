//! # Settings Handlers
//!
//! Trading mode, cookie consent and subscription refresh.

use std::sync::Arc;

use async_channel::Sender;
use shared::TradingMode;

use crate::app::events::AppEvent;
use crate::core::error::AppError;
use crate::debug::spawn_tracked;
use crate::providers::{ConsentStore, SubscriptionProvider, TradingModeProvider};
use crate::session::SessionStore;

/// Persist `mode`, then reload everything scoped to the session.
///
/// A change of market invalidates the identity snapshot and the subscription,
/// so both are fetched again even if the mode did not actually change. If
/// persisting fails nothing is invalidated.
pub(crate) async fn switch_trading_mode(
    trading_mode: &TradingModeProvider,
    session: &SessionStore,
    subscription: &SubscriptionProvider,
    mode: TradingMode,
) -> Result<TradingMode, AppError> {
    trading_mode.set(mode)?;

    if let Err(e) = session.refresh_identity().await {
        tracing::warn!(error = %e, "Identity reload after trading mode change failed");
    }
    subscription.invalidate().await;
    Ok(mode)
}

/// Handle a trading mode selection
pub(crate) fn handle_trading_mode_change(
    event_tx: Sender<AppEvent>,
    trading_mode: Arc<TradingModeProvider>,
    session: Arc<SessionStore>,
    subscription: Arc<SubscriptionProvider>,
    mode: TradingMode,
) {
    spawn_tracked("trading_mode_change", async move {
        let result = switch_trading_mode(&trading_mode, &session, &subscription, mode)
            .await
            .map_err(|e| e.to_string());
        let _ = event_tx.send(AppEvent::TradingModeChanged(result)).await;
        let _ = event_tx
            .send(AppEvent::SubscriptionUpdated(subscription.read()))
            .await;
    });
}

/// Handle the cookie banner choice
pub(crate) fn handle_cookie_choice(event_tx: Sender<AppEvent>, consent: &ConsentStore, accept_all: bool) {
    let result = if accept_all {
        consent.accept_all()
    } else {
        consent.reject_optional()
    };
    if let Err(e) = &result {
        tracing::error!(error = %e, "Failed to save cookie consent");
    }
    let _ = event_tx.try_send(AppEvent::ConsentSaved(result.map_err(|e| e.to_string())));
}

/// Handle a manual subscription refresh
pub(crate) fn handle_subscription_refresh(event_tx: Sender<AppEvent>, subscription: Arc<SubscriptionProvider>) {
    spawn_tracked("subscription_refresh", async move {
        let snapshot = subscription.refresh().await;
        let _ = event_tx.send(AppEvent::SubscriptionUpdated(snapshot)).await;
    });
}
