//! Subscription status for the signed-in user.

use std::sync::Arc;
use std::time::Instant;

use shared::SubscriptionSnapshot;
use tokio::task::JoinHandle;

use crate::core::service::BackendApi;
use crate::debug::spawn_tracked;
use crate::providers::derived::DerivedState;
use crate::session::SessionStore;

/// Serves the subscription snapshot, falling back to the free tier.
///
/// The snapshot is advisory: if it cannot be fetched the client behaves as
/// free tier and the backend enforces the real limits. It is scoped to one
/// sign-in, so after logout or a switch of user [`read`](Self::read)
/// immediately returns the free tier, even while a fetch for the previous
/// session is still in flight.
pub struct SubscriptionProvider {
    api: Arc<dyn BackendApi>,
    session: Arc<SessionStore>,
    cell: DerivedState<SubscriptionSnapshot>,
}

impl SubscriptionProvider {
    pub fn new(api: Arc<dyn BackendApi>, session: Arc<SessionStore>) -> Self {
        Self {
            api,
            session,
            cell: DerivedState::new(SubscriptionSnapshot::free_tier()),
        }
    }

    /// Current snapshot. Never blocks and never fails.
    pub fn read(&self) -> Arc<SubscriptionSnapshot> {
        match self.session.state().generation() {
            Some(generation) => self.cell.read(generation),
            None => self.cell.default_value(),
        }
    }

    /// Whether a fetched snapshot (rather than the default) is held for the current session.
    pub fn is_loaded(&self) -> bool {
        self.session
            .state()
            .generation()
            .is_some_and(|generation| self.cell.is_loaded_for(generation))
    }

    /// Fetch the snapshot for the current session.
    ///
    /// Waits for session restoration first. Any fetch failure degrades to
    /// the free tier with a warning; nothing is surfaced to the caller.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> Arc<SubscriptionSnapshot> {
        let state = self.session.wait_until_settled().await;
        let Some(generation) = state.generation() else {
            self.cell.reset();
            return self.read();
        };

        let token = self.cell.begin();
        let start = Instant::now();

        let snapshot = match self.api.subscription_status().await {
            Ok(snapshot) => {
                tracing::info!(
                    plan = %snapshot.plan,
                    backtests_remaining = snapshot.backtests_remaining,
                    duration_ms = start.elapsed().as_millis(),
                    "Subscription loaded"
                );
                snapshot
            }
            Err(e) => {
                tracing::warn!(error = %e, status = ?e.status(), "Subscription fetch failed, using free tier");
                SubscriptionSnapshot::free_tier()
            }
        };

        if !self.cell.commit(token, generation, snapshot) {
            tracing::debug!("Discarding superseded subscription fetch");
        }
        self.read()
    }

    /// Drop the held snapshot and fetch again.
    pub async fn invalidate(&self) -> Arc<SubscriptionSnapshot> {
        self.cell.reset();
        self.refresh().await
    }

    /// Follow the session: fetch once per sign-in and reset on sign-out.
    pub fn watch_session(self: &Arc<Self>) -> JoinHandle<()> {
        let provider = Arc::clone(self);
        let mut rx = self.session.subscribe();

        spawn_tracked("subscription_watch", async move {
            let mut seen: Option<u64> = None;
            loop {
                let generation = rx.borrow_and_update().generation();
                if generation != seen {
                    provider.cell.reset();
                    if generation.is_some() {
                        provider.refresh().await;
                    }
                    seen = generation;
                }

                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ApiError;
    use crate::services::storage::MemoryStore;
    use crate::testing::{pro_snapshot, MockBackend, MockIdentity};
    use std::time::Duration;

    async fn signed_in(backend: Arc<MockBackend>) -> (Arc<SessionStore>, SubscriptionProvider) {
        let identity = Arc::new(
            MockIdentity::new()
                .with_account("a@b.com", "secret-a")
                .with_account("x@y.com", "secret-x"),
        );
        let session = Arc::new(SessionStore::new(
            identity,
            Arc::new(MemoryStore::new()),
            Duration::from_secs(5),
        ));
        session.restore().await;
        session.login("a@b.com", "secret-a").await.unwrap();
        let provider = SubscriptionProvider::new(backend, session.clone());
        (session, provider)
    }

    #[tokio::test]
    async fn test_read_defaults_to_free_tier() {
        let (_session, provider) = signed_in(Arc::new(MockBackend::pro())).await;

        let snapshot = provider.read();

        assert_eq!(snapshot.plan, "free");
        assert!(snapshot.can_run_backtest);
        assert_eq!(snapshot.backtests_remaining, 3);
        assert!(!provider.is_loaded());
    }

    #[tokio::test]
    async fn test_refresh_loads_snapshot() {
        let (_session, provider) = signed_in(Arc::new(MockBackend::pro())).await;

        let snapshot = provider.refresh().await;

        assert_eq!(*snapshot, pro_snapshot());
        assert!(provider.is_loaded());
    }

    #[tokio::test]
    async fn test_unreachable_backend_serves_free_tier() {
        let backend = Arc::new(MockBackend::returning(Err(ApiError::Network(
            "connection refused".to_string(),
        ))));
        let (_session, provider) = signed_in(backend).await;

        let snapshot = provider.refresh().await;

        assert_eq!(*snapshot, SubscriptionSnapshot::free_tier());
    }

    #[tokio::test]
    async fn test_read_after_logout_ignores_in_flight_fetch() {
        let backend = Arc::new(MockBackend::pro());
        let gate = backend.hold();
        let (session, provider) = signed_in(backend.clone()).await;
        let provider = Arc::new(provider);

        let in_flight = {
            let provider = provider.clone();
            tokio::spawn(async move { provider.refresh().await })
        };
        backend.wait_for_calls(1).await;

        session.logout().await;
        gate.notify_one();
        in_flight.await.unwrap();

        assert_eq!(*provider.read(), SubscriptionSnapshot::free_tier());
    }

    #[tokio::test]
    async fn test_snapshot_not_visible_to_next_user() {
        let (session, provider) = signed_in(Arc::new(MockBackend::pro())).await;
        provider.refresh().await;

        session.logout().await;
        session.login("x@y.com", "secret-x").await.unwrap();

        assert_eq!(*provider.read(), SubscriptionSnapshot::free_tier());
    }

    #[tokio::test]
    async fn test_invalidate_refetches() {
        let backend = Arc::new(MockBackend::pro());
        let (_session, provider) = signed_in(backend.clone()).await;
        provider.refresh().await;

        backend.set_response(Ok(SubscriptionSnapshot::free_tier()));
        let snapshot = provider.invalidate().await;

        assert!(snapshot.is_free());
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_watch_session_fetches_once_per_sign_in() {
        let backend = Arc::new(MockBackend::pro());
        let (session, provider) = signed_in(backend.clone()).await;
        let provider = Arc::new(provider);

        let watcher = provider.watch_session();
        backend.wait_for_calls(1).await;
        session.refresh_identity().await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(backend.call_count(), 1);

        session.logout().await;
        session.login("a@b.com", "secret-a").await.unwrap();
        backend.wait_for_calls(2).await;

        watcher.abort();
        assert_eq!(backend.call_count(), 2);
    }
}
