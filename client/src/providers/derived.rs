//! Token-guarded cell for state fetched on behalf of a session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Fetched value tagged with the session generation it belongs to.
struct Scoped<T> {
    owner: u64,
    value: Arc<T>,
    fetched_at: DateTime<Utc>,
}

/// Holds the latest fetched value of some derived state, or nothing.
///
/// Readers never block on a fetch: they get the held value if it belongs to
/// the asking owner and the default otherwise. Writers take a token with
/// [`begin`](Self::begin) before fetching and hand it back to
/// [`commit`](Self::commit); a token older than the newest `begin` or `reset`
/// is discarded, so overlapping fetches settle on the most recent one.
pub struct DerivedState<T> {
    default: Arc<T>,
    slot: RwLock<Option<Scoped<T>>>,
    latest: AtomicU64,
}

impl<T> DerivedState<T> {
    pub fn new(default: T) -> Self {
        Self {
            default: Arc::new(default),
            slot: RwLock::new(None),
            latest: AtomicU64::new(0),
        }
    }

    pub fn default_value(&self) -> Arc<T> {
        Arc::clone(&self.default)
    }

    /// The held value if it belongs to `owner`, else the default.
    pub fn read(&self, owner: u64) -> Arc<T> {
        match &*self.slot.read() {
            Some(scoped) if scoped.owner == owner => Arc::clone(&scoped.value),
            _ => self.default_value(),
        }
    }

    /// Whether a fetched value for `owner` is held.
    pub fn is_loaded_for(&self, owner: u64) -> bool {
        self.slot.read().as_ref().is_some_and(|scoped| scoped.owner == owner)
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.slot.read().as_ref().map(|scoped| scoped.fetched_at)
    }

    /// Start a fetch. Any fetch started earlier becomes stale.
    pub fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Store a fetched value unless a newer fetch or a reset happened since `token`.
    pub fn commit(&self, token: u64, owner: u64, value: T) -> bool {
        let mut slot = self.slot.write();
        if self.latest.load(Ordering::SeqCst) != token {
            return false;
        }
        *slot = Some(Scoped {
            owner,
            value: Arc::new(value),
            fetched_at: Utc::now(),
        });
        true
    }

    /// Drop the held value and invalidate fetches in flight.
    pub fn reset(&self) {
        let mut slot = self.slot.write();
        self.latest.fetch_add(1, Ordering::SeqCst);
        *slot = None;
    }
}
