//! Async task lifecycle tracking

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::task::JoinHandle;

/// Tasks taking longer than this are logged as potential hangs
const SLOW_TASK_SECS: u64 = 30;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(0);
static ACTIVE_TASKS: AtomicU64 = AtomicU64::new(0);

/// Number of tracked tasks still running
pub fn active_task_count() -> u64 {
    ACTIVE_TASKS.load(Ordering::Relaxed)
}

/// Spawn an instrumented async task with lifecycle tracking
///
/// # Example
///
/// ```rust,no_run
/// # async fn demo(session: std::sync::Arc<stratmarket::session::SessionStore>) {
/// use stratmarket::debug::spawn_tracked;
///
/// spawn_tracked("logout", async move {
///     session.logout().await
/// });
/// # }
/// ```
pub fn spawn_tracked<F>(name: &'static str, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let task_id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
    ACTIVE_TASKS.fetch_add(1, Ordering::Relaxed);
    let start = Instant::now();

    tracing::debug!(task = %name, task_id, "Task spawned");

    tokio::spawn(async move {
        let result = future.await;
        let duration = start.elapsed();

        if duration.as_secs() > SLOW_TASK_SECS {
            tracing::warn!(
                task = %name,
                task_id,
                duration_ms = duration.as_millis(),
                "Task took very long (potential hang)"
            );
        } else {
            tracing::debug!(
                task = %name,
                task_id,
                duration_ms = duration.as_millis(),
                "Task completed"
            );
        }

        ACTIVE_TASKS.fetch_sub(1, Ordering::Relaxed);
        result
    })
}
