//! # Logging and Task Tracking
//!
//! - **File-based logging**: structured logs to `<log_dir>/stratmarket.log` (daily rotation)
//! - **Async task tracking**: task lifecycle logging and slow-task warnings
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stratmarket::debug::{self, DebugConfig};
//!
//! // Keep the guard alive until exit so buffered lines are flushed
//! let _guard = debug::init_logger(&DebugConfig::from_env());
//!
//! tracing::info!(endpoint = "/subscription/status", duration_ms = 234, "API call completed");
//! ```
//!
//! ## Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Log level filter (default `stratmarket=info,warn`)
//! - `STRATMARKET_LOG_DIR`: Log directory (default `logs`)
//! - `STRATMARKET_LOG_STDERR`: Mirror logs to stderr (1=on)

pub mod config;
pub mod logger;
pub mod task_tracker;

pub use config::DebugConfig;
pub use logger::init as init_logger;
pub use task_tracker::{active_task_count, spawn_tracked};
