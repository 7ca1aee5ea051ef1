//! File-based logging initialization

use std::fs;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use super::config::{DebugConfig, DEFAULT_LOG_LEVEL, LOG_FILE_NAME};

/// Initialize the logging system
///
/// Sets up:
/// - Daily log rotation under `log_dir`, non-blocking, no ANSI codes
/// - An optional compact stderr layer for the CLI
/// - Panic hook integration for crash logging
///
/// Returns the file writer's guard; dropping it flushes and stops the writer,
/// so hold it for the lifetime of the program. Returns `None` when the log
/// directory cannot be created or a subscriber is already installed.
pub fn init(config: &DebugConfig) -> Option<WorkerGuard> {
    if let Err(e) = fs::create_dir_all(&config.log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    let stderr_layer = config.log_to_stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.is_debug_enabled())
            .compact()
            .boxed()
    });

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    if let Err(e) = installed {
        eprintln!("Warning: Logging already initialized: {}", e);
        return None;
    }

    tracing::info!(
        log_file = %config.log_file().display(),
        log_level = %config.log_level,
        stderr = config.log_to_stderr,
        "Logging initialized"
    );

    setup_panic_hook();
    Some(guard)
}

/// Log panics to the file before the default handler runs
fn setup_panic_hook() {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic message".to_string()
        };

        tracing::error!(
            location = %location,
            message = %message,
            "Application panic"
        );

        default_panic(panic_info);
    }));
}
