//! Structured Logger
//!
//! Wraps `tracing` to provide a console layer, an optional rolling NDJSON
//! file layer, and environment-based level control.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// File name prefix of the rolling log: `studysnap.log.YYYY-MM-DD`.
const LOG_FILE_PREFIX: &str = "studysnap.log";

/// Keeps the background file writer alive; flushes on drop.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Initialize the global structured logger.
///
/// `RUST_LOG` overrides `level`. Console output goes to stderr so stdout stays
/// free for command output. When `log_dir` is set, JSON lines are also written
/// to a daily-rotated file there. Calling this twice is harmless; the first
/// subscriber wins.
pub fn init_logger(log_dir: Option<&Path>, level: &str) -> LogGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true);

    let (file_layer, file_guard) = match log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    LogGuard { _file: file_guard }
}
