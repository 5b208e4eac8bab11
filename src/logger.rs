//! Logging setup
//!
//! Console output always goes to stderr. File output is opt-in with
//! `RISCO_ENABLE_LOGGING=1` and lands in `<local data dir>/risco-cloud/logs`,
//! rotated daily. The filter comes from `RISCO_LOG` (default `info`).

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const ENV_FILTER: &str = "RISCO_LOG";
const ENV_ENABLE_FILE: &str = "RISCO_ENABLE_LOGGING";
const LOG_FILE_PREFIX: &str = "risco-cloud.log";

/// Directory for log files
pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("risco-cloud")
        .join("logs")
}

fn file_logging_enabled() -> bool {
    std::env::var(ENV_ENABLE_FILE)
        .map(|v| v == "1")
        .unwrap_or(false)
}

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_env(ENV_FILTER).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber
///
/// Keep the returned guard alive for the life of the process, otherwise
/// buffered file output is lost. Calling this twice is harmless.
pub fn init_logger(verbose: bool) -> Option<WorkerGuard> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter(verbose));

    let (file_layer, guard) = if file_logging_enabled() {
        let dir = log_dir();
        match std::fs::create_dir_all(&dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(env_filter(verbose));
                (Some(layer), Some(guard))
            }
            Err(err) => {
                eprintln!("Cannot create log directory {}: {}", dir.display(), err);
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init();

    guard
}
