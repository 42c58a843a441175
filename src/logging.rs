//! Logging setup.
//!
//! `tracing` with environment-based filtering. Without a log file, events
//! go to stderr; with one, through a non-blocking appender whose guard must
//! stay alive for the life of the process.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the subscriber. The returned guard (present when logging to
/// a file) flushes buffered events on drop; `main` holds it until exit.
pub fn init(debug: bool, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty());
            let file_name = path.file_name().map(|n| n.to_os_string());

            let appender = tracing_appender::rolling::never(
                directory.unwrap_or_else(|| Path::new(".")),
                file_name.unwrap_or_else(|| "streamsight.log".into()),
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);

            fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();

            Some(guard)
        }
        None => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();

            None
        }
    }
}
