//! Logging and tracing configuration
//!
//! Logs go to stderr so that `--json` output on stdout stays parseable.
//! An optional log file receives the same events without ANSI colors.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize tracing for the CLI
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate (DEBUG when `verbose`), WARN for dependencies.
///
/// The returned guard must be held until exit so buffered file logs are flushed.
pub fn init_cli(verbose: bool, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("walkthrough=debug,warn")
        } else {
            EnvFilter::new("walkthrough=info,warn")
        }
    });

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    if let Some(path) = log_file {
        match open_log_file(path) {
            Ok(file) => {
                let (writer, guard) = tracing_appender::non_blocking(file);
                let file_layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE);

                tracing_subscriber::registry()
                    .with(filter)
                    .with(stderr_layer)
                    .with(file_layer)
                    .init();

                return Some(guard);
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file '{}': {}", path.display(), e);
            }
        }
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .init();

    None
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}
