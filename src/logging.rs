//! Logging configuration for `worldsync`

use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

use crate::Result;

// Keeps the non-blocking file writer alive for the process lifetime
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Filter directives for `level`, pinning the HTTP stack to warn.
fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,worldsync={level},hyper=warn,reqwest=warn,h2=warn,tower=warn"
        ))
    })
}

/// Initialize logging with the default level
pub fn init_logging() -> Result<()> {
    init_logging_with_level("info")
}

/// Initialize logging with a custom log level
///
/// Console output stays terse; the daily-rolling file under `logs/` keeps
/// the detailed view, and errors go to stderr with source locations.
pub fn init_logging_with_level(level: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    let appender = tracing_appender::rolling::daily("logs", "worldsync.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);

    let console = fmt::layer()
        .compact()
        .with_target(false)
        .with_filter(LevelFilter::INFO);

    let errors = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_filter(LevelFilter::ERROR);

    let file = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter_for(level))
        .with(file)
        .with(console)
        .with(errors)
        .init();

    tracing::debug!(%level, "logging initialized, files under logs/");
    Ok(())
}

/// Initialize simple logging for testing
pub fn init_simple_logging() -> Result<()> {
    // try_init so repeated calls across tests in one process are harmless
    let _ = tracing_subscriber::fmt()
        .compact()
        .with_max_level(tracing::Level::INFO)
        .try_init();
    Ok(())
}
