//! Logging setup
//!
//! A `tracing` fmt layer on a non-blocking writer. The level comes from
//! `TRAJDB_LOG_LEVEL` (default INFO).

use parking_lot::Mutex;
use std::str::FromStr;
use std::sync::Once;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

pub const LOG_LEVEL_ENV: &str = "TRAJDB_LOG_LEVEL";

/// Install the global subscriber on stdout. Keep the guards alive for as
/// long as logs should be flushed.
pub fn init_logging() -> Vec<WorkerGuard> {
    install(std::io::stdout())
}

/// Same as [`init_logging`] on stderr, for processes that answer on stdout
pub fn init_stderr_logging() -> Vec<WorkerGuard> {
    install(std::io::stderr())
}

fn install<W>(writer: W) -> Vec<WorkerGuard>
where
    W: std::io::Write + Send + 'static,
{
    let mut guards = vec![];

    let (non_blocking, guard) = tracing_appender::non_blocking(writer);
    let log_level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "INFO".to_owned());
    let log_level = Level::from_str(log_level.as_str()).unwrap_or(Level::INFO);
    let fmt_layer = Layer::new()
        .with_writer(non_blocking.with_max_level(log_level))
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false);
    guards.push(guard);

    let subscriber = Registry::default().with(fmt_layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // another subscriber won the race; its output is kept
        tracing::debug!("global subscriber already installed");
    }

    guards
}

static TEST_LOG_GUARDS: Mutex<Option<Vec<WorkerGuard>>> = Mutex::new(None);

pub fn init_test_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        *TEST_LOG_GUARDS.lock() = Some(init_logging());
    });
}
