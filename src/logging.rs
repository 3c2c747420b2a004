//! Subscriber setup. The TUI owns the terminal, so it logs to a rolling file;
//! headless mode logs to stdout.

use std::path::Path;
use std::sync::OnceLock;

use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use tracing::debug;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{prelude::*, reload, EnvFilter, Registry};

use crate::errors::AppError;

const LOG_MAX_BYTES: u64 = 1024 * 1024 * 5;
const LOG_BACKUPS: usize = 2;
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

static LEVEL_HANDLE: OnceLock<reload::Handle<LevelFilter, Registry>> = OnceLock::new();

/// Starts at DEBUG until the config has been read, see [`apply_level`].
fn base_subscriber() -> impl Subscriber + for<'a> LookupSpan<'a> + Send + Sync + 'static {
    let (level, handle) = reload::Layer::new(LevelFilter::DEBUG);
    if LEVEL_HANDLE.set(handle).is_err() {
        debug!("Log level handle already set");
    }
    // Let RUST_LOG override, otherwise keep the HTTP stack quiet
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trace,hyper=info,reqwest=info,mio=info"));
    tracing_subscriber::registry().with(level).with(env_filter)
}

/// Logs to a size-rotated file next to the config. Keep the guard alive until exit.
pub fn init_file_logging(log_path: &Path) -> Result<WorkerGuard, AppError> {
    let file_appender = BasicRollingFileAppender::new(
        log_path,
        RollingConditionBasic::new().max_size(LOG_MAX_BYTES),
        LOG_BACKUPS,
    )?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_file(false)
        .with_ansi(false)
        .with_target(true)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_owned()))
        .with_line_number(true);
    if base_subscriber().with(fmt_layer).try_init().is_err() {
        debug!("Global subscriber was already set");
    }
    Ok(guard)
}

pub fn init_stdout_logging() {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_owned()));
    if base_subscriber().with(fmt_layer).try_init().is_err() {
        debug!("Global subscriber was already set");
    }
}

/// Switches to the user's configured level. Does nothing if logging was never set up.
pub fn apply_level(level: LevelFilter) {
    if let Some(handle) = LEVEL_HANDLE.get() {
        if let Err(e) = handle.modify(|filter| *filter = level) {
            debug!("Couldn't change log level: {e}");
        }
    }
}
