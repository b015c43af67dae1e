//! Telemetry helpers for structured logging.

use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogsConfig;
use crate::core::AppResult;
use crate::util::rolling::RollingFile;

/// Name of the active log file under `logs.path`.
pub const LOG_FILE_NAME: &str = "query-queue-worker.log";

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Where log events are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    /// Discard everything.
    Nowhere,
    /// Standard output only.
    Console,
    /// Log file only.
    File,
    /// Standard output and log file.
    ConsoleAndFile,
}

impl LogDestination {
    /// Destination for the file logging switch and the silent flag.
    #[must_use]
    pub const fn resolve(file_enabled: bool, silent: bool) -> Self {
        match (file_enabled, silent) {
            (true, false) => Self::ConsoleAndFile,
            (false, false) => Self::Console,
            (true, true) => Self::File,
            (false, true) => Self::Nowhere,
        }
    }

    /// Writes to standard output.
    #[must_use]
    pub const fn console(self) -> bool {
        matches!(self, Self::Console | Self::ConsoleAndFile)
    }

    /// Writes to the log file.
    #[must_use]
    pub const fn file(self) -> bool {
        matches!(self, Self::File | Self::ConsoleAndFile)
    }
}

/// Default filter: `RUST_LOG` when set, otherwise `debug` or `info`.
#[must_use]
pub fn default_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug { "debug,sqlx=warn" } else { "info,sqlx=warn" })
    })
}

/// Install the global subscriber. Does nothing when one is already set.
///
/// # Errors
///
/// When the log directory or file cannot be opened.
pub fn init_logging(logs: &LogsConfig, debug: bool, silent: bool) -> AppResult<LogDestination> {
    let destination = LogDestination::resolve(logs.enabled, silent);
    if tracing::dispatcher::has_been_set() {
        return Ok(destination);
    }

    let console = destination.console().then(|| fmt::layer().with_target(false));
    let file = if destination.file() {
        let rolling = RollingFile::open(
            &logs.path,
            LOG_FILE_NAME,
            logs.max_size.saturating_mul(BYTES_PER_MIB),
            logs.max_count,
        )
        .with_context(|| format!("cannot open log file in {}", logs.path.display()))?;
        Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(rolling)),
        )
    } else {
        None
    };

    // A racing initialisation elsewhere keeps its subscriber.
    let _ = tracing_subscriber::registry()
        .with(default_filter(debug))
        .with(console)
        .with(file)
        .try_init();
    Ok(destination)
}
