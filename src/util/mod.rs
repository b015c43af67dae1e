//! Utilities: logging setup, the rotating log file and the statistics table.

pub mod rolling;
pub mod table;
pub mod telemetry;

pub use rolling::RollingFile;
pub use table::render_stats_table;
pub use telemetry::{default_filter, init_logging, LogDestination, LOG_FILE_NAME};
