//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configured worker capacity is below the minimum the allocator needs.
    #[error("thread max count is too low: {configured} configured, at least {required} required")]
    InsufficientCapacity {
        /// Minimum capacity accepted.
        required: u32,
        /// Capacity found in the configuration.
        configured: u32,
    },
    /// Every unit of total capacity is already in use.
    #[error("capacity exceeded")]
    CapacityExceeded,
    /// The work-queue store could not be read.
    #[error("work queue store error: {0}")]
    Store(String),
    /// Configuration rejected during validation or loading.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The engine has already been started once.
    #[error("engine already ran; create a new engine to run again")]
    AlreadyRan,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
