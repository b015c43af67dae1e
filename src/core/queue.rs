//! Read access to the shared work-queue table.

use async_trait::async_trait;

use crate::core::{JobClass, SchedulerError, WorkItem};

/// Row counts returned by the demand query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueCounts {
    /// Rows with status `pending`.
    pub pending: u64,
    /// Completed rows with a repeat interval that are due.
    pub update: u64,
}

/// Abstraction for work-queue backends.
///
/// The scheduler only reads; rows are updated by the dispatched processes.
#[async_trait]
pub trait WorkQueue: Send + Sync + 'static {
    /// Count eligible rows for the pending and update classes.
    async fn counts(&self) -> Result<QueueCounts, SchedulerError>;

    /// Fetch at most `limit` eligible rows of `class`, in dispatch order.
    ///
    /// Pending rows come never-run first, then by id. Update rows come
    /// never-run first, then never-completed first, then by id.
    async fn eligible(&self, class: JobClass, limit: u32) -> Result<Vec<WorkItem>, SchedulerError>;
}
