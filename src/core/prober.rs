//! Demand probing: how much work each class has this pass.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeDelta};

use crate::core::allocator::Demand;
use crate::core::guard::StoreGuard;
use crate::core::{EngineStats, JobClass, SchedulerError, WorkQueue};

/// Reads class demand from the work queue and the maintenance timer.
pub struct DemandProber<Q> {
    queue: Arc<Q>,
    stats: Arc<EngineStats>,
    guard: Arc<StoreGuard>,
    maintenance_idle: TimeDelta,
}

impl<Q: WorkQueue> DemandProber<Q> {
    /// Prober over `queue`, timing maintenance from `stats`.
    pub fn new(
        queue: Arc<Q>,
        stats: Arc<EngineStats>,
        guard: Arc<StoreGuard>,
        maintenance_idle: TimeDelta,
    ) -> Self {
        Self {
            queue,
            stats,
            guard,
            maintenance_idle,
        }
    }

    /// Probe demand as of now.
    ///
    /// Returns `None` when the store guard skipped the query.
    ///
    /// # Errors
    ///
    /// Store failures under the fail-fast policy.
    pub async fn probe(&self) -> Result<Option<Demand>, SchedulerError> {
        self.probe_at(Local::now()).await
    }

    /// Probe demand as of `now`.
    ///
    /// # Errors
    ///
    /// Store failures under the fail-fast policy.
    pub async fn probe_at(&self, now: DateTime<Local>) -> Result<Option<Demand>, SchedulerError> {
        let Some(counts) = self.guard.call("count", || self.queue.counts()).await? else {
            return Ok(None);
        };
        Ok(Some(Demand {
            pending: u32::try_from(counts.pending).unwrap_or(u32::MAX),
            update: u32::from(counts.update > 0),
            maintenance: u32::from(self.maintenance_due(now)),
        }))
    }

    /// Maintenance idle interval has elapsed since its last run.
    pub fn maintenance_due(&self, now: DateTime<Local>) -> bool {
        self.stats
            .last_run(JobClass::Maintenance)
            .checked_add_signed(self.maintenance_idle)
            .is_some_and(|next| now >= next)
    }
}
