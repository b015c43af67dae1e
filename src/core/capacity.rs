//! Worker capacity accounting shared by the scheduler loop and running jobs.
//!
//! A single `parking_lot::Mutex` guards the whole [`CapacityState`]: every
//! add, remove and allocation happens inside one critical section, so no
//! partially updated counters are ever visible. The join group used for the
//! graceful shutdown wait is a `tokio::sync::watch` channel carrying the
//! number of in-flight jobs, updated under the same lock.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::core::allocator::{self, Allocation, Demand};
use crate::core::{JobClass, SchedulerError};

/// Smallest total capacity the scheduler starts with.
pub const MIN_CAPACITY: u32 = 3;

/// Used and maximum counters of one job class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassSlot {
    /// Jobs of this class currently running.
    pub used: u32,
    /// Ceiling for this class set by the last allocation.
    pub max: u32,
}

impl ClassSlot {
    /// Room left under the ceiling, never negative.
    #[must_use]
    pub const fn available(&self) -> u32 {
        self.max.saturating_sub(self.used)
    }
}

/// Capacity counters for all classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityState {
    total: u32,
    used: u32,
    slots: [ClassSlot; 3],
}

impl CapacityState {
    /// Fresh state with every class ceiling at zero.
    #[must_use]
    pub const fn new(total: u32) -> Self {
        Self {
            total,
            used: 0,
            slots: [ClassSlot { used: 0, max: 0 }; 3],
        }
    }

    /// Configured total capacity.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.total
    }

    /// Jobs running across all classes.
    #[must_use]
    pub const fn used(&self) -> u32 {
        self.used
    }

    /// Free units of total capacity.
    #[must_use]
    pub const fn allocation_count(&self) -> u32 {
        self.total.saturating_sub(self.used)
    }

    /// Counters of one class.
    #[must_use]
    pub const fn slot(&self, class: JobClass) -> ClassSlot {
        self.slots[class.index()]
    }

    pub(crate) fn slot_mut(&mut self, class: JobClass) -> &mut ClassSlot {
        &mut self.slots[class.index()]
    }

    /// Room left under a class ceiling.
    #[must_use]
    pub const fn available(&self, class: JobClass) -> u32 {
        self.slot(class).available()
    }

    /// Count one running job of `class`, returning the class's new used count.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::CapacityExceeded`] when total capacity is already in use.
    pub fn add(&mut self, class: JobClass) -> Result<u32, SchedulerError> {
        if self.used >= self.total {
            return Err(SchedulerError::CapacityExceeded);
        }
        self.used += 1;
        let slot = self.slot_mut(class);
        slot.used += 1;
        Ok(slot.used)
    }

    /// Release one running job of `class`. Returns `false` if none was counted.
    pub fn remove(&mut self, class: JobClass) -> bool {
        let slot = self.slot_mut(class);
        if slot.used == 0 {
            return false;
        }
        slot.used -= 1;
        self.used = self.used.saturating_sub(1);
        true
    }
}

/// Thread-safe registry around [`CapacityState`].
#[derive(Debug)]
pub struct CapacityRegistry {
    state: Mutex<CapacityState>,
    in_flight: watch::Sender<u32>,
}

impl CapacityRegistry {
    /// Create a registry with `total` units of capacity.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InsufficientCapacity`] when `total` is below [`MIN_CAPACITY`].
    pub fn new(total: u32) -> Result<Self, SchedulerError> {
        if total < MIN_CAPACITY {
            return Err(SchedulerError::InsufficientCapacity {
                required: MIN_CAPACITY,
                configured: total,
            });
        }
        let (in_flight, _) = watch::channel(0);
        Ok(Self {
            state: Mutex::new(CapacityState::new(total)),
            in_flight,
        })
    }

    /// Configured total capacity.
    pub fn total(&self) -> u32 {
        self.state.lock().total()
    }

    /// Free units of total capacity.
    pub fn allocation_count(&self) -> u32 {
        self.state.lock().allocation_count()
    }

    /// Room left under a class ceiling, never negative.
    pub fn available(&self, class: JobClass) -> u32 {
        self.state.lock().available(class)
    }

    /// Jobs of `class` currently running.
    pub fn used(&self, class: JobClass) -> u32 {
        self.state.lock().slot(class).used
    }

    /// Jobs running across all classes.
    pub fn total_used(&self) -> u32 {
        self.state.lock().used()
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> CapacityState {
        self.state.lock().clone()
    }

    /// Recompute class ceilings for `demand`.
    pub fn allocate(&self, demand: Demand) -> Allocation {
        let mut state = self.state.lock();
        allocator::allocate(&mut state, demand)
    }

    /// Count one running job and register it with the join group.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::CapacityExceeded`] when total capacity is already in use.
    pub fn add(&self, class: JobClass) -> Result<u32, SchedulerError> {
        let mut state = self.state.lock();
        let slot = state.add(class)?;
        self.in_flight.send_replace(state.used());
        Ok(slot)
    }

    /// Release one running job and mark it done in the join group.
    pub fn remove(&self, class: JobClass) {
        let mut state = self.state.lock();
        if !state.remove(class) {
            tracing::warn!(%class, "release without a matching add ignored");
            return;
        }
        self.in_flight.send_replace(state.used());
    }

    /// Add a job and return a permit that removes it when dropped.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::CapacityExceeded`] when total capacity is already in use.
    pub fn acquire(self: &Arc<Self>, class: JobClass) -> Result<CapacityPermit, SchedulerError> {
        let slot = self.add(class)?;
        Ok(CapacityPermit {
            registry: Arc::clone(self),
            class,
            slot,
        })
    }

    /// Wait until no job is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.in_flight.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|in_flight| *in_flight == 0).await;
    }
}

/// One unit of capacity held by a running job.
#[derive(Debug)]
pub struct CapacityPermit {
    registry: Arc<CapacityRegistry>,
    class: JobClass,
    slot: u32,
}

impl CapacityPermit {
    /// Class this permit is counted against.
    #[must_use]
    pub const fn class(&self) -> JobClass {
        self.class
    }

    /// Used count of the class right after this permit was taken.
    #[must_use]
    pub const fn slot(&self) -> u32 {
        self.slot
    }
}

impl Drop for CapacityPermit {
    fn drop(&mut self) {
        self.registry.remove(self.class);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn rejects_capacity_below_minimum() {
        let err = CapacityRegistry::new(2).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::InsufficientCapacity {
                required: 3,
                configured: 2
            }
        ));
        assert!(CapacityRegistry::new(3).is_ok());
    }

    #[test]
    fn add_and_remove_keep_totals_in_step() {
        let registry = CapacityRegistry::new(4).unwrap();
        assert_eq!(registry.add(JobClass::Pending).unwrap(), 1);
        assert_eq!(registry.add(JobClass::Pending).unwrap(), 2);
        assert_eq!(registry.add(JobClass::Update).unwrap(), 1);
        assert_eq!(registry.total_used(), 3);
        assert_eq!(registry.allocation_count(), 1);

        registry.remove(JobClass::Pending);
        assert_eq!(registry.used(JobClass::Pending), 1);
        assert_eq!(registry.total_used(), 2);
    }

    #[test]
    fn add_refuses_past_total() {
        let registry = CapacityRegistry::new(3).unwrap();
        for _ in 0..3 {
            registry.add(JobClass::Update).unwrap();
        }
        assert!(matches!(
            registry.add(JobClass::Pending),
            Err(SchedulerError::CapacityExceeded)
        ));
        assert_eq!(registry.total_used(), 3);
        assert_eq!(registry.used(JobClass::Pending), 0);
    }

    #[test]
    fn remove_without_add_does_not_underflow() {
        let registry = CapacityRegistry::new(3).unwrap();
        registry.remove(JobClass::Maintenance);
        assert_eq!(registry.total_used(), 0);
        assert_eq!(registry.used(JobClass::Maintenance), 0);
    }

    #[test]
    fn available_is_never_negative() {
        let registry = CapacityRegistry::new(5).unwrap();
        registry.allocate(Demand::new(1, 0, 0));
        registry.add(JobClass::Pending).unwrap();
        registry.add(JobClass::Pending).unwrap();
        assert_eq!(registry.available(JobClass::Pending), 0);
        assert_eq!(registry.available(JobClass::Update), 0);
    }

    #[test]
    fn permit_releases_exactly_once() {
        let registry = Arc::new(CapacityRegistry::new(3).unwrap());
        let permit = registry.acquire(JobClass::Maintenance).unwrap();
        assert_eq!(permit.slot(), 1);
        assert_eq!(permit.class(), JobClass::Maintenance);
        assert_eq!(registry.total_used(), 1);
        drop(permit);
        assert_eq!(registry.total_used(), 0);
        assert_eq!(registry.used(JobClass::Maintenance), 0);
    }

    #[tokio::test]
    async fn wait_idle_returns_once_jobs_finish() {
        let registry = Arc::new(CapacityRegistry::new(3).unwrap());
        let permit = registry.acquire(JobClass::Pending).unwrap();

        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.wait_idle().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(permit);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait_idle should finish")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_idle_is_immediate_without_jobs() {
        let registry = CapacityRegistry::new(3).unwrap();
        tokio::time::timeout(Duration::from_millis(100), registry.wait_idle())
            .await
            .expect("no job in flight");
    }
}
