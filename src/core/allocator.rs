//! Per-class capacity allocation.
//!
//! Every pass the scheduler turns the demand it probed into new per-class
//! ceilings. Running jobs are never revoked: a class maximum is always set
//! relative to a used count, so only room for future dispatch changes.

use crate::core::capacity::CapacityState;
use crate::core::JobClass;

/// Demand probed for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Demand {
    /// Eligible pending rows.
    pub pending: u32,
    /// Update presence flag (0 or 1).
    pub update: u32,
    /// Maintenance due flag (0 or 1).
    pub maintenance: u32,
}

impl Demand {
    /// Build a demand triple.
    #[must_use]
    pub const fn new(pending: u32, update: u32, maintenance: u32) -> Self {
        Self {
            pending,
            update,
            maintenance,
        }
    }

    /// Demand for a single class.
    #[must_use]
    pub const fn of(&self, class: JobClass) -> u32 {
        match class {
            JobClass::Pending => self.pending,
            JobClass::Update => self.update,
            JobClass::Maintenance => self.maintenance,
        }
    }
}

/// How the pending/update share of an allocation was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// Nothing was free; no ceiling changed.
    NoCapacity,
    /// The only free unit went to maintenance; pending/update kept their ceilings.
    MaintenanceOnly,
    /// All pending and update demand fit.
    Uncontended,
    /// Contention with pending demand: pending took half, update the remainder.
    PendingPriority,
    /// Contention with update demand only: update took everything free.
    UpdateOnly,
}

/// Outcome of one [`allocate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// A maintenance slot was reserved.
    pub maintenance_reserved: bool,
    /// Pending/update decision.
    pub grant: Grant,
}

/// Recompute per-class maxima for the next window.
pub fn allocate(state: &mut CapacityState, demand: Demand) -> Allocation {
    let mut total_available = state.allocation_count();
    if total_available < 1 {
        return Allocation {
            maintenance_reserved: false,
            grant: Grant::NoCapacity,
        };
    }

    // Maintenance is a singleton: one slot at most.
    let maintenance_reserved = demand.maintenance >= 1;
    if maintenance_reserved {
        state.slot_mut(JobClass::Maintenance).max = 1;
        total_available -= 1;
    }

    if total_available < 1 {
        return Allocation {
            maintenance_reserved,
            grant: Grant::MaintenanceOnly,
        };
    }

    let pending_used = state.slot(JobClass::Pending).used;
    let update_used = state.slot(JobClass::Update).used;

    let grant = if u64::from(demand.pending) + u64::from(demand.update)
        <= u64::from(total_available)
    {
        state.slot_mut(JobClass::Pending).max = pending_used + demand.pending;
        state.slot_mut(JobClass::Update).max = update_used + demand.update;
        Grant::Uncontended
    } else if demand.pending > 0 {
        state.slot_mut(JobClass::Pending).max = pending_used + total_available / 2;
        state.slot_mut(JobClass::Update).max = update_used + total_available % 2;
        Grant::PendingPriority
    } else {
        // Keyed off pending's used count, as the scheduler always has.
        state.slot_mut(JobClass::Pending).max = pending_used;
        state.slot_mut(JobClass::Update).max = pending_used + total_available;
        Grant::UpdateOnly
    };

    Allocation {
        maintenance_reserved,
        grant,
    }
}
