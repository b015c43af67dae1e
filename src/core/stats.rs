//! Per-class execution statistics.

use chrono::{DateTime, Local};
use parking_lot::RwLock;

use crate::core::JobClass;

/// Counters for one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassStats {
    /// Last completion time; engine creation time until the first job ends.
    pub last_run: DateTime<Local>,
    /// Completed jobs.
    pub total: u64,
    /// Jobs that exited successfully.
    pub successful: u64,
    /// Jobs that failed to launch or exited non-zero.
    pub failed: u64,
}

impl ClassStats {
    const fn new(at: DateTime<Local>) -> Self {
        Self {
            last_run: at,
            total: 0,
            successful: 0,
            failed: 0,
        }
    }
}

/// Point-in-time copy of all class counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    classes: [ClassStats; 3],
}

impl StatsSnapshot {
    /// Counters of one class.
    #[must_use]
    pub const fn get(&self, class: JobClass) -> &ClassStats {
        &self.classes[class.index()]
    }
}

/// Cumulative statistics for the process lifetime.
#[derive(Debug)]
pub struct EngineStats {
    classes: RwLock<[ClassStats; 3]>,
}

impl EngineStats {
    /// Stats with every last-run time set to now.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(Local::now())
    }

    /// Stats with every last-run time set to `at`.
    #[must_use]
    pub fn starting_at(at: DateTime<Local>) -> Self {
        Self {
            classes: RwLock::new([ClassStats::new(at), ClassStats::new(at), ClassStats::new(at)]),
        }
    }

    /// Record one finished job of `class` completing now.
    pub fn record(&self, class: JobClass, successful: bool) {
        self.record_at(class, successful, Local::now());
    }

    /// Record one finished job of `class` completing at `at`.
    pub fn record_at(&self, class: JobClass, successful: bool, at: DateTime<Local>) {
        let mut classes = self.classes.write();
        let stats = &mut classes[class.index()];
        stats.total += 1;
        stats.last_run = at;
        if successful {
            stats.successful += 1;
        } else {
            stats.failed += 1;
        }
    }

    /// Last completion time of `class`.
    pub fn last_run(&self, class: JobClass) -> DateTime<Local> {
        self.classes.read()[class.index()].last_run
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            classes: self.classes.read().clone(),
        }
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}
