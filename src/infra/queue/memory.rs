//! In-memory work queue for development and tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use parking_lot::Mutex;

use crate::core::job::STATUS_COMPLETED;
use crate::core::{JobClass, QueueCounts, SchedulerError, WorkItem, WorkQueue};

/// Work queue held in a vector, applying the same eligibility and ordering
/// rules as the database table.
#[derive(Default)]
pub struct InMemoryWorkQueue {
    rows: Mutex<Vec<WorkItem>>,
    unavailable: AtomicBool,
}

impl InMemoryWorkQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue seeded with `rows`.
    #[must_use]
    pub fn with_rows(rows: impl IntoIterator<Item = WorkItem>) -> Self {
        Self {
            rows: Mutex::new(rows.into_iter().collect()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Insert or replace a row by id.
    pub fn push(&self, item: WorkItem) {
        let mut rows = self.rows.lock();
        match rows.iter_mut().find(|r| r.id == item.id) {
            Some(existing) => *existing = item,
            None => rows.push(item),
        }
    }

    /// Overwrite the status of the row with `signature`.
    ///
    /// Returns `false` when no such row exists.
    pub fn set_status(&self, signature: &str, status: &str) -> bool {
        let mut rows = self.rows.lock();
        let Some(row) = rows.iter_mut().find(|r| r.signature == signature) else {
            return false;
        };
        row.status = status.into();
        true
    }

    /// Mark the row with `signature` completed at `at`, as a job process would.
    ///
    /// Returns `false` when no such row exists.
    pub fn mark_completed(&self, signature: &str, at: NaiveDateTime) -> bool {
        let mut rows = self.rows.lock();
        let Some(row) = rows.iter_mut().find(|r| r.signature == signature) else {
            return false;
        };
        row.status = STATUS_COMPLETED.into();
        row.first_run.get_or_insert(at);
        row.last_run = Some(at);
        true
    }

    /// Simulate a store outage: every query fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    /// Number of rows held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    /// Queue holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    fn check_available(&self) -> Result<(), SchedulerError> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(SchedulerError::Store("in-memory store unavailable".into()));
        }
        Ok(())
    }

    /// Eligible rows of `class` at `now`, in dispatch order.
    #[must_use]
    pub fn eligible_at(&self, class: JobClass, limit: u32, now: NaiveDateTime) -> Vec<WorkItem> {
        let rows = self.rows.lock();
        let mut items: Vec<WorkItem> = match class {
            JobClass::Pending => rows.iter().filter(|r| r.is_pending()).cloned().collect(),
            JobClass::Update => rows.iter().filter(|r| r.is_update_due(now)).cloned().collect(),
            JobClass::Maintenance => Vec::new(),
        };
        drop(rows);

        match class {
            JobClass::Update => items.sort_by_key(|r| (r.first_run.is_some(), r.last_run.is_some(), r.id)),
            _ => items.sort_by_key(|r| (r.first_run.is_some(), r.id)),
        }
        items.truncate(limit as usize);
        items
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn counts(&self) -> Result<QueueCounts, SchedulerError> {
        self.check_available()?;
        let now = Local::now().naive_local();
        let rows = self.rows.lock();
        Ok(QueueCounts {
            pending: rows.iter().filter(|r| r.is_pending()).count() as u64,
            update: rows.iter().filter(|r| r.is_update_due(now)).count() as u64,
        })
    }

    async fn eligible(&self, class: JobClass, limit: u32) -> Result<Vec<WorkItem>, SchedulerError> {
        self.check_available()?;
        Ok(self.eligible_at(class, limit, Local::now().naive_local()))
    }
}
