//! Job classes, work-queue rows, and the specs handed to executors.

use std::fmt;

use chrono::NaiveDateTime;
use uuid::Uuid;

/// Identifier used for the synthetic maintenance job.
pub const MAINTENANCE_JOB_ID: &str = "MAINT";
/// Display name used for the synthetic maintenance job.
pub const MAINTENANCE_JOB_NAME: &str = "System Maintenance";

/// Status value of rows waiting for their first execution.
pub const STATUS_PENDING: &str = "pending";
/// Status value of rows that finished at least once.
pub const STATUS_COMPLETED: &str = "completed";

/// Work category with independent capacity accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobClass {
    /// Rows with status `pending`.
    Pending,
    /// Completed rows with a repeat interval that are due again.
    Update,
    /// Synthetic single-instance housekeeping job.
    Maintenance,
}

impl JobClass {
    /// All classes in dispatch order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::Update, Self::Maintenance];

    /// Stable index used for per-class arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Pending => 0,
            Self::Update => 1,
            Self::Maintenance => 2,
        }
    }

    /// Human readable class name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Update => "Update",
            Self::Maintenance => "Maintenance",
        }
    }
}

impl fmt::Display for JobClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the work-queue table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Monotonic row identifier.
    pub id: i64,
    /// Lifecycle status (`pending`, `completed`, ...).
    pub status: String,
    /// Error text left by the last execution.
    pub error: Option<String>,
    /// Duration of the last execution.
    pub run_time: Option<i64>,
    /// Repeat interval; rows without one never re-run.
    pub repeat: Option<String>,
    /// First execution timestamp.
    pub first_run: Option<NaiveDateTime>,
    /// Last completed execution timestamp.
    pub last_run: Option<NaiveDateTime>,
    /// Earliest time the row may run again.
    pub next_run: Option<NaiveDateTime>,
    /// Job name.
    pub name: String,
    /// Unique external job identifier.
    pub signature: String,
}

impl WorkItem {
    /// Row eligible for the `Pending` class.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == STATUS_PENDING
    }

    /// Row eligible for the `Update` class at `now`.
    #[must_use]
    pub fn is_update_due(&self, now: NaiveDateTime) -> bool {
        self.status == STATUS_COMPLETED
            && self.repeat.is_some()
            && self.next_run.is_none_or(|next| next <= now)
    }
}

/// A unit of work handed to a [`crate::core::JobExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Class whose capacity this job consumes.
    pub class: JobClass,
    /// Job identifier (signature, or [`MAINTENANCE_JOB_ID`]).
    pub id: String,
    /// Job name for logs.
    pub name: String,
    /// Value substituted into the command template, if any.
    pub argument: Option<String>,
    /// Identifier of this particular execution.
    pub run_id: Uuid,
}

impl JobSpec {
    /// Build the spec for a work-queue row dispatched under `class`.
    #[must_use]
    pub fn from_item(class: JobClass, item: &WorkItem) -> Self {
        Self {
            class,
            id: item.signature.clone(),
            name: item.name.clone(),
            argument: Some(item.signature.clone()),
            run_id: Uuid::new_v4(),
        }
    }

    /// Build the synthetic maintenance job.
    #[must_use]
    pub fn maintenance() -> Self {
        Self {
            class: JobClass::Maintenance,
            id: MAINTENANCE_JOB_ID.to_string(),
            name: MAINTENANCE_JOB_NAME.to_string(),
            argument: None,
            run_id: Uuid::new_v4(),
        }
    }
}

/// Result of running one job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobOutcome {
    /// Process launched and exited with status zero.
    pub successful: bool,
    /// Exit code, when the process ran and exited normally.
    pub exit_code: Option<i32>,
    /// Non-empty combined output lines, in arrival order.
    pub output: Vec<String>,
}

impl JobOutcome {
    /// Successful outcome with the given output.
    #[must_use]
    pub const fn success(output: Vec<String>) -> Self {
        Self {
            successful: true,
            exit_code: Some(0),
            output,
        }
    }

    /// Failed outcome without an exit code (launch failure, signal).
    #[must_use]
    pub const fn failed(output: Vec<String>) -> Self {
        Self {
            successful: false,
            exit_code: None,
            output,
        }
    }
}
