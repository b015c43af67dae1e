//! Core scheduling abstractions and capacity accounting.

pub mod allocator;
pub mod capacity;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod executor;
pub mod guard;
pub mod job;
pub mod prober;
pub mod queue;
pub mod stats;

pub use allocator::{allocate, Allocation, Demand, Grant};
pub use capacity::{CapacityPermit, CapacityRegistry, CapacityState, ClassSlot, MIN_CAPACITY};
pub use dispatcher::Dispatcher;
pub use engine::{Engine, EngineConfig, EngineHandle, EngineStatus};
pub use error::{AppResult, SchedulerError};
pub use executor::{JobExecutor, Spawn};
pub use guard::{CircuitState, RetryPolicy, StoreGuard, StorePolicy};
pub use job::{JobClass, JobOutcome, JobSpec, WorkItem, MAINTENANCE_JOB_ID, MAINTENANCE_JOB_NAME};
pub use prober::DemandProber;
pub use queue::{QueueCounts, WorkQueue};
pub use stats::{ClassStats, EngineStats, StatsSnapshot};
