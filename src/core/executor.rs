//! Job execution and task spawning seams.

use std::future::Future;

use async_trait::async_trait;

use crate::core::{JobOutcome, JobSpec};

/// Runs one job to completion.
///
/// Implementations never fail: launch errors and non-zero exits are reported
/// through [`JobOutcome::successful`].
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use query_queue_worker::core::{JobExecutor, JobOutcome, JobSpec};
///
/// #[derive(Clone)]
/// struct EchoExecutor;
///
/// #[async_trait]
/// impl JobExecutor for EchoExecutor {
///     async fn execute(&self, job: &JobSpec) -> JobOutcome {
///         JobOutcome::success(vec![format!("ran {}", job.id)])
///     }
/// }
/// ```
#[async_trait]
pub trait JobExecutor: Send + Sync + Clone + 'static {
    /// Execute `job` and report how it ended.
    async fn execute(&self, job: &JobSpec) -> JobOutcome;
}

/// Abstraction for spawning job execution on a runtime.
pub trait Spawn {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
