//! Launching eligible jobs against available class capacity.

use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::core::guard::StoreGuard;
use crate::core::{
    CapacityRegistry, EngineStats, JobClass, JobExecutor, JobSpec, SchedulerError, Spawn,
    WorkQueue,
};

/// Turns available capacity into running jobs.
pub struct Dispatcher<Q, X, S> {
    queue: Arc<Q>,
    executor: X,
    spawner: S,
    registry: Arc<CapacityRegistry>,
    stats: Arc<EngineStats>,
    guard: Arc<StoreGuard>,
}

impl<Q, X, S> Dispatcher<Q, X, S>
where
    Q: WorkQueue,
    X: JobExecutor,
    S: Spawn,
{
    /// Dispatcher sharing `registry` and `stats` with the engine.
    pub fn new(
        queue: Arc<Q>,
        executor: X,
        spawner: S,
        registry: Arc<CapacityRegistry>,
        stats: Arc<EngineStats>,
        guard: Arc<StoreGuard>,
    ) -> Self {
        Self {
            queue,
            executor,
            spawner,
            registry,
            stats,
            guard,
        }
    }

    /// Launch eligible rows of a row-backed class (`Pending` or `Update`).
    ///
    /// Returns the number of jobs launched.
    ///
    /// # Errors
    ///
    /// Store failures under the fail-fast policy.
    pub async fn dispatch(&self, class: JobClass) -> Result<usize, SchedulerError> {
        if class == JobClass::Maintenance {
            return Ok(self.dispatch_maintenance());
        }

        let available = self.registry.available(class);
        if available == 0 {
            info!(%class, "skipping process, no threads available");
            return Ok(0);
        }

        let Some(items) = self
            .guard
            .call("eligible", || self.queue.eligible(class, available))
            .await?
        else {
            return Ok(0);
        };

        let mut launched = 0;
        for item in items.iter().take(available as usize) {
            if !self.launch(JobSpec::from_item(class, item)) {
                break;
            }
            launched += 1;
        }

        if launched == 0 {
            info!(%class, "no jobs to be processed");
        }
        Ok(launched)
    }

    /// Launch the single maintenance job if its slot is free.
    pub fn dispatch_maintenance(&self) -> usize {
        if self.registry.available(JobClass::Maintenance) == 0 {
            info!(class = %JobClass::Maintenance, "skipping process, no threads available");
            return 0;
        }
        usize::from(self.launch(JobSpec::maintenance()))
    }

    /// Take a capacity permit and spawn `job`. Returns `false` when no capacity was left.
    fn launch(&self, job: JobSpec) -> bool {
        let permit = match self.registry.acquire(job.class) {
            Ok(permit) => permit,
            Err(e) => {
                warn!(class = %job.class, id = %job.id, error = %e, "job not launched");
                return false;
            }
        };

        let span = info_span!(
            "job",
            class = %job.class,
            thread = permit.slot(),
            id = %job.id,
            run = %job.run_id,
        );
        let executor = self.executor.clone();
        let stats = Arc::clone(&self.stats);

        self.spawner.spawn(
            async move {
                info!(name = %job.name, "running new job");
                let outcome = executor.execute(&job).await;
                drop(permit);
                stats.record(job.class, outcome.successful);
                debug!(exit_code = ?outcome.exit_code, lines = outcome.output.len(), "job output collected");
                info!(successful = outcome.successful, "finalized job");
            }
            .instrument(span),
        );
        true
    }
}
