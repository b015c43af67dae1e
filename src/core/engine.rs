//! The scheduler loop.
//!
//! An [`Engine`] owns the capacity registry, statistics, prober and
//! dispatcher for one run. [`Engine::run`] ticks at a fixed period; every
//! `idle_ticks` ticks, if any capacity is free, it probes demand, allocates
//! class ceilings and dispatches. Jobs run as detached tasks, so a pass
//! never waits on job execution.
//!
//! Stopping is cooperative: [`EngineHandle::stop`] flips the status and
//! wakes the tick sleep through a `watch` channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::guard::StoreGuard;
use crate::core::{
    CapacityRegistry, CapacityState, DemandProber, Dispatcher, EngineStats, JobClass, JobExecutor,
    SchedulerError, Spawn, StatsSnapshot, WorkQueue,
};

/// Engine lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Not ticking.
    Stopped,
    /// Ticking and dispatching.
    Started,
}

/// Values that drive the scheduler loop.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Total worker capacity shared by every class.
    pub total_capacity: u32,
    /// Wait for in-flight jobs when stopping.
    pub wait_to_finish: bool,
    /// Ticks between two lookups.
    pub idle_ticks: u32,
    /// Length of one tick.
    pub tick: Duration,
    /// Minimum time between two maintenance runs.
    pub maintenance_idle: TimeDelta,
}

struct Shared {
    status: Mutex<EngineStatus>,
    stop_tx: watch::Sender<bool>,
}

/// Cloneable handle used by signal and keyboard watchers.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<Shared>,
    registry: Arc<CapacityRegistry>,
    stats: Arc<EngineStats>,
}

impl EngineHandle {
    /// Request the engine to stop at the next tick boundary.
    pub fn stop(&self) {
        let mut status = self.shared.status.lock();
        if *status == EngineStatus::Started {
            info!("stopping worker engine");
        }
        *status = EngineStatus::Stopped;
        // Sent under the status lock so `run` never misses a stop issued before it started.
        self.shared.stop_tx.send_replace(true);
    }

    /// Current status.
    pub fn status(&self) -> EngineStatus {
        *self.shared.status.lock()
    }

    /// A stop has been requested.
    pub fn stop_requested(&self) -> bool {
        *self.shared.stop_tx.borrow()
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Capacity snapshot.
    pub fn capacity(&self) -> CapacityState {
        self.registry.snapshot()
    }
}

/// Scheduler context for one run.
pub struct Engine<Q, X, S> {
    config: EngineConfig,
    registry: Arc<CapacityRegistry>,
    stats: Arc<EngineStats>,
    prober: DemandProber<Q>,
    dispatcher: Dispatcher<Q, X, S>,
    shared: Arc<Shared>,
    ran: AtomicBool,
}

impl<Q, X, S> Engine<Q, X, S>
where
    Q: WorkQueue,
    X: JobExecutor,
    S: Spawn,
{
    /// Assemble an engine over `queue`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InsufficientCapacity`] when the configured capacity
    /// is too small, [`SchedulerError::Config`] for a zero-length tick.
    pub fn new(
        config: EngineConfig,
        queue: Arc<Q>,
        executor: X,
        spawner: S,
        guard: StoreGuard,
    ) -> Result<Self, SchedulerError> {
        if config.tick.is_zero() {
            return Err(SchedulerError::Config("tick must be greater than 0".into()));
        }
        let registry = Arc::new(CapacityRegistry::new(config.total_capacity)?);
        let stats = Arc::new(EngineStats::new());
        let (stop_tx, stop_rx) = watch::channel(false);
        let guard = Arc::new(guard.with_stop_signal(stop_rx));
        let prober = DemandProber::new(
            Arc::clone(&queue),
            Arc::clone(&stats),
            Arc::clone(&guard),
            config.maintenance_idle,
        );
        let dispatcher = Dispatcher::new(
            queue,
            executor,
            spawner,
            Arc::clone(&registry),
            Arc::clone(&stats),
            guard,
        );
        Ok(Self {
            config,
            registry,
            stats,
            prober,
            dispatcher,
            shared: Arc::new(Shared {
                status: Mutex::new(EngineStatus::Stopped),
                stop_tx,
            }),
            ran: AtomicBool::new(false),
        })
    }

    /// Handle for stopping the engine and reading its state.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: Arc::clone(&self.shared),
            registry: Arc::clone(&self.registry),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Shared capacity registry.
    pub fn registry(&self) -> &Arc<CapacityRegistry> {
        &self.registry
    }

    /// Shared statistics.
    pub fn stats(&self) -> &Arc<EngineStats> {
        &self.stats
    }

    /// Current status.
    pub fn status(&self) -> EngineStatus {
        *self.shared.status.lock()
    }

    /// Request a stop; same as [`EngineHandle::stop`].
    pub fn stop(&self) {
        self.handle().stop();
    }

    /// Run the scheduler loop until stopped, then drain.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::AlreadyRan`] on a second call; store failures under
    /// the fail-fast policy end the loop without draining.
    pub async fn run(&self) -> Result<(), SchedulerError> {
        if self.ran.swap(true, Ordering::AcqRel) {
            return Err(SchedulerError::AlreadyRan);
        }

        let mut stop_rx = self.shared.stop_tx.subscribe();
        {
            let mut status = self.shared.status.lock();
            if *stop_rx.borrow_and_update() {
                info!("stop requested before start, not starting worker engine");
                return Ok(());
            }
            *status = EngineStatus::Started;
        }
        info!(
            capacity = self.config.total_capacity,
            idle_ticks = self.config.idle_ticks,
            "starting worker engine"
        );

        // None until the first lookup, which forces one on the first tick.
        let mut cycles: Option<u32> = None;
        while self.status() == EngineStatus::Started {
            if cycles.is_none_or(|c| c >= self.config.idle_ticks) {
                cycles = Some(0);
                if self.registry.allocation_count() > 0 {
                    if let Err(e) = self.pass().await {
                        *self.shared.status.lock() = EngineStatus::Stopped;
                        return Err(e);
                    }
                }
            }
            cycles = cycles.map(|c| c.saturating_add(1));

            tokio::select! {
                () = tokio::time::sleep(self.config.tick) => {}
                _ = stop_rx.changed() => {}
            }
        }

        self.drain().await;
        Ok(())
    }

    /// One lookup, allocation and dispatch pass.
    async fn pass(&self) -> Result<(), SchedulerError> {
        let Some(demand) = self.prober.probe().await? else {
            debug!("lookup skipped by store guard");
            return Ok(());
        };
        info!(
            pending = demand.pending,
            update = demand.update,
            maintenance = demand.maintenance,
            "lookup for pending jobs"
        );

        let allocation = self.registry.allocate(demand);
        debug!(?allocation, "allocated class capacity");

        if demand.pending > 0 {
            self.dispatcher.dispatch(JobClass::Pending).await?;
        }
        if demand.update > 0 {
            self.dispatcher.dispatch(JobClass::Update).await?;
        }
        if demand.maintenance > 0 {
            self.dispatcher.dispatch_maintenance();
        }
        Ok(())
    }

    async fn drain(&self) {
        let in_flight = self.registry.total_used();
        if in_flight == 0 {
            return;
        }
        if self.config.wait_to_finish {
            info!(in_flight, "waiting for jobs to finish");
            self.registry.wait_idle().await;
            info!("all jobs finished");
        } else {
            warn!(in_flight, "leaving running jobs behind");
        }
    }
}
