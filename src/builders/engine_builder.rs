//! Build an [`Engine`] from validated settings.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::{Engine, JobExecutor, SchedulerError, Spawn, StoreGuard, WorkQueue};

/// Assemble an engine over `queue` from `cfg`.
///
/// # Errors
///
/// [`SchedulerError::Config`] when `cfg` fails validation, otherwise any
/// error from [`Engine::new`].
pub fn build_engine<Q, X, S>(
    cfg: &AppConfig,
    queue: Arc<Q>,
    executor: X,
    spawner: S,
) -> Result<Engine<Q, X, S>, SchedulerError>
where
    Q: WorkQueue,
    X: JobExecutor,
    S: Spawn,
{
    cfg.validate()
        .map_err(|e| SchedulerError::Config(format!("config invalid: {e}")))?;

    Engine::new(
        cfg.engine_config(),
        queue,
        executor,
        spawner,
        StoreGuard::new(cfg.store_policy()),
    )
}
