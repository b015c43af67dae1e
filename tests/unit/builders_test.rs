//! Tests for building the engine from configuration

use std::sync::Arc;

use async_trait::async_trait;
use query_queue_worker::builders::build_engine;
use query_queue_worker::config::AppConfig;
use query_queue_worker::core::{EngineStatus, JobExecutor, JobOutcome, JobSpec, SchedulerError};
use query_queue_worker::infra::InMemoryWorkQueue;
use query_queue_worker::runtime::TokioSpawner;

#[derive(Clone)]
struct NoopExecutor;

#[async_trait]
impl JobExecutor for NoopExecutor {
    async fn execute(&self, _job: &JobSpec) -> JobOutcome {
        JobOutcome::success(Vec::new())
    }
}

fn config(max_threads: u32) -> AppConfig {
    let value = serde_json::json!({
        "threads": { "max": max_threads },
        "mysql": { "database": "reports", "username": "worker" },
        "worker": {
            "idle": 1,
            "executable": "true",
            "commands": { "single": "%s", "update": "%s", "maintenance": "m" }
        }
    });
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_build_engine_from_config() {
    let engine = build_engine(
        &config(5),
        Arc::new(InMemoryWorkQueue::new()),
        NoopExecutor,
        TokioSpawner::current(),
    )
    .unwrap();
    assert_eq!(engine.registry().total(), 5);
    assert_eq!(engine.status(), EngineStatus::Stopped);
}

#[tokio::test]
async fn test_build_engine_rejects_invalid_config() {
    let result = build_engine(
        &config(2),
        Arc::new(InMemoryWorkQueue::new()),
        NoopExecutor,
        TokioSpawner::current(),
    );
    assert!(matches!(result, Err(SchedulerError::Config(_))));
}
