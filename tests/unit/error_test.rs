//! Tests for error types

use query_queue_worker::core::SchedulerError;

#[test]
fn test_insufficient_capacity_error() {
    let err = SchedulerError::InsufficientCapacity {
        required: 3,
        configured: 2,
    };
    assert_eq!(
        format!("{}", err),
        "thread max count is too low: 2 configured, at least 3 required"
    );
}

#[test]
fn test_capacity_exceeded_error() {
    let err = SchedulerError::CapacityExceeded;
    assert_eq!(format!("{}", err), "capacity exceeded");
}

#[test]
fn test_store_error() {
    let err = SchedulerError::Store("connection refused".to_string());
    assert_eq!(format!("{}", err), "work queue store error: connection refused");
}

#[test]
fn test_config_error() {
    let err = SchedulerError::Config("tick must be greater than 0".to_string());
    assert_eq!(format!("{}", err), "invalid configuration: tick must be greater than 0");
}

#[test]
fn test_already_ran_error() {
    let err = SchedulerError::AlreadyRan;
    assert!(format!("{}", err).starts_with("engine already ran"));
}

#[test]
fn test_scheduler_error_converts_into_anyhow() {
    let err: anyhow::Error = SchedulerError::CapacityExceeded.into();
    assert!(err.downcast_ref::<SchedulerError>().is_some());
}
