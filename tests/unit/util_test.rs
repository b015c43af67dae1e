//! Tests for utility functions

use std::io::Write;

use query_queue_worker::core::{CapacityState, EngineStats, JobClass};
use query_queue_worker::util::{render_stats_table, LogDestination, RollingFile};

#[test]
fn test_log_destination_silent_without_file_discards() {
    let destination = LogDestination::resolve(false, true);
    assert_eq!(destination, LogDestination::Nowhere);
    assert!(!destination.console());
    assert!(!destination.file());
}

#[test]
fn test_log_destination_file_only_when_silent() {
    let destination = LogDestination::resolve(true, true);
    assert!(destination.file());
    assert!(!destination.console());
}

#[test]
fn test_stats_table_lists_every_class() {
    let stats = EngineStats::new();
    stats.record(JobClass::Update, false);
    let table = render_stats_table(&stats.snapshot(), &CapacityState::new(3));

    for class in JobClass::ALL {
        assert!(table.contains(class.as_str()));
    }
    assert!(table.contains("FAILED"));
    assert!(table.contains("capacity: 0 used of 3 total"));
}

#[test]
fn test_rolling_file_keeps_bounded_history() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = RollingFile::open(dir.path(), "qqw.log", 8, 3).unwrap();
    for i in 0..10 {
        log.write_all(format!("line-{i}\n").as_bytes()).unwrap();
    }
    log.flush().unwrap();

    assert!(log.rotated_path(3).exists());
    assert!(!log.rotated_path(4).exists());
    assert_eq!(std::fs::read_to_string(log.path()).unwrap(), "line-9\n");
}
