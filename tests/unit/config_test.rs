//! Tests for configuration loading and validation

use std::io::Write;
use std::time::Duration;

use query_queue_worker::config::{AppConfig, StoreErrorMode, DEFAULT_TABLE};
use query_queue_worker::core::StorePolicy;

fn minimal_json() -> serde_json::Value {
    serde_json::json!({
        "mysql": {
            "database": "reports",
            "username": "worker"
        },
        "worker": {
            "idle": 2,
            "executable": "php",
            "commands": {
                "single": "artisan run %s",
                "update": "artisan update %s",
                "maintenance": "artisan maintenance"
            }
        }
    })
}

fn parse(value: &serde_json::Value) -> Result<AppConfig, String> {
    AppConfig::from_json_str(&value.to_string())
}

#[test]
fn test_defaults_applied() {
    let cfg = parse(&minimal_json()).unwrap();
    assert!(!cfg.debug);
    assert!(!cfg.logs.enabled);
    assert!(cfg.threads.max >= 3);
    assert!(cfg.threads.wait_to_finish);
    assert_eq!(cfg.mysql.port, 3306);
    assert_eq!(cfg.mysql.hostname, "localhost");
    assert_eq!(cfg.mysql.table, DEFAULT_TABLE);
    assert_eq!(cfg.worker.tick_ms, 1000);
    assert_eq!(cfg.worker.processes.maintenance.idle, 3600);
    assert_eq!(cfg.store.on_error, StoreErrorMode::FailFast);
}

#[test]
fn test_port_accepts_string_or_number() {
    let mut value = minimal_json();
    value["mysql"]["port"] = serde_json::json!("3307");
    assert_eq!(parse(&value).unwrap().mysql.port, 3307);

    value["mysql"]["port"] = serde_json::json!(3308);
    assert_eq!(parse(&value).unwrap().mysql.port, 3308);

    value["mysql"]["port"] = serde_json::json!("not-a-port");
    assert!(parse(&value).is_err());
}

#[test]
fn test_capacity_below_minimum_rejected() {
    let mut value = minimal_json();
    value["threads"] = serde_json::json!({ "max": 2 });
    let err = parse(&value).unwrap_err();
    assert!(err.contains("threads.max is too low"));
}

#[test]
fn test_zero_tick_rejected() {
    let mut value = minimal_json();
    value["worker"]["tickMs"] = serde_json::json!(0);
    assert!(parse(&value).is_err());
}

#[test]
fn test_command_placeholders_validated() {
    let mut value = minimal_json();
    value["worker"]["commands"]["single"] = serde_json::json!("artisan run");
    assert!(parse(&value).unwrap_err().contains("single"));

    let mut value = minimal_json();
    value["worker"]["commands"]["update"] = serde_json::json!("artisan %s %s");
    assert!(parse(&value).unwrap_err().contains("update"));

    let mut value = minimal_json();
    value["worker"]["commands"]["maintenance"] = serde_json::json!("artisan %s");
    assert!(parse(&value).unwrap_err().contains("maintenance"));
}

#[test]
fn test_table_must_be_identifier() {
    let mut value = minimal_json();
    value["mysql"]["table"] = serde_json::json!("jobs; DROP TABLE users");
    assert!(parse(&value).unwrap_err().contains("mysql.table"));

    value["mysql"]["table"] = serde_json::json!("tbl_Queue2");
    assert!(parse(&value).is_ok());
}

#[test]
fn test_missing_required_section_rejected() {
    let mut value = minimal_json();
    value.as_object_mut().unwrap().remove("worker");
    assert!(parse(&value).unwrap_err().starts_with("parse error"));
}

#[test]
fn test_engine_config_conversion() {
    let mut value = minimal_json();
    value["threads"] = serde_json::json!({ "max": 6, "waitToFinish": false });
    value["worker"]["tickMs"] = serde_json::json!(250);
    value["worker"]["processes"] = serde_json::json!({ "maintenance": { "idle": 90 } });

    let engine = parse(&value).unwrap().engine_config();
    assert_eq!(engine.total_capacity, 6);
    assert!(!engine.wait_to_finish);
    assert_eq!(engine.idle_ticks, 2);
    assert_eq!(engine.tick, Duration::from_millis(250));
    assert_eq!(engine.maintenance_idle.num_seconds(), 90);
}

#[test]
fn test_store_policy_conversion() {
    let cfg = parse(&minimal_json()).unwrap();
    assert_eq!(cfg.store_policy(), StorePolicy::FailFast);

    let mut value = minimal_json();
    value["store"] = serde_json::json!({
        "onError": "retry",
        "retry": { "maxAttempts": 4, "backoffMs": 100, "maxBackoffMs": 800 },
        "breaker": { "failureThreshold": 2, "cooldownSecs": 7 }
    });
    match parse(&value).unwrap().store_policy() {
        StorePolicy::Retry(policy) => {
            assert_eq!(policy.max_attempts, 4);
            assert_eq!(policy.backoff, Duration::from_millis(100));
            assert_eq!(policy.max_backoff, Duration::from_millis(800));
            assert_eq!(policy.failure_threshold, 2);
            assert_eq!(policy.cooldown, Duration::from_secs(7));
        }
        StorePolicy::FailFast => panic!("expected retry policy"),
    }
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", minimal_json()).unwrap();
    let cfg = AppConfig::load(file.path()).unwrap();
    assert_eq!(cfg.mysql.database, "reports");

    let missing = AppConfig::load(std::path::Path::new("/nonexistent/qqw.json")).unwrap_err();
    assert!(format!("{missing:#}").contains("cannot read config file"));
}

#[test]
fn test_sample_config_is_valid() {
    let raw = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/query-queue-config.json")).unwrap();
    let cfg = AppConfig::from_json_str(&raw).unwrap();
    assert_eq!(cfg.threads.max, 8);
    assert!(cfg.logs.enabled);
}
