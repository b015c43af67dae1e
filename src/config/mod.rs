//! Configuration models for the worker, its store and its logs.

pub mod settings;

pub use settings::{
    AppConfig, BreakerConfig, CommandsConfig, LogsConfig, MaintenanceConfig, MysqlConfig,
    ProcessesConfig, RetryConfig, StoreConfig, StoreErrorMode, ThreadsConfig, WorkerConfig,
    DEFAULT_CONFIG_FILE, DEFAULT_TABLE, SIGNATURE_PLACEHOLDER,
};
