//! # Query Queue Worker
//!
//! A polling job scheduler for a shared MySQL work-queue table.
//!
//! At a fixed tick the scheduler counts eligible rows, splits a global
//! capacity budget between three job classes and launches one external
//! process per job:
//!
//! - **Pending**: rows with status `pending`, never run or waiting to run.
//! - **Update**: completed rows with a repeat interval that are due again.
//! - **Maintenance**: a single parameterless housekeeping job on a timer.
//!
//! Maintenance is reserved one slot whenever it is due. Pending and update
//! share the rest; when both exceed what is free, pending gets half.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use query_queue_worker::builders::build_engine;
//! use query_queue_worker::config::AppConfig;
//! use query_queue_worker::infra::MySqlWorkQueue;
//! use query_queue_worker::runtime::{ShellExecutor, TokioSpawner};
//!
//! let cfg = AppConfig::load("query-queue-config.json".as_ref())?;
//! let queue = Arc::new(MySqlWorkQueue::connect(&cfg.mysql).await?);
//! let executor = ShellExecutor::new(&cfg.worker.executable, &cfg.worker.commands)?;
//! let engine = build_engine(&cfg, queue, executor, TokioSpawner::current())?;
//! engine.run().await?;
//! ```
//!
//! Job rows are never written by the scheduler; each launched process
//! updates its own row.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and capacity accounting.
pub mod core;
/// Configuration models for the worker, its store and its logs.
pub mod config;
/// Builders to construct the engine from configuration.
pub mod builders;
/// Infrastructure adapters for the work-queue store.
pub mod infra;
/// Runtime adapters: spawning, job processes, signals and keys.
pub mod runtime;
/// Shared utilities.
pub mod util;
