//! Query Queue Worker
//!
//! Polls the work-queue table and runs one external process per eligible job.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use query_queue_worker::builders::build_engine;
use query_queue_worker::config::{AppConfig, DEFAULT_CONFIG_FILE};
use query_queue_worker::core::AppResult;
use query_queue_worker::infra::MySqlWorkQueue;
use query_queue_worker::runtime::{spawn_signal_watcher, KeyWatcher, ShellExecutor, TokioSpawner};
use query_queue_worker::util::init_logging;

#[derive(Parser)]
#[command(name = "query-queue-worker", version)]
#[command(about = "Dispatches work-queue rows to external processes", long_about = None)]
struct Cli {
    /// Settings file
    #[arg(short, long, env = "QQW_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Do not log to the console
    #[arg(short, long, env = "QQW_SILENT")]
    silent: bool,

    /// Disable keyboard commands
    #[arg(long)]
    no_keys: bool,
}

async fn run(cli: Cli) -> AppResult<()> {
    let cfg = AppConfig::load(&cli.config)?;
    init_logging(&cfg.logs, cfg.debug, cli.silent)?;
    info!("Query-Queue-Worker : V{}", env!("CARGO_PKG_VERSION"));

    let queue = MySqlWorkQueue::connect(&cfg.mysql)
        .await
        .context("cannot connect to MySQL")?;
    let executor = ShellExecutor::new(&cfg.worker.executable, &cfg.worker.commands)?;
    let engine = build_engine(&cfg, Arc::new(queue), executor, TokioSpawner::current())?;

    let signals = spawn_signal_watcher(engine.handle()).context("cannot install signal handlers")?;
    let keys = if cli.no_keys {
        None
    } else {
        KeyWatcher::spawn(engine.handle())
    };

    let result = engine.run().await;
    signals.abort();
    drop(keys);
    result?;

    info!("worker engine stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let silent = cli.silent;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if tracing::dispatcher::has_been_set() {
                error!("{e:#}");
            }
            if silent || !tracing::dispatcher::has_been_set() {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}
