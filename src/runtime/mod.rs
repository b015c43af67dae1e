//! Runtime adapters: task spawning, job processes, signals and keyboard input.

pub mod keys;
pub mod process;
pub mod signals;
pub mod tokio_spawner;

pub use keys::{KeyCommand, KeyWatcher};
pub use process::{CommandTemplate, ShellExecutor};
pub use signals::spawn_signal_watcher;
pub use tokio_spawner::TokioSpawner;
