//! OS signal watcher that stops the engine.

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::EngineHandle;

/// Stop `engine` on SIGTERM, SIGINT or SIGQUIT; SIGHUP is consumed and ignored.
///
/// # Errors
///
/// When a signal handler cannot be registered.
#[cfg(unix)]
pub fn spawn_signal_watcher(engine: EngineHandle) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut quit = signal(SignalKind::quit())?;
    let mut hangup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                _ = terminate.recv() => "SIGTERM",
                _ = interrupt.recv() => "SIGINT",
                _ = quit.recv() => "SIGQUIT",
                _ = hangup.recv() => {
                    debug!("ignoring SIGHUP");
                    continue;
                }
            };
            info!(signal = name, "received shutdown signal");
            engine.stop();
            return;
        }
    }))
}

/// Stop `engine` on Ctrl-C.
///
/// # Errors
///
/// Never on this platform; the signature matches the Unix watcher.
#[cfg(not(unix))]
pub fn spawn_signal_watcher(engine: EngineHandle) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(signal = "ctrl-c", "received shutdown signal");
            engine.stop();
        } else {
            debug!("ctrl-c handler unavailable");
        }
    }))
}
