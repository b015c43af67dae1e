//! Keyboard commands read from an interactive terminal.
//!
//! `q` stops the engine, `s` prints the statistics table. The terminal is
//! put in raw mode while the watcher lives and restored when it is dropped.
//! Raw mode swallows Ctrl-C, so it is mapped to a stop as well.

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::{debug, info, warn};

use crate::core::EngineHandle;
use crate::util::render_stats_table;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Command bound to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    /// Stop the engine.
    Quit,
    /// Print the statistics table.
    Stats,
}

impl KeyCommand {
    /// Command for a key press, case insensitive. Releases and repeats map to nothing.
    #[must_use]
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Self::Quit),
            KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
                debug!(key = %c, "ignoring control key");
                None
            }
            KeyCode::Char('q' | 'Q') => Some(Self::Quit),
            KeyCode::Char('s' | 'S') => Some(Self::Stats),
            _ => None,
        }
    }
}

/// Raw mode clears output post-processing, which would leave log lines
/// without a carriage return. Turn it back on for the controlling terminal.
#[cfg(unix)]
fn restore_output_processing() -> nix::Result<()> {
    use nix::sys::termios::{tcgetattr, tcsetattr, OutputFlags, SetArg};

    let stdin = std::io::stdin();
    let mut tio = tcgetattr(&stdin)?;
    tio.output_flags.insert(OutputFlags::OPOST | OutputFlags::ONLCR);
    tcsetattr(&stdin, SetArg::TCSANOW, &tio)
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
const fn restore_output_processing() -> std::io::Result<()> {
    Ok(())
}

/// Reads key presses on a background thread.
pub struct KeyWatcher {
    shutdown: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl KeyWatcher {
    /// Start watching stdin when it is a terminal; `None` otherwise.
    #[must_use]
    pub fn spawn(engine: EngineHandle) -> Option<Self> {
        if !std::io::stdin().is_terminal() {
            debug!("stdin is not a terminal, keyboard commands disabled");
            return None;
        }
        if let Err(e) = terminal::enable_raw_mode() {
            warn!(error = %e, "cannot switch terminal to raw mode, keyboard commands disabled");
            return None;
        }
        if let Err(e) = restore_output_processing() {
            warn!(error = %e, "cannot restore terminal output processing");
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name("key-watcher".into())
            .spawn(move || watch_keys(&engine, &flag));
        match thread {
            Ok(thread) => {
                info!("press 'q' to quit, 's' to show statistics");
                Some(Self {
                    shutdown,
                    thread: Some(thread),
                })
            }
            Err(e) => {
                warn!(error = %e, "cannot start keyboard watcher");
                let _ = terminal::disable_raw_mode();
                None
            }
        }
    }
}

impl Drop for KeyWatcher {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        if let Err(e) = terminal::disable_raw_mode() {
            warn!(error = %e, "cannot restore terminal mode");
        }
    }
}

fn watch_keys(engine: &EngineHandle, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::Acquire) && !engine.stop_requested() {
        match event::poll(POLL_INTERVAL) {
            Ok(false) => {}
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => match KeyCommand::from_key(&key) {
                    Some(KeyCommand::Quit) => {
                        info!("quit key pressed");
                        engine.stop();
                        return;
                    }
                    Some(KeyCommand::Stats) => {
                        println!("{}", render_stats_table(&engine.stats(), &engine.capacity()));
                    }
                    None => {}
                },
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "cannot read keyboard input");
                    return;
                }
            },
            Err(e) => {
                warn!(error = %e, "cannot poll keyboard input");
                return;
            }
        }
    }
}
