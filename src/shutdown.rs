//! Process lifecycle.
//!
//! Owned external resources (schedulers, database handles, sink clients)
//! are registered with a [`Closers`] list; on SIGINT/SIGTERM a dedicated
//! signal thread raises the global termination flag, closes every
//! registered resource exactly once in registration order, and exits 0.

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::Result;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::info;

/// Standard exit codes.
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }
}

/// Global termination flag for graceful shutdown.
pub static SHOULD_TERMINATE: AtomicBool = AtomicBool::new(false);

/// Ordered registry of labelled close operations, each run exactly once.
#[derive(Default)]
pub struct Closers {
    tasks: Vec<(String, Box<dyn FnOnce() + Send>)>,
}

impl Closers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, label: &str, close: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks.push((label.to_string(), Box::new(close)));
    }

    /// Close everything in registration order. Draining the list makes a
    /// second call a no-op.
    pub fn close_all(&mut self) {
        for (label, close) in self.tasks.drain(..) {
            info!(resource = %label, "closing");
            close();
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Signal thread handle.
pub struct SignalHandler {
    _handle: thread::JoinHandle<()>,
}

impl SignalHandler {
    /// Install the SIGINT/SIGTERM handler. The handler owns the closer
    /// registry and terminates the process after running it.
    pub fn install(mut closers: Closers) -> Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM])?;

        let handle = thread::spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "stopping syslog collector");
                SHOULD_TERMINATE.store(true, Ordering::Relaxed);
                closers.close_all();
                ExitCode::Success.exit();
            }
        });

        Ok(SignalHandler { _handle: handle })
    }

    /// Whether shutdown has been requested.
    pub fn should_terminate() -> bool {
        SHOULD_TERMINATE.load(Ordering::Relaxed)
    }
}
