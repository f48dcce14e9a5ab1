//! Background timeout sweeps

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{RecvTimeoutError, Sender};
use log::debug;

use super::registry::{SessionRegistry, SweepReport};

/// Default pause between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Thread that periodically ends idle sessions and expired selections.
///
/// Stops when [`Reaper::stop`] is called or the handle is dropped.
pub struct Reaper {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Reaper {
    pub fn spawn(registry: SessionRegistry, interval: Duration) -> io::Result<Self> {
        Self::spawn_with(registry, interval, |_| {})
    }

    /// Like [`Reaper::spawn`], calling `on_sweep` after every sweep that
    /// ended something so the host can retract stale controls.
    pub fn spawn_with<F>(registry: SessionRegistry, interval: Duration, on_sweep: F) -> io::Result<Self>
    where
        F: Fn(&SweepReport) + Send + 'static,
    {
        let (stop_tx, stop_rx) = flume::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("session-reaper".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let report = registry.sweep();
                            if !report.is_empty() {
                                on_sweep(&report);
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Session reaper stopped");
            })?;

        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
