//! Process-wide presence tracking.
//!
//! Independent of sessions and search: hosts call [`ActivityMonitor::touch`]
//! when users do something and get told when the process goes idle or wakes
//! up again.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use flume::{RecvTimeoutError, Sender};
use log::{debug, info};

use crate::clock::SharedClock;

/// Default inactivity before the process counts as idle
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(600);
/// Default pause between presence checks
pub const DEFAULT_IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    Active,
    Idle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenceChange {
    BecameIdle,
    BecameActive,
}

struct ActivityState {
    last_activity: Instant,
    presence: Presence,
}

#[derive(Clone)]
pub struct ActivityMonitor {
    inner: Arc<ActivityInner>,
}

struct ActivityInner {
    clock: SharedClock,
    threshold: Duration,
    state: Mutex<ActivityState>,
}

impl ActivityMonitor {
    #[must_use]
    pub fn new(clock: SharedClock, threshold: Duration) -> Self {
        let last_activity = clock.now();
        Self {
            inner: Arc::new(ActivityInner {
                clock,
                threshold,
                state: Mutex::new(ActivityState {
                    last_activity,
                    presence: Presence::Active,
                }),
            }),
        }
    }

    /// Record user activity now.
    pub fn touch(&self) {
        let now = self.inner.clock.now();
        self.state().last_activity = now;
    }

    #[must_use]
    pub fn presence(&self) -> Presence {
        self.state().presence
    }

    /// Re-evaluate presence, returning the transition if one happened.
    pub fn check(&self) -> Option<PresenceChange> {
        let now = self.inner.clock.now();
        let mut state = self.state();
        let idle_for = now.saturating_duration_since(state.last_activity);

        match state.presence {
            Presence::Active if idle_for >= self.inner.threshold => {
                state.presence = Presence::Idle;
                info!("Idle for {}s", idle_for.as_secs());
                Some(PresenceChange::BecameIdle)
            }
            Presence::Idle if idle_for < self.inner.threshold => {
                state.presence = Presence::Active;
                info!("Active again");
                Some(PresenceChange::BecameActive)
            }
            _ => None,
        }
    }

    /// Run [`ActivityMonitor::check`] every `interval` on its own thread.
    pub fn spawn<F>(&self, interval: Duration, on_change: F) -> io::Result<MonitorHandle>
    where
        F: Fn(PresenceChange) + Send + 'static,
    {
        let (stop_tx, stop_rx) = flume::bounded::<()>(1);
        let monitor = self.clone();

        let handle = thread::Builder::new()
            .name("activity-monitor".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if let Some(change) = monitor.check() {
                                on_change(change);
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Activity monitor stopped");
            })?;

        Ok(MonitorHandle {
            stop_tx,
            handle: Some(handle),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ActivityState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Running presence checker; stops on [`MonitorHandle::stop`] or drop.
pub struct MonitorHandle {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl MonitorHandle {
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

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn monitor() -> (ActivityMonitor, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (ActivityMonitor::new(clock.clone(), Duration::from_secs(600)), clock)
    }

    #[test]
    fn goes_idle_after_threshold() {
        let (monitor, clock) = monitor();

        clock.advance(Duration::from_secs(599));
        assert_eq!(monitor.check(), None);

        clock.advance(Duration::from_secs(1));
        assert_eq!(monitor.check(), Some(PresenceChange::BecameIdle));
        assert_eq!(monitor.presence(), Presence::Idle);
        assert_eq!(monitor.check(), None);
    }

    #[test]
    fn activity_wakes_it_up() {
        let (monitor, clock) = monitor();
        clock.advance(Duration::from_secs(700));
        monitor.check();

        monitor.touch();

        assert_eq!(monitor.check(), Some(PresenceChange::BecameActive));
        assert_eq!(monitor.presence(), Presence::Active);
    }

    #[test]
    fn touch_postpones_idleness() {
        let (monitor, clock) = monitor();
        clock.advance(Duration::from_secs(500));
        monitor.touch();
        clock.advance(Duration::from_secs(500));

        assert_eq!(monitor.check(), None);
    }

    #[test]
    fn background_checks_report_transitions() {
        let (monitor, clock) = monitor();
        let (tx, rx) = flume::unbounded();
        let handle = monitor
            .spawn(Duration::from_millis(10), move |change| {
                let _ = tx.send(change);
            })
            .unwrap();

        clock.advance(Duration::from_secs(601));
        let change = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.stop();

        assert_eq!(change, PresenceChange::BecameIdle);
    }
}
