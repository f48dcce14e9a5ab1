//! Registry of live sessions and pending selections.
//!
//! Each paginator sits behind its own mutex; anything that reads or deletes a
//! session directory holds that lock for the whole operation. The table lock
//! is only taken to look entries up or detach them, never while a session
//! lock is held.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, info};

use super::paginator::SessionPaginator;
use super::selection::SelectionState;
use super::types::{
    ChoiceList, ChunkView, CleanupReport, Direction, OwnerId, RenderSession, SessionError,
    SessionId, SlotId,
};
use crate::clock::SharedClock;
use crate::corpus::PdfMatch;

/// Default inactivity before a session is ended
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(120);
/// Default lifetime of a pending selection
pub const DEFAULT_SELECTION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    pub session: Duration,
    pub selection: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            session: DEFAULT_SESSION_TIMEOUT,
            selection: DEFAULT_SELECTION_TIMEOUT,
        }
    }
}

type SharedPaginator = Arc<Mutex<SessionPaginator>>;

struct SessionEntry {
    slot: SlotId,
    paginator: SharedPaginator,
}

struct SelectionEntry {
    slot: SlotId,
    state: SelectionState,
}

#[derive(Default)]
struct Tables {
    sessions: HashMap<SessionId, SessionEntry>,
    session_slots: HashMap<SlotId, SessionId>,
    selections: HashMap<SessionId, SelectionEntry>,
    selection_slots: HashMap<SlotId, SessionId>,
}

impl Tables {
    fn detach_session(&mut self, id: &SessionId) -> Option<SharedPaginator> {
        let entry = self.sessions.remove(id)?;
        if self.session_slots.get(&entry.slot) == Some(id) {
            self.session_slots.remove(&entry.slot);
        }
        Some(entry.paginator)
    }

    fn detach_selection(&mut self, id: &SessionId) -> Option<SelectionEntry> {
        let entry = self.selections.remove(id)?;
        if self.selection_slots.get(&entry.slot) == Some(id) {
            self.selection_slots.remove(&entry.slot);
        }
        Some(entry)
    }
}

/// Result of showing a new view in a slot
#[derive(Clone, Debug)]
pub struct Opened {
    pub view: ChunkView,
    /// Session that previously occupied the slot and has now ended
    pub superseded: Option<SessionId>,
}

/// What a timeout sweep ended
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub ended_sessions: Vec<SessionId>,
    pub expired_selections: Vec<SessionId>,
}

impl SweepReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ended_sessions.is_empty() && self.expired_selections.is_empty()
    }
}

#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    tables: Mutex<Tables>,
    clock: SharedClock,
    timeouts: Timeouts,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionRegistry {
    #[must_use]
    pub fn new(clock: SharedClock, timeouts: Timeouts) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                tables: Mutex::new(Tables::default()),
                clock,
                timeouts,
            }),
        }
    }

    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.inner.clock
    }

    #[must_use]
    pub fn timeouts(&self) -> Timeouts {
        self.inner.timeouts
    }

    /// Start paginating `session` in `slot`, ending whatever was shown there
    /// and retiring any selection still pending in it.
    pub fn open_session(
        &self,
        slot: SlotId,
        session: RenderSession,
        owner: OwnerId,
    ) -> Result<Opened, SessionError> {
        let paginator = SessionPaginator::new(session, owner, Arc::clone(&self.inner.clock))?;
        let view = paginator.current()?;
        let id = view.session_id.clone();
        let paginator = Arc::new(Mutex::new(paginator));

        let previous = {
            let mut tables = lock(&self.inner.tables);
            let previous = tables
                .session_slots
                .insert(slot.clone(), id.clone())
                .and_then(|old| tables.sessions.remove(&old).map(|e| (old, e.paginator)));
            if let Some(stale) = tables.selection_slots.remove(&slot) {
                tables.selections.remove(&stale);
                debug!("Selection {stale} retired by session {id}");
            }
            tables.sessions.insert(id.clone(), SessionEntry { slot, paginator });
            previous
        };

        let superseded = previous.map(|(old_id, old)| {
            lock(&old).end();
            debug!("Session {old_id} superseded by {id}");
            old_id
        });

        info!("Opened session {id} with {} chunks", view.count);
        Ok(Opened { view, superseded })
    }

    /// Park a selection in `slot`, replacing any selection pending there.
    pub fn open_selection(&self, slot: SlotId, state: SelectionState) -> ChoiceList {
        let list = state.choice_list();
        let id = state.id().clone();

        let mut tables = lock(&self.inner.tables);
        if let Some(old) = tables.selection_slots.insert(slot.clone(), id.clone()) {
            tables.selections.remove(&old);
            debug!("Selection {old} replaced by {id}");
        }
        tables.selections.insert(id, SelectionEntry { slot, state });

        list
    }

    /// Turn the owner's pick into the match to render, consuming the selection.
    ///
    /// Rejected picks (wrong identity, unknown name) leave it pending.
    pub fn resolve_selection(
        &self,
        id: &SessionId,
        identity: &OwnerId,
        name: &str,
    ) -> Result<(SlotId, PdfMatch), SessionError> {
        let now = self.inner.clock.now();
        let mut tables = lock(&self.inner.tables);

        let Some(entry) = tables.selections.get(id) else {
            return Err(SessionError::SelectionExpired(id.clone()));
        };
        if entry.state.is_expired(now, self.inner.timeouts.selection) {
            tables.detach_selection(id);
            return Err(SessionError::SelectionExpired(id.clone()));
        }

        let picked = entry.state.select(identity, name)?;
        let slot = entry.slot.clone();
        tables.detach_selection(id);
        Ok((slot, picked))
    }

    pub fn navigate(
        &self,
        id: &SessionId,
        identity: &OwnerId,
        direction: Direction,
    ) -> Result<ChunkView, SessionError> {
        let shared = self.get(id)?;
        let mut paginator = lock(&shared);

        if !paginator.is_live() {
            return Err(SessionError::Ended(id.clone()));
        }
        if self.end_if_idle(&mut paginator) {
            drop(paginator);
            return Err(self.timed_out(id));
        }
        if !paginator.authorize(identity) {
            return Err(SessionError::Unauthorized {
                identity: identity.clone(),
            });
        }
        paginator.advance(direction)
    }

    pub fn current(&self, id: &SessionId) -> Result<ChunkView, SessionError> {
        let shared = self.get(id)?;
        let mut paginator = lock(&shared);

        if self.end_if_idle(&mut paginator) {
            drop(paginator);
            return Err(self.timed_out(id));
        }
        paginator.current()
    }

    /// Owner-requested dismissal.
    pub fn close(&self, id: &SessionId, identity: &OwnerId) -> Result<CleanupReport, SessionError> {
        let paginator = self.get(id)?;
        {
            let paginator = lock(&paginator);
            if !paginator.authorize(identity) {
                return Err(SessionError::Unauthorized {
                    identity: identity.clone(),
                });
            }
        }

        lock(&self.inner.tables).detach_session(id);
        let report = lock(&paginator).end();
        Ok(report)
    }

    /// End idle sessions and drop expired selections.
    pub fn sweep(&self) -> SweepReport {
        let now = self.inner.clock.now();
        let timeouts = self.inner.timeouts;
        let mut report = SweepReport::default();

        let candidates: Vec<(SessionId, SharedPaginator)> = {
            let mut tables = lock(&self.inner.tables);

            let expired: Vec<SessionId> = tables
                .selections
                .iter()
                .filter(|(_, entry)| entry.state.is_expired(now, timeouts.selection))
                .map(|(id, _)| id.clone())
                .collect();
            for id in expired {
                tables.detach_selection(&id);
                report.expired_selections.push(id);
            }

            tables
                .sessions
                .iter()
                .map(|(id, entry)| (id.clone(), Arc::clone(&entry.paginator)))
                .collect()
        };

        for (id, paginator) in candidates {
            let mut paginator = lock(&paginator);
            if !paginator.is_idle(now, timeouts.session) {
                continue;
            }
            paginator.end();
            drop(paginator);

            lock(&self.inner.tables).detach_session(&id);
            info!("Session {id} timed out");
            report.ended_sessions.push(id);
        }

        report
    }

    #[must_use]
    pub fn session_in_slot(&self, slot: &SlotId) -> Option<SessionId> {
        lock(&self.inner.tables).session_slots.get(slot).cloned()
    }

    #[must_use]
    pub fn live_sessions(&self) -> usize {
        lock(&self.inner.tables).sessions.len()
    }

    #[must_use]
    pub fn pending_selections(&self) -> usize {
        lock(&self.inner.tables).selections.len()
    }

    /// End every session and drop every selection. Returns how many sessions ended.
    pub fn shutdown(&self) -> usize {
        let sessions: Vec<SharedPaginator> = {
            let mut tables = lock(&self.inner.tables);
            tables.selections.clear();
            tables.selection_slots.clear();
            tables.session_slots.clear();
            tables.sessions.drain().map(|(_, e)| e.paginator).collect()
        };

        let count = sessions.len();
        for paginator in sessions {
            lock(&paginator).end();
        }
        count
    }

    /// End `paginator` if it has been idle past the session timeout.
    ///
    /// The caller holds the session lock and must release it before
    /// [`SessionRegistry::timed_out`] touches the tables.
    fn end_if_idle(&self, paginator: &mut SessionPaginator) -> bool {
        if !paginator.is_idle(self.inner.clock.now(), self.inner.timeouts.session) {
            return false;
        }
        paginator.end();
        true
    }

    fn timed_out(&self, id: &SessionId) -> SessionError {
        lock(&self.inner.tables).detach_session(id);
        info!("Session {id} timed out");
        SessionError::Ended(id.clone())
    }

    fn get(&self, id: &SessionId) -> Result<SharedPaginator, SessionError> {
        lock(&self.inner.tables)
            .sessions
            .get(id)
            .map(|entry| Arc::clone(&entry.paginator))
            .ok_or_else(|| SessionError::Ended(id.clone()))
    }
}
