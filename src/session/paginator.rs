//! Per-session navigation over an ordered chunk sequence

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::types::{
    ChunkView, CleanupReport, CleanupWarning, Direction, OwnerId, RenderSession, SessionError,
    SessionId,
};
use crate::clock::SharedClock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Live,
    Ended,
}

/// Wrap-around pager over one render session's chunks.
///
/// Owns the session's output directory: ending the paginator (explicitly or
/// by dropping it while live) deletes every file in it and the directory.
pub struct SessionPaginator {
    session: RenderSession,
    owner: OwnerId,
    current_index: usize,
    last_activity: Instant,
    phase: Phase,
    clock: SharedClock,
}

impl std::fmt::Debug for SessionPaginator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPaginator")
            .field("session_id", &self.session.session_id)
            .field("owner", &self.owner)
            .field("current_index", &self.current_index)
            .field("chunks", &self.session.chunk_paths.len())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl SessionPaginator {
    /// Start a live session at the first chunk.
    ///
    /// A session without chunks is refused and its directory removed.
    pub fn new(
        session: RenderSession,
        owner: OwnerId,
        clock: SharedClock,
    ) -> Result<Self, SessionError> {
        if session.chunk_paths.is_empty() {
            remove_session_dir(&session.output_dir);
            return Err(SessionError::NoChunks(session.session_id));
        }

        let last_activity = clock.now();
        Ok(Self {
            session,
            owner,
            current_index: 0,
            last_activity,
            phase: Phase::Live,
            clock,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session.session_id
    }

    #[must_use]
    pub fn session(&self) -> &RenderSession {
        &self.session
    }

    #[must_use]
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.session.chunk_paths.len()
    }

    #[must_use]
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.phase == Phase::Live
    }

    #[must_use]
    pub fn authorize(&self, identity: &OwnerId) -> bool {
        *identity == self.owner
    }

    pub fn current(&self) -> Result<ChunkView, SessionError> {
        self.ensure_live()?;
        Ok(self.view())
    }

    /// Step one chunk forward or backward, wrapping at either end.
    pub fn advance(&mut self, direction: Direction) -> Result<ChunkView, SessionError> {
        self.ensure_live()?;

        let count = self.chunk_count();
        self.current_index = match direction {
            Direction::Forward => (self.current_index + 1) % count,
            Direction::Backward => (self.current_index + count - 1) % count,
        };
        self.last_activity = self.clock.now();

        Ok(self.view())
    }

    /// Whether the session has seen no navigation for at least `timeout`.
    #[must_use]
    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        self.is_live() && now.saturating_duration_since(self.last_activity) >= timeout
    }

    /// End the session and delete its artifacts. Ending twice is a no-op.
    pub fn end(&mut self) -> CleanupReport {
        if self.phase == Phase::Ended {
            return CleanupReport::default();
        }
        self.phase = Phase::Ended;

        let report = remove_session_dir(&self.session.output_dir);
        info!(
            "Ended session {} ({} files removed, {} warnings)",
            self.session.session_id,
            report.removed_files,
            report.warnings.len()
        );
        report
    }

    fn ensure_live(&self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Live => Ok(()),
            Phase::Ended => Err(SessionError::Ended(self.session.session_id.clone())),
        }
    }

    fn view(&self) -> ChunkView {
        ChunkView {
            session_id: self.session.session_id.clone(),
            index: self.current_index,
            count: self.chunk_count(),
            path: self.session.chunk_paths[self.current_index].clone(),
            caption: self.session.caption(self.current_index),
        }
    }
}

impl Drop for SessionPaginator {
    fn drop(&mut self) {
        if self.is_live() {
            debug!("Dropping live session {}", self.session.session_id);
            self.end();
        }
    }
}

/// Remove every file in `dir`, then `dir` itself. Failures are logged and
/// collected; they never stop the remaining removals.
pub(crate) fn remove_session_dir(dir: &Path) -> CleanupReport {
    let mut report = CleanupReport::default();

    match fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries {
                let path = match entry {
                    Ok(entry) => entry.path(),
                    Err(error) => {
                        record(&mut report, dir, error);
                        continue;
                    }
                };
                match fs::remove_file(&path) {
                    Ok(()) => report.removed_files += 1,
                    Err(error) => record(&mut report, &path, error),
                }
            }
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => return report,
        Err(error) => record(&mut report, dir, error),
    }

    match fs::remove_dir(dir) {
        Ok(()) => report.removed_dir = true,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => record(&mut report, dir, error),
    }

    report
}

fn record(report: &mut CleanupReport, path: &Path, error: io::Error) {
    let warning = CleanupWarning {
        path: path.to_path_buf(),
        error,
    };
    warn!("{warning}");
    report.warnings.push(warning);
}
