//! Identifiers and value types shared by the session components

use std::fmt;
use std::io;
use std::path::PathBuf;

use uuid::Uuid;

/// Opaque unique token naming one render session (and its output directory)
/// or one pending document selection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identity allowed to drive a session
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display slot holding one "current view" at a time
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SlotId(String);

impl SlotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Files and provenance of one rendered page
#[derive(Clone, Debug)]
pub struct RenderSession {
    pub session_id: SessionId,
    /// Directory exclusive to this session
    pub output_dir: PathBuf,
    /// Chunk images, top to bottom
    pub chunk_paths: Vec<PathBuf>,
    pub source_document: PathBuf,
    pub display_name: String,
    /// Page number (0-indexed)
    pub page_index: usize,
}

impl RenderSession {
    /// Caption shown under chunk `index`
    #[must_use]
    pub fn caption(&self, index: usize) -> String {
        format!(
            "{} - Page {} (Part {})",
            self.display_name,
            self.page_index + 1,
            index + 1
        )
    }
}

/// What the host displays for the current chunk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkView {
    pub session_id: SessionId,
    pub index: usize,
    pub count: usize,
    pub path: PathBuf,
    pub caption: String,
}

/// Bounded list of document names offered when several documents match
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChoiceList {
    pub selection_id: SessionId,
    pub names: Vec<String>,
    /// Number of distinct matching documents before truncation
    pub total: usize,
}

impl ChoiceList {
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.total > self.names.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("You're not allowed to interact with this.")]
    Unauthorized { identity: OwnerId },

    #[error("session {0} has ended")]
    Ended(SessionId),

    #[error("selection {0} timed out")]
    SelectionExpired(SessionId),

    #[error("{name:?} is not one of the offered documents")]
    UnknownChoice { name: String },

    #[error("render for session {0} produced no chunks")]
    NoChunks(SessionId),
}

/// A file or directory that could not be removed while ending a session
#[derive(Debug, thiserror::Error)]
#[error("failed to remove {path:?}: {error}")]
pub struct CleanupWarning {
    pub path: PathBuf,
    #[source]
    pub error: io::Error,
}

/// Outcome of deleting a session's artifacts
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed_files: usize,
    pub removed_dir: bool,
    pub warnings: Vec<CleanupWarning>,
}

impl CleanupReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
