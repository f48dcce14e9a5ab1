//! Render sessions: pagination, pending selections, lifetime management

mod paginator;
mod reaper;
mod registry;
mod selection;
mod types;

pub use paginator::SessionPaginator;
pub use reaper::{DEFAULT_SWEEP_INTERVAL, Reaper};
pub use registry::{
    DEFAULT_SELECTION_TIMEOUT, DEFAULT_SESSION_TIMEOUT, Opened, SessionRegistry, SweepReport,
    Timeouts,
};
pub use selection::{MAX_CHOICES, SelectionState};
pub use types::{
    ChoiceList, ChunkView, CleanupReport, CleanupWarning, Direction, OwnerId, RenderSession,
    SessionError, SessionId, SlotId,
};
