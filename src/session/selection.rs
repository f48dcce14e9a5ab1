//! Pending "which document?" choice when several documents match

use std::time::{Duration, Instant};

use super::types::{ChoiceList, OwnerId, SessionError, SessionId};
use crate::corpus::PdfMatch;

/// Most names a choice list offers at once
pub const MAX_CHOICES: usize = 25;

/// Short-lived selection over distinct matching documents.
///
/// Has no files of its own; it either resolves into a render or times out.
#[derive(Clone, Debug)]
pub struct SelectionState {
    id: SessionId,
    owner: OwnerId,
    choices: Vec<PdfMatch>,
    total: usize,
    created_at: Instant,
}

impl SelectionState {
    /// `candidates` holds one match per document, in presentation order.
    #[must_use]
    pub fn new(mut candidates: Vec<PdfMatch>, owner: OwnerId, now: Instant) -> Self {
        let total = candidates.len();
        candidates.truncate(MAX_CHOICES);
        Self {
            id: SessionId::generate(),
            owner,
            choices: candidates,
            total,
            created_at: now,
        }
    }

    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    #[must_use]
    pub fn authorize(&self, identity: &OwnerId) -> bool {
        *identity == self.owner
    }

    #[must_use]
    pub fn choice_list(&self) -> ChoiceList {
        ChoiceList {
            selection_id: self.id.clone(),
            names: self.choices.iter().map(|m| m.display_name.clone()).collect(),
            total: self.total,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.created_at) >= timeout
    }

    /// Resolve the owner's pick to the match that will be rendered.
    pub fn select(&self, identity: &OwnerId, name: &str) -> Result<PdfMatch, SessionError> {
        if !self.authorize(identity) {
            return Err(SessionError::Unauthorized {
                identity: identity.clone(),
            });
        }

        self.choices
            .iter()
            .find(|m| m.display_name == name)
            .cloned()
            .ok_or_else(|| SessionError::UnknownChoice {
                name: name.to_string(),
            })
    }
}
