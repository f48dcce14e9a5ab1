//! Search, disambiguate, render and paginate: the host-facing flow.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::activity::ActivityMonitor;
use crate::corpus::{self, CorpusError, PdfMatch};
use crate::pdf::{self, RenderFault};
use crate::session::{
    ChoiceList, ChunkView, CleanupReport, Direction, Opened, OwnerId, RenderSession,
    SelectionState, SessionError, SessionId, SessionRegistry, SlotId,
};

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("Error rendering {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: RenderFault,
    },

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Result of a lookup
#[derive(Debug)]
pub enum LookupOutcome {
    NoResults,
    /// Exactly one document matched; its page is on display
    View(Opened),
    /// Several documents matched; the owner has to pick one
    Choose(ChoiceList),
}

/// One match per distinct document name, in a stable order.
///
/// Matches are ordered by name, then path, then page, so each name keeps the
/// lowest matching page of its first path regardless of walk order.
#[must_use]
pub fn distinct_documents(mut matches: Vec<PdfMatch>) -> Vec<PdfMatch> {
    matches.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then_with(|| a.source_path.cmp(&b.source_path))
            .then_with(|| a.page_index.cmp(&b.page_index))
    });
    matches.dedup_by(|later, kept| later.display_name == kept.display_name);
    matches
}

pub struct Lookup {
    corpus_root: PathBuf,
    output_root: PathBuf,
    registry: SessionRegistry,
    activity: Option<ActivityMonitor>,
}

impl Lookup {
    #[must_use]
    pub fn new(corpus_root: PathBuf, output_root: PathBuf, registry: SessionRegistry) -> Self {
        Self {
            corpus_root,
            output_root,
            registry,
            activity: None,
        }
    }

    /// Report user activity to `monitor` on every request.
    #[must_use]
    pub fn with_activity(mut self, monitor: ActivityMonitor) -> Self {
        self.activity = Some(monitor);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    #[must_use]
    pub fn corpus_root(&self) -> &Path {
        &self.corpus_root
    }

    pub fn lookup(
        &self,
        query: &str,
        owner: &OwnerId,
        slot: &SlotId,
    ) -> Result<LookupOutcome, LookupError> {
        self.touch();
        let matches = corpus::search(&self.corpus_root, query)?;
        let mut documents = distinct_documents(matches);

        info!(
            "Lookup {query:?} for {owner}: {} matching documents",
            documents.len()
        );

        match documents.len() {
            0 => Ok(LookupOutcome::NoResults),
            1 => {
                let only = documents.remove(0);
                self.open_view(slot, &only, owner).map(LookupOutcome::View)
            }
            _ => {
                let now = self.registry.clock().now();
                let state = SelectionState::new(documents, owner.clone(), now);
                Ok(LookupOutcome::Choose(
                    self.registry.open_selection(slot.clone(), state),
                ))
            }
        }
    }

    /// Render the document the owner picked from a choice list.
    pub fn choose(
        &self,
        selection_id: &SessionId,
        owner: &OwnerId,
        name: &str,
    ) -> Result<Opened, LookupError> {
        self.touch();
        let (slot, picked) = self.registry.resolve_selection(selection_id, owner, name)?;
        self.open_view(&slot, &picked, owner)
    }

    pub fn navigate(
        &self,
        session_id: &SessionId,
        owner: &OwnerId,
        direction: Direction,
    ) -> Result<ChunkView, LookupError> {
        self.touch();
        Ok(self.registry.navigate(session_id, owner, direction)?)
    }

    pub fn close(
        &self,
        session_id: &SessionId,
        owner: &OwnerId,
    ) -> Result<CleanupReport, LookupError> {
        self.touch();
        Ok(self.registry.close(session_id, owner)?)
    }

    fn open_view(
        &self,
        slot: &SlotId,
        chosen: &PdfMatch,
        owner: &OwnerId,
    ) -> Result<Opened, LookupError> {
        let session_id = SessionId::generate();
        let output_dir = self.output_root.join(session_id.as_str());

        let chunk_paths = pdf::render(&chosen.source_path, chosen.page_index, &output_dir)
            .map_err(|source| {
                warn!(
                    "Render of {:?} page {} failed: {source}",
                    chosen.source_path,
                    chosen.page_index + 1
                );
                LookupError::Render {
                    name: chosen.display_name.clone(),
                    source,
                }
            })?;

        let session = RenderSession {
            session_id,
            output_dir,
            chunk_paths,
            source_document: chosen.source_path.clone(),
            display_name: chosen.display_name.clone(),
            page_index: chosen.page_index,
        };
        Ok(self.registry.open_session(slot.clone(), session, owner.clone())?)
    }

    fn touch(&self) {
        if let Some(activity) = &self.activity {
            activity.touch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::PresenceChange;
    use crate::clock::ManualClock;
    use crate::session::Timeouts;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn found(path: &str, page: usize) -> PdfMatch {
        let path = PathBuf::from(path);
        PdfMatch {
            display_name: corpus::display_name(&path),
            source_path: path,
            page_index: page,
            page_text: String::new(),
        }
    }

    #[test]
    fn distinct_keeps_lowest_page_per_name() {
        let docs = distinct_documents(vec![
            found("/c/b.pdf", 7),
            found("/c/a.pdf", 5),
            found("/c/b.pdf", 2),
            found("/c/a.pdf", 1),
        ]);

        let picked: Vec<(&str, usize)> = docs
            .iter()
            .map(|d| (d.display_name.as_str(), d.page_index))
            .collect();
        assert_eq!(picked, vec![("a.pdf", 1), ("b.pdf", 2)]);
    }

    #[test]
    fn same_name_in_two_folders_collapses_to_first_path() {
        let docs = distinct_documents(vec![found("/z/report.pdf", 0), found("/a/report.pdf", 3)]);

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source_path, PathBuf::from("/a/report.pdf"));
    }

    #[test]
    fn order_does_not_depend_on_input_order() {
        let forward = distinct_documents(vec![found("/x/1.pdf", 0), found("/x/2.pdf", 0)]);
        let backward = distinct_documents(vec![found("/x/2.pdf", 0), found("/x/1.pdf", 0)]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn requests_count_as_activity() {
        let tmp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new());
        let monitor = ActivityMonitor::new(clock.clone(), Duration::from_secs(600));
        let lookup = Lookup::new(
            tmp.path().to_path_buf(),
            tmp.path().join("out"),
            SessionRegistry::new(clock.clone(), Timeouts::default()),
        )
        .with_activity(monitor.clone());

        clock.advance(Duration::from_secs(700));
        assert_eq!(monitor.check(), Some(PresenceChange::BecameIdle));

        let outcome = lookup
            .lookup("anything", &OwnerId::new("alice"), &SlotId::new("chan"))
            .unwrap();

        assert!(matches!(outcome, LookupOutcome::NoResults));
        assert_eq!(monitor.check(), Some(PresenceChange::BecameActive));
    }
}
