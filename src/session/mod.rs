//! The compilation session: exclusive owner of the program tree and its global state.
//!
//! A [`Session`] holds the [`ProgramTree`], the set of session-global tags, the
//! [`EventLog`] and the abort flag. Plans execute against a session; passes see it only
//! through a shared reference and therefore cannot hold on to tree nodes across steps.

mod context;
mod events;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    OnceLock,
};

use crate::{
    contract::{LabelSet, Tag},
    transform::TransformationRequest,
    tree::ProgramTree,
    Result,
};

pub use context::{CompilationContext, RunnerPolicy, SchedulerConfig};
pub use events::{DerivedStats, Event, EventBuilder, EventKind, EventLog};

/// Supplies the initial program tree and label set of a session.
///
/// The parser front end implements this; tests use in-memory fixtures.
pub trait FrontEnd {
    /// Builds the program tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the sources cannot be turned into a tree.
    fn program(&mut self) -> Result<ProgramTree>;

    /// Labels that hold for the freshly built tree, e.g. `Parsed`.
    ///
    /// Markers in this set are expected to be attached to the tree already.
    fn initial_labels(&self) -> LabelSet;
}

/// Root container of one compilation.
#[derive(Debug)]
pub struct Session {
    tree: ProgramTree,
    tags: LabelSet,
    events: EventLog,
    aborted: AtomicBool,
    abort_cause: OnceLock<String>,
}

impl Session {
    /// Creates a session over `tree` with the tags of `labels` holding.
    #[must_use]
    pub fn new(tree: ProgramTree, labels: &LabelSet) -> Self {
        Session {
            tree,
            tags: labels.tags().collect(),
            events: EventLog::new(),
            aborted: AtomicBool::new(false),
            abort_cause: OnceLock::new(),
        }
    }

    /// Creates a session from a front end.
    ///
    /// # Errors
    ///
    /// Propagates front end failures.
    pub fn from_front_end(front_end: &mut dyn FrontEnd) -> Result<Self> {
        let tree = front_end.program()?;
        let labels = front_end.initial_labels();
        log::debug!("session created with {} nodes, labels {labels}", tree.len());
        Ok(Self::new(tree, &labels))
    }

    /// The program tree
    #[must_use]
    pub fn tree(&self) -> &ProgramTree {
        &self.tree
    }

    /// Mutable access to the program tree, for drivers between plans.
    pub fn tree_mut(&mut self) -> &mut ProgramTree {
        &mut self.tree
    }

    /// Session-global tags currently holding
    #[must_use]
    pub fn tags(&self) -> &LabelSet {
        &self.tags
    }

    /// Returns `true` if `tag` holds.
    #[must_use]
    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(tag)
    }

    /// Establishes a tag.
    pub fn add_tag(&mut self, tag: Tag) {
        self.tags.insert(tag);
    }

    /// Invalidates a tag.
    pub fn remove_tag(&mut self, tag: Tag) {
        self.tags.remove(tag);
    }

    pub(crate) fn apply_tags(&mut self, removes: &LabelSet, adds: &LabelSet) {
        for tag in removes.tags() {
            self.tags.remove(tag);
        }
        for tag in adds.tags() {
            self.tags.insert(tag);
        }
    }

    /// The execution event log
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Applies a transformation request to the tree.
    ///
    /// # Errors
    ///
    /// Propagates step failures, see [`TransformationRequest::commit`].
    pub fn commit(&mut self, request: TransformationRequest) -> Result<usize> {
        if request.is_empty() {
            return Ok(0);
        }
        let applied = request.commit(&mut self.tree)?;
        self.events
            .record(EventKind::TransformationCommitted)
            .count(applied);
        Ok(applied)
    }

    /// Requests the plan to stop at the next step boundary.
    ///
    /// The first cause wins; later calls only keep the flag raised.
    pub fn abort_eventually(&self, cause: impl Into<String>) {
        let cause = cause.into();
        log::warn!("abort requested: {cause}");
        let _ = self.abort_cause.set(cause);
        self.aborted.store(true, Ordering::Release);
    }

    /// Returns `true` once [`Session::abort_eventually`] was called.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// The cause passed to the first [`Session::abort_eventually`] call
    #[must_use]
    pub fn abort_cause(&self) -> Option<&str> {
        self.abort_cause.get().map(String::as_str)
    }

    /// Clears the abort flag so another plan can run on this session.
    pub fn clear_abort(&mut self) {
        self.aborted.store(false, Ordering::Release);
        self.abort_cause.take();
    }
}
