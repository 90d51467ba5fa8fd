use crate::{
    contract::Tag,
    schedulable::SchedulableEntry,
    session::{CompilationContext, EventLog, Session},
    transform::TransformationRequest,
    tree::{Node, NodeId, ProgramTree},
    Result,
};

/// What a schedulable sees while it runs on one entity.
///
/// Gives read access to the session and the compilation context and collects the
/// transformation requests the invocation commits. Requests are applied by the
/// scheduler once the invocation returned successfully.
pub struct RunContext<'a> {
    session: &'a Session,
    context: &'a CompilationContext,
    entry: &'a SchedulableEntry,
    entity: NodeId,
    requests: Vec<TransformationRequest>,
}

impl<'a> RunContext<'a> {
    pub(crate) fn new(
        session: &'a Session,
        context: &'a CompilationContext,
        entry: &'a SchedulableEntry,
        entity: NodeId,
    ) -> Self {
        RunContext {
            session,
            context,
            entry,
            entity,
            requests: Vec::new(),
        }
    }

    /// The session the plan runs against
    #[must_use]
    pub fn session(&self) -> &'a Session {
        self.session
    }

    /// The program tree
    #[must_use]
    pub fn tree(&self) -> &'a ProgramTree {
        self.session.tree()
    }

    /// The entity this invocation runs on, the program root for session steps
    #[must_use]
    pub fn entity(&self) -> NodeId {
        self.entity
    }

    /// The entity node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleNode`](crate::Error::StaleNode) if the entity disappeared.
    pub fn entity_node(&self) -> Result<&'a Node> {
        self.session.tree().get(self.entity)
    }

    /// The compilation context
    #[must_use]
    pub fn config(&self) -> &'a CompilationContext {
        self.context
    }

    /// The session event log
    #[must_use]
    pub fn events(&self) -> &'a EventLog {
        self.session.events()
    }

    /// Name of the running schedulable
    #[must_use]
    pub fn schedulable(&self) -> &'a str {
        self.entry.name()
    }

    /// Returns `true` if the session-global tag holds.
    #[must_use]
    pub fn has_tag(&self, tag: Tag) -> bool {
        self.session.has_tag(tag)
    }

    /// Starts a new, empty transformation request.
    pub fn transform(&self) -> TransformationRequest {
        TransformationRequest::new()
    }

    /// Hands a request over for commit once this invocation returns.
    ///
    /// Requests are committed in the order they were handed over.
    pub fn commit(&mut self, request: TransformationRequest) {
        if !request.is_empty() {
            self.requests.push(request);
        }
    }

    /// Requests the plan to halt at the next step boundary.
    pub fn abort_eventually(&self, cause: impl Into<String>) {
        self.session.abort_eventually(cause);
    }

    pub(crate) fn into_requests(self) -> Vec<TransformationRequest> {
        self.requests
    }
}
