use thiserror::Error;

use crate::tree::NodeId;

macro_rules! illegal_request {
    // Single string version
    ($msg:expr) => {
        crate::Error::IllegalRequest($msg.to_string())
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::IllegalRequest(format!($fmt, $($arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors are grouped by the phase in which they surface. Configuration and planning errors
/// are always reported before the program tree is touched, so a driver can fix its request
/// and retry. Execution and transformation errors halt the running plan.
///
/// # Error Categories
///
/// ## Configuration
/// - [`Error::DuplicateSchedulable`] - Two schedulables registered under one name
/// - [`Error::UnknownSchedulable`] - A schedulable id or name is not registered
/// - [`Error::InvalidContract`] - A descriptor contradicts itself
/// - [`Error::IllegalRequest`] - Conflicting features, unreachable productions, bad appends
/// - [`Error::BuilderFrozen`] - Append after the plan was finalized
///
/// ## Planning
/// - [`Error::PlanNotFound`] - No ordering of the candidates reaches the productions
/// - [`Error::InvalidPlan`] - Replaying a plan violates a contract
/// - [`Error::PluginRejected`] - A plugin schedulable cannot be placed in a plan
///
/// ## Execution
/// - [`Error::Process`] - A schedulable failed on an entity
/// - [`Error::Aborted`] - The session abort flag was raised
///
/// ## Transformation
/// - [`Error::StaleNode`] - A step references a detached or deleted node
/// - [`Error::InvalidEdit`] - A step would break the tree shape
///
/// # Examples
///
/// ```rust
/// use jack_scheduler::{Error, plan::Request, schedulable::SchedulableRegistry, contract::Granularity};
///
/// let registry = SchedulableRegistry::new();
/// let request = Request::new(&registry);
/// match request.build_plan(Granularity::Session) {
///     Ok(plan) => println!("{} schedulables", plan.len()),
///     Err(Error::PlanNotFound { missing, .. }) => eprintln!("missing: {missing:?}"),
///     Err(e) => eprintln!("{e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A schedulable with the same name but a different body is already registered.
    #[error("Schedulable '{0}' is already registered")]
    DuplicateSchedulable(String),

    /// The referenced schedulable is not part of the registry.
    #[error("Unknown schedulable - {0}")]
    UnknownSchedulable(String),

    /// A schedulable descriptor is internally inconsistent.
    ///
    /// Raised at registration, e.g. when a marker is not valid on the schedulable's
    /// granularity or a label is both needed and forbidden.
    #[error("Invalid contract for '{name}': {message}")]
    InvalidContract {
        /// Name of the offending schedulable
        name: String,
        /// What is wrong with the contract
        message: String,
    },

    /// The request or a manual plan construction step cannot be honoured.
    ///
    /// Always recoverable by the driver before any tree mutation occurs.
    #[error("Illegal request: {0}")]
    IllegalRequest(String),

    /// The plan builder was already finalized by `get_plan`.
    #[error("Plan builder is frozen, no further schedulables can be appended")]
    BuilderFrozen,

    /// No feasible ordering exists for the requested productions.
    ///
    /// Reports the productions that could not be reached and the tags that were still
    /// missing in the most advanced state the planner explored.
    #[error("No plan found for productions [{}], missing [{}]", .productions.join(", "), .missing.join(", "))]
    PlanNotFound {
        /// Productions that remained unsatisfied
        productions: Vec<String>,
        /// Tags of those productions that were never established
        missing: Vec<String>,
    },

    /// Replaying the plan violates the contract of one of its schedulables.
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// A plugin schedulable could not be spliced into a plan.
    #[error("Plugin '{plugin}' rejected: {reason} (contract: {contract})")]
    PluginRejected {
        /// Name of the rejected plugin
        plugin: String,
        /// Why no legal position exists
        reason: String,
        /// The plugin's declared contract
        contract: String,
    },

    /// A schedulable failed while the plan was executing.
    #[error(transparent)]
    Process(Box<ProcessError>),

    /// Execution halted because a schedulable raised the session abort flag.
    #[error("Compilation aborted after '{schedulable}': {cause}")]
    Aborted {
        /// Schedulable after which the flag was observed
        schedulable: String,
        /// Cause given to `abort_eventually`
        cause: String,
    },

    /// A node id refers to a node that was detached or deleted.
    ///
    /// In a transformation request this means an earlier step of the same request already
    /// removed the target, which indicates a miscomputed edit sequence.
    #[error("Stale node reference {0}")]
    StaleNode(NodeId),

    /// A tree edit would create a cycle or otherwise break the tree shape.
    #[error("Invalid tree edit: {0}")]
    InvalidEdit(String),

    /// Failed to set up the worker pool for parallel execution.
    #[error("{0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Generic error for pass-local failures.
    ///
    /// Used by schedulable bodies for errors that don't fit into other categories.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Returns `true` if this error was raised before any tree mutation took place.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateSchedulable(_)
                | Self::UnknownSchedulable(_)
                | Self::InvalidContract { .. }
                | Self::IllegalRequest(_)
                | Self::BuilderFrozen
                | Self::PlanNotFound { .. }
                | Self::InvalidPlan(_)
                | Self::PluginRejected { .. }
        )
    }
}

/// Failure of one schedulable invocation during plan execution.
///
/// Carries which schedulable failed and on which program entity, so the failure can be
/// located without access to the pass implementation.
#[derive(Error, Debug)]
#[error("Schedulable '{schedulable}' failed on {}: {cause}", .entity.as_deref().unwrap_or("session"))]
pub struct ProcessError {
    /// Name of the failing schedulable
    pub schedulable: String,
    /// Node the schedulable was running on, if any
    pub node: Option<NodeId>,
    /// Human-readable description of the entity (e.g. `method com.example.Foo.bar`)
    pub entity: Option<String>,
    /// The underlying error
    #[source]
    pub cause: Error,
}

impl ProcessError {
    /// Wraps `cause` into an [`Error::Process`].
    pub(crate) fn wrap(
        schedulable: &str,
        node: Option<NodeId>,
        entity: Option<String>,
        cause: Error,
    ) -> Error {
        Error::Process(Box::new(ProcessError {
            schedulable: schedulable.to_string(),
            node,
            entity,
            cause,
        }))
    }
}
