//! # jack-scheduler Prelude
//!
//! The types a compiler driver and pass authors need most: contracts, the registry,
//! requests and plans, sessions, and transformation requests.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all operations
pub use crate::Error;

/// Failure of one schedulable invocation
pub use crate::ProcessError;

/// The result type used throughout the crate
pub use crate::Result;

// ================================================================================================
// Contracts
// ================================================================================================

/// Labels, features and productions
pub use crate::contract::{Feature, LabelSet, Marker, Production, Tag, TagOrMarker};

/// Granularities and the adapters between them
pub use crate::contract::{Adapter, Granularity};

/// Schedulable contracts
pub use crate::contract::{ContractViolation, SchedulableDescriptor};

// ================================================================================================
// Schedulables and Plans
// ================================================================================================

/// Pass bodies and their registry
pub use crate::schedulable::{Schedulable, SchedulableId, SchedulableRegistry};

/// Requests, plans and builders
pub use crate::plan::{Plan, PlanBuilder, PlanStep, Request, SubPlanBuilder};

/// Plugin insertion
pub use crate::plan::{Amendment, PlanAmender, PluginOutcome};

/// Plan renderings
pub use crate::plan::{CompactPlanPrinter, DetailedPlanPrinter, PlanPrinter};

// ================================================================================================
// Execution
// ================================================================================================

/// Per-invocation context handed to schedulables
pub use crate::schedule::{RunContext, ScheduleInstance};

/// Sessions, configuration and diagnostics
pub use crate::session::{
    CompilationContext, EventKind, EventLog, FrontEnd, RunnerPolicy, SchedulerConfig, Session,
};

// ================================================================================================
// Program Tree and Transformations
// ================================================================================================

/// The program tree
pub use crate::tree::{EntityClass, NodeId, NodeKind, NodeTemplate, ProgramTree, Visitor};

/// Deferred edits
pub use crate::transform::{TransformationRequest, TransformationStep};
