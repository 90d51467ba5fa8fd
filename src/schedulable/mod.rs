//! Schedulables: contract-described passes and the registry that catalogs them.

mod registry;

use std::{fmt, sync::Arc};

use crate::{contract::SchedulableDescriptor, schedule::RunContext, Result};

pub use registry::SchedulableRegistry;

/// The body of a pass.
///
/// `run` is invoked once per entity the plan iterates. It reads the tree through the
/// [`RunContext`] and queues its edits there; the scheduler commits them after the
/// invocation returns.
///
/// Closures with the matching signature implement this trait.
pub trait Schedulable: Send + Sync {
    /// Runs the pass on `cx.entity()`.
    ///
    /// # Errors
    ///
    /// Any error is reported as an [`Error::Process`](crate::Error::Process) naming the
    /// schedulable and the entity.
    fn run(&self, cx: &mut RunContext<'_>) -> Result<()>;
}

impl<F> Schedulable for F
where
    F: Fn(&mut RunContext<'_>) -> Result<()> + Send + Sync,
{
    fn run(&self, cx: &mut RunContext<'_>) -> Result<()> {
        self(cx)
    }
}

/// Identifier handed out by the registry, ordered by registration.
///
/// Ids remember the registry that issued them, so an id of one registry is never
/// resolved against another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchedulableId {
    pub(crate) registry: u32,
    pub(crate) index: usize,
}

impl SchedulableId {
    /// Registration index of the schedulable
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for SchedulableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schedulable#{}.{}", self.registry, self.index)
    }
}

/// A registered schedulable: its id, contract and body.
pub struct SchedulableEntry {
    id: SchedulableId,
    descriptor: SchedulableDescriptor,
    body: Arc<dyn Schedulable>,
}

impl SchedulableEntry {
    /// Registry id
    #[must_use]
    pub fn id(&self) -> SchedulableId {
        self.id
    }

    /// Declared contract
    #[must_use]
    pub fn descriptor(&self) -> &SchedulableDescriptor {
        &self.descriptor
    }

    /// Shorthand for `descriptor().name()`
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// The pass body
    #[must_use]
    pub fn body(&self) -> &dyn Schedulable {
        self.body.as_ref()
    }
}

impl fmt::Debug for SchedulableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulableEntry")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
