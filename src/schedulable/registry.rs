//! Catalog of the schedulables available to a compilation.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use crate::{
    contract::SchedulableDescriptor,
    schedulable::{Schedulable, SchedulableEntry, SchedulableId},
    schedule::RunContext,
    Error, Result,
};

/// Registry of schedulables, keyed by name and ordered by registration.
///
/// The registration order is the tie-break order of the planner, so registering the same
/// schedulables in the same order always yields the same plans.
///
/// # Example
///
/// ```rust
/// use jack_scheduler::{
///     contract::{Granularity, SchedulableDescriptor, Tag},
///     schedulable::SchedulableRegistry,
/// };
///
/// const PARSED: Tag = Tag::new("Parsed");
/// const MARKED: Tag = Tag::new("Marked");
///
/// let mut registry = SchedulableRegistry::new();
/// let mark = registry.register_fn(
///     SchedulableDescriptor::new("Mark", Granularity::Session).needs(PARSED).adds(MARKED),
///     |_cx| Ok(()),
/// )?;
/// assert_eq!(registry.lookup(mark)?.name(), "Mark");
/// assert_eq!(registry.find("Mark"), Some(mark));
/// # Ok::<(), jack_scheduler::Error>(())
/// ```
#[derive(Debug)]
pub struct SchedulableRegistry {
    identity: u32,
    entries: Vec<Arc<SchedulableEntry>>,
    by_name: HashMap<String, SchedulableId>,
}

static NEXT_REGISTRY: AtomicU32 = AtomicU32::new(0);

impl Default for SchedulableRegistry {
    fn default() -> Self {
        SchedulableRegistry {
            identity: NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed),
            entries: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl SchedulableRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schedulable and returns its id.
    ///
    /// Registering the same name with the same body and contract again returns the
    /// existing id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContract`] if the descriptor is inconsistent and
    /// [`Error::DuplicateSchedulable`] if the name is taken by a different body or a
    /// different contract.
    pub fn register(
        &mut self,
        descriptor: SchedulableDescriptor,
        body: Arc<dyn Schedulable>,
    ) -> Result<SchedulableId> {
        descriptor.validate()?;

        if let Some(&id) = self.by_name.get(descriptor.name()) {
            let existing = &self.entries[id.index];
            if same_body(&existing.body, &body) && existing.descriptor.same_contract(&descriptor) {
                log::debug!("'{}' already registered as {id}", descriptor.name());
                return Ok(id);
            }
            return Err(Error::DuplicateSchedulable(descriptor.name().to_string()));
        }

        let id = SchedulableId {
            registry: self.identity,
            index: self.entries.len(),
        };
        log::debug!("registered {descriptor} as {id}");
        self.by_name.insert(descriptor.name().to_string(), id);
        self.entries.push(Arc::new(SchedulableEntry {
            id,
            descriptor,
            body,
        }));
        Ok(id)
    }

    /// Registers a closure as schedulable body.
    ///
    /// # Errors
    ///
    /// Same as [`SchedulableRegistry::register`].
    pub fn register_fn<F>(&mut self, descriptor: SchedulableDescriptor, body: F) -> Result<SchedulableId>
    where
        F: Fn(&mut RunContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register(descriptor, Arc::new(body))
    }

    /// Returns the contract of a registered schedulable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSchedulable`] for ids of another registry.
    pub fn lookup(&self, id: SchedulableId) -> Result<&SchedulableDescriptor> {
        self.entry(id).map(|entry| entry.descriptor())
    }

    /// Returns the registered entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSchedulable`] for ids of another registry.
    pub fn entry(&self, id: SchedulableId) -> Result<&Arc<SchedulableEntry>> {
        self.entries
            .get(id.index)
            .filter(|_| id.registry == self.identity)
            .ok_or_else(|| Error::UnknownSchedulable(id.to_string()))
    }

    /// Finds a schedulable by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<SchedulableId> {
        self.by_name.get(name).copied()
    }

    /// All entries in registration order.
    pub fn list_all(&self) -> impl ExactSizeIterator<Item = &Arc<SchedulableEntry>> + '_ {
        self.entries.iter()
    }

    /// Ids of all entries in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<SchedulableId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    /// Number of registered schedulables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn same_body(a: &Arc<dyn Schedulable>, b: &Arc<dyn Schedulable>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
