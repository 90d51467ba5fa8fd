//! Manual plan assembly.
//!
//! Every append is checked against the label state the builder tracks, so a contract
//! violation is reported at the call that introduces it rather than at execution.

use std::collections::BTreeSet;

use crate::{
    contract::{Adapter, ContractViolation, Feature, Granularity, LabelSet},
    plan::{Plan, PlanStep},
    schedulable::{SchedulableId, SchedulableRegistry},
    Error, Result,
};

#[derive(Debug)]
struct Scope {
    granularity: Granularity,
    steps: Vec<PlanStep>,
    state: LabelSet,
}

impl Scope {
    fn append(
        &mut self,
        registry: &SchedulableRegistry,
        features: &BTreeSet<Feature>,
        id: SchedulableId,
    ) -> Result<()> {
        let entry = registry.entry(id)?;
        let descriptor = entry.descriptor();

        if descriptor.granularity() != self.granularity {
            return Err(illegal_request!(
                "cannot append '{}': {}",
                entry.name(),
                ContractViolation::GranularityMismatch {
                    scope: self.granularity,
                    declared: descriptor.granularity(),
                }
            ));
        }

        if let Some(helper) = descriptor
            .helpers()
            .iter()
            .find(|helper| registry.find(helper).is_none())
        {
            return Err(illegal_request!(
                "cannot append '{}': helper '{}' is not registered",
                entry.name(),
                helper
            ));
        }

        descriptor
            .check(&self.state, features)
            .map_err(|violation| illegal_request!("cannot append '{}': {}", entry.name(), violation))?;

        descriptor.apply(&mut self.state);
        self.steps.push(PlanStep::Run(entry.clone()));
        Ok(())
    }

    fn open(&self, adapter: Adapter) -> Result<Scope> {
        if adapter.source() != self.granularity {
            return Err(illegal_request!(
                "adapter {} cannot narrow the {} scope",
                adapter,
                self.granularity
            ));
        }
        Ok(Scope {
            granularity: adapter.target(),
            steps: Vec::new(),
            state: self.state.clone(),
        })
    }

    fn close(&mut self, adapter: Adapter, child: &mut Scope) {
        if child.steps.is_empty() {
            return;
        }
        self.steps.push(PlanStep::Adapt {
            adapter,
            steps: std::mem::take(&mut child.steps),
        });
        self.state = child.state.clone();
    }
}

/// Explicit, append-only plan assembly.
///
/// Obtained from [`Request::get_plan_builder`](crate::plan::Request::get_plan_builder).
///
/// # Example
///
/// ```rust
/// use jack_scheduler::{
///     contract::{Adapter, Granularity, SchedulableDescriptor, Tag},
///     plan::Request,
///     schedulable::SchedulableRegistry,
/// };
///
/// const PARSED: Tag = Tag::new("Parsed");
/// const FOLDED: Tag = Tag::new("Folded");
///
/// let mut registry = SchedulableRegistry::new();
/// let fold = registry.register_fn(
///     SchedulableDescriptor::new("Fold", Granularity::Method).needs(PARSED).adds(FOLDED),
///     |_cx| Ok(()),
/// )?;
///
/// let mut request = Request::new(&registry);
/// request.add_initial_tags_or_markers([PARSED]);
/// let mut builder = request.get_plan_builder(Granularity::Type)?;
/// {
///     let mut methods = builder.append_sub_plan(Adapter::TypeToMethod)?;
///     methods.append(fold)?;
/// }
/// let plan = builder.get_plan()?;
/// assert_eq!(plan.names(), vec!["Fold"]);
/// # Ok::<(), jack_scheduler::Error>(())
/// ```
#[derive(Debug)]
pub struct PlanBuilder<'r> {
    registry: &'r SchedulableRegistry,
    root: Granularity,
    features: BTreeSet<Feature>,
    initial: LabelSet,
    scope: Scope,
    frozen: bool,
}

impl<'r> PlanBuilder<'r> {
    pub(crate) fn new(
        registry: &'r SchedulableRegistry,
        root: Granularity,
        features: BTreeSet<Feature>,
        initial: LabelSet,
    ) -> Self {
        PlanBuilder {
            registry,
            root,
            features,
            scope: Scope {
                granularity: root,
                steps: Vec::new(),
                state: initial.clone(),
            },
            initial,
            frozen: false,
        }
    }

    /// Granularity of the top-level scope
    #[must_use]
    pub fn granularity(&self) -> Granularity {
        self.root
    }

    /// Labels holding after the steps appended so far
    #[must_use]
    pub fn state(&self) -> &LabelSet {
        &self.scope.state
    }

    /// Returns `true` once [`PlanBuilder::get_plan`] was called.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Appends a schedulable to the top-level scope.
    ///
    /// # Errors
    ///
    /// - [`Error::BuilderFrozen`] after [`PlanBuilder::get_plan`]
    /// - [`Error::IllegalRequest`] if the schedulable's granularity does not match the
    ///   scope, a helper is missing, a required feature is inactive, a needed label does
    ///   not hold or a forbidden one does
    /// - [`Error::UnknownSchedulable`] for foreign ids
    pub fn append(&mut self, id: SchedulableId) -> Result<&mut Self> {
        if self.frozen {
            return Err(Error::BuilderFrozen);
        }
        self.scope.append(self.registry, &self.features, id)?;
        Ok(self)
    }

    /// Opens a nested scope over the entities `adapter` derives.
    ///
    /// The nested builder starts from the current state. When it is dropped, its steps
    /// are recorded as one adapter step and its final state becomes the state of this
    /// builder. Dropping it without appending anything records nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BuilderFrozen`] after [`PlanBuilder::get_plan`] and
    /// [`Error::IllegalRequest`] if `adapter` does not start at this scope.
    pub fn append_sub_plan(&mut self, adapter: Adapter) -> Result<SubPlanBuilder<'_, 'r>> {
        if self.frozen {
            return Err(Error::BuilderFrozen);
        }
        let scope = self.scope.open(adapter)?;
        Ok(SubPlanBuilder {
            registry: self.registry,
            features: &self.features,
            parent: &mut self.scope,
            adapter,
            scope,
        })
    }

    /// Finalizes the builder and returns the plan.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BuilderFrozen`] if the plan was already taken.
    pub fn get_plan(&mut self) -> Result<Plan> {
        if self.frozen {
            return Err(Error::BuilderFrozen);
        }
        self.frozen = true;
        let plan = Plan::new(
            self.root,
            std::mem::take(&mut self.scope.steps),
            self.features.clone(),
            self.initial.clone(),
        );
        log::debug!("manual plan finalized: [{}]", plan.names().join(", "));
        Ok(plan)
    }
}

/// Builder for a nested scope, see [`PlanBuilder::append_sub_plan`].
#[derive(Debug)]
pub struct SubPlanBuilder<'p, 'r> {
    registry: &'r SchedulableRegistry,
    features: &'p BTreeSet<Feature>,
    parent: &'p mut Scope,
    adapter: Adapter,
    scope: Scope,
}

impl<'r> SubPlanBuilder<'_, 'r> {
    /// Granularity of this scope
    #[must_use]
    pub fn granularity(&self) -> Granularity {
        self.scope.granularity
    }

    /// Labels holding after the steps appended so far
    #[must_use]
    pub fn state(&self) -> &LabelSet {
        &self.scope.state
    }

    /// Appends a schedulable to this scope.
    ///
    /// # Errors
    ///
    /// Same as [`PlanBuilder::append`], except that a nested builder cannot be frozen.
    pub fn append(&mut self, id: SchedulableId) -> Result<&mut Self> {
        self.scope.append(self.registry, self.features, id)?;
        Ok(self)
    }

    /// Opens a scope nested in this one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalRequest`] if `adapter` does not start at this scope.
    pub fn append_sub_plan(&mut self, adapter: Adapter) -> Result<SubPlanBuilder<'_, 'r>> {
        let scope = self.scope.open(adapter)?;
        Ok(SubPlanBuilder {
            registry: self.registry,
            features: self.features,
            parent: &mut self.scope,
            adapter,
            scope,
        })
    }

    /// Closes the scope, same as dropping it.
    pub fn finish(self) {}
}

impl Drop for SubPlanBuilder<'_, '_> {
    fn drop(&mut self) {
        self.parent.close(self.adapter, &mut self.scope);
    }
}
