//! Schedulable contracts.

use std::{collections::BTreeSet, fmt, sync::Arc};

use crate::{
    contract::{
        feature::display_features, Feature, Granularity, LabelSet, TagOrMarker,
    },
    tree::{NodeId, ProgramTree},
    Error, Result,
};

/// Predicate deciding whether a schedulable runs on a given entity.
pub type EntityFilter = Arc<dyn Fn(&ProgramTree, NodeId) -> bool + Send + Sync>;

/// The declared contract of a schedulable.
///
/// Descriptors are plain values built with chained setters and handed to
/// [`SchedulableRegistry::register`](crate::schedulable::SchedulableRegistry::register).
///
/// # Example
///
/// ```rust
/// use jack_scheduler::contract::{Feature, Granularity, SchedulableDescriptor, Tag};
///
/// const MARKED: Tag = Tag::new("Marked");
/// const SHRUNK: Tag = Tag::new("Shrunk");
/// const SHRINK: Feature = Feature::new("Shrink");
///
/// let shrink = SchedulableDescriptor::new("Shrink", Granularity::Session)
///     .description("removes unreachable declarations")
///     .needs(MARKED)
///     .adds(SHRUNK)
///     .requires_feature(SHRINK);
/// assert!(shrink.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct SchedulableDescriptor {
    name: String,
    description: String,
    granularity: Granularity,
    needs: LabelSet,
    forbids: LabelSet,
    adds: LabelSet,
    removes: LabelSet,
    required_features: BTreeSet<Feature>,
    supported_features: BTreeSet<Feature>,
    uses_helpers: BTreeSet<String>,
    filter: Option<EntityFilter>,
    fault_tolerant: bool,
}

impl SchedulableDescriptor {
    /// Starts a contract for a schedulable invoked at `granularity`.
    #[must_use]
    pub fn new(name: impl Into<String>, granularity: Granularity) -> Self {
        SchedulableDescriptor {
            name: name.into(),
            description: String::new(),
            granularity,
            needs: LabelSet::new(),
            forbids: LabelSet::new(),
            adds: LabelSet::new(),
            removes: LabelSet::new(),
            required_features: BTreeSet::new(),
            supported_features: BTreeSet::new(),
            uses_helpers: BTreeSet::new(),
            filter: None,
            fault_tolerant: false,
        }
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a label that must hold before the schedulable runs.
    #[must_use]
    pub fn needs(mut self, label: impl Into<TagOrMarker>) -> Self {
        self.needs.insert(label);
        self
    }

    /// Adds a label that must not hold when the schedulable runs.
    #[must_use]
    pub fn forbids(mut self, label: impl Into<TagOrMarker>) -> Self {
        self.forbids.insert(label);
        self
    }

    /// Adds a label the schedulable establishes.
    #[must_use]
    pub fn adds(mut self, label: impl Into<TagOrMarker>) -> Self {
        self.adds.insert(label);
        self
    }

    /// Adds a label the schedulable invalidates.
    #[must_use]
    pub fn removes(mut self, label: impl Into<TagOrMarker>) -> Self {
        self.removes.insert(label);
        self
    }

    /// Adds a feature that must be active for the schedulable to be eligible.
    #[must_use]
    pub fn requires_feature(mut self, feature: Feature) -> Self {
        self.required_features.insert(feature);
        self
    }

    /// Adds a feature the schedulable honours when active.
    #[must_use]
    pub fn supports_feature(mut self, feature: Feature) -> Self {
        self.supported_features.insert(feature);
        self
    }

    /// Declares that the schedulable calls the helper registered under `name`.
    #[must_use]
    pub fn uses_helper(mut self, name: impl Into<String>) -> Self {
        self.uses_helpers.insert(name.into());
        self
    }

    /// Restricts the entities the schedulable is invoked on.
    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&ProgramTree, NodeId) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Marks the schedulable as fault tolerant: its failures are recorded but do not
    /// halt the plan.
    #[must_use]
    pub fn fault_tolerant(mut self) -> Self {
        self.fault_tolerant = true;
        self
    }

    /// Returns the schedulable name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description
    #[must_use]
    pub fn get_description(&self) -> &str {
        &self.description
    }

    /// Returns the granularity
    #[must_use]
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Labels required before running
    #[must_use]
    pub fn needed(&self) -> &LabelSet {
        &self.needs
    }

    /// Labels that must be absent before running
    #[must_use]
    pub fn forbidden(&self) -> &LabelSet {
        &self.forbids
    }

    /// Labels established by running
    #[must_use]
    pub fn added(&self) -> &LabelSet {
        &self.adds
    }

    /// Labels invalidated by running
    #[must_use]
    pub fn removed(&self) -> &LabelSet {
        &self.removes
    }

    /// Features that must be active
    #[must_use]
    pub fn required_features(&self) -> &BTreeSet<Feature> {
        &self.required_features
    }

    /// Features the schedulable honours
    #[must_use]
    pub fn supported_features(&self) -> &BTreeSet<Feature> {
        &self.supported_features
    }

    /// Names of the helpers the schedulable calls
    #[must_use]
    pub fn helpers(&self) -> &BTreeSet<String> {
        &self.uses_helpers
    }

    /// Returns `true` if failures of this schedulable do not halt the plan
    #[must_use]
    pub fn is_fault_tolerant(&self) -> bool {
        self.fault_tolerant
    }

    /// Returns `true` if the schedulable should run on `entity`.
    ///
    /// Schedulables without a filter accept every entity.
    #[must_use]
    pub fn accepts(&self, tree: &ProgramTree, entity: NodeId) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(tree, entity))
    }

    /// Checks that the contract is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContract`] if a marker is not valid on the entities of the
    /// schedulable's granularity, or if a label is both needed and forbidden or both added
    /// and removed.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(self.invalid("schedulable name must not be empty"));
        }

        let class = self.granularity.entity_class();
        for clause in [&self.needs, &self.forbids, &self.adds, &self.removes] {
            if let Some(marker) = clause.markers().find(|m| !m.is_valid_on(class)) {
                return Err(self.invalid(format!(
                    "marker {marker} is not valid on {} entities",
                    self.granularity
                )));
            }
        }

        let contradictory = self.needs.intersection(&self.forbids);
        if !contradictory.is_empty() {
            return Err(self.invalid(format!("labels {contradictory} are both needed and forbidden")));
        }

        let contradictory = self.adds.intersection(&self.removes);
        if !contradictory.is_empty() {
            return Err(self.invalid(format!("labels {contradictory} are both added and removed")));
        }

        Ok(())
    }

    fn invalid(&self, message: impl Into<String>) -> Error {
        Error::InvalidContract {
            name: self.name.clone(),
            message: message.into(),
        }
    }

    /// Checks whether the schedulable may run in `state` with `features` active.
    ///
    /// # Errors
    ///
    /// Returns the first [`ContractViolation`] found.
    pub fn check(
        &self,
        state: &LabelSet,
        features: &BTreeSet<Feature>,
    ) -> std::result::Result<(), ContractViolation> {
        let missing: BTreeSet<Feature> = self
            .required_features
            .difference(features)
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(ContractViolation::MissingFeatures(missing));
        }

        let unmet = self.needs.difference(state);
        if !unmet.is_empty() {
            return Err(ContractViolation::UnmetNeeds(unmet));
        }

        let present = self.forbids.intersection(state);
        if !present.is_empty() {
            return Err(ContractViolation::ForbiddenPresent(present));
        }

        Ok(())
    }

    /// Applies the effect of running the schedulable: removals first, then additions.
    pub fn apply(&self, state: &mut LabelSet) {
        state.subtract(&self.removes);
        state.union_with(&self.adds);
    }

    /// Returns `true` if both descriptors declare the same contract.
    ///
    /// Entity filters are compared by identity.
    pub(crate) fn same_contract(&self, other: &SchedulableDescriptor) -> bool {
        let same_filter = match (&self.filter, &other.filter) {
            (None, None) => true,
            (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        };
        same_filter
            && self.name == other.name
            && self.description == other.description
            && self.granularity == other.granularity
            && self.needs == other.needs
            && self.forbids == other.forbids
            && self.adds == other.adds
            && self.removes == other.removes
            && self.required_features == other.required_features
            && self.supported_features == other.supported_features
            && self.uses_helpers == other.uses_helpers
            && self.fault_tolerant == other.fault_tolerant
    }

    /// Returns `true` if running the schedulable would leave `state` unchanged.
    #[must_use]
    pub fn is_noop_in(&self, state: &LabelSet) -> bool {
        self.adds.is_subset(state) && self.removes.is_disjoint(state)
    }
}

impl fmt::Debug for SchedulableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulableDescriptor")
            .field("name", &self.name)
            .field("granularity", &self.granularity)
            .field("needs", &self.needs)
            .field("forbids", &self.forbids)
            .field("adds", &self.adds)
            .field("removes", &self.removes)
            .field("required_features", &self.required_features)
            .field("supported_features", &self.supported_features)
            .field("uses_helpers", &self.uses_helpers)
            .field("filtered", &self.filter.is_some())
            .field("fault_tolerant", &self.fault_tolerant)
            .finish()
    }
}

impl fmt::Display for SchedulableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.granularity)?;
        if !self.needs.is_empty() {
            write!(f, " needs {}", self.needs)?;
        }
        if !self.forbids.is_empty() {
            write!(f, " forbids {}", self.forbids)?;
        }
        if !self.adds.is_empty() {
            write!(f, " adds {}", self.adds)?;
        }
        if !self.removes.is_empty() {
            write!(f, " removes {}", self.removes)?;
        }
        if !self.required_features.is_empty() {
            write!(f, " requires {}", display_features(&self.required_features))?;
        }
        Ok(())
    }
}

/// Why a schedulable cannot run at a given point of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    /// Required features are not active
    MissingFeatures(BTreeSet<Feature>),
    /// Needed labels do not hold
    UnmetNeeds(LabelSet),
    /// Forbidden labels hold
    ForbiddenPresent(LabelSet),
    /// The schedulable cannot be invoked in the current scope
    GranularityMismatch {
        /// Granularity of the scope being built
        scope: Granularity,
        /// Granularity declared by the schedulable
        declared: Granularity,
    },
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFeatures(features) => {
                write!(f, "required features {} are not active", display_features(features))
            }
            Self::UnmetNeeds(labels) => write!(f, "needed labels {labels} do not hold"),
            Self::ForbiddenPresent(labels) => write!(f, "forbidden labels {labels} hold"),
            Self::GranularityMismatch { scope, declared } => write!(
                f,
                "declared granularity {declared} does not match the {scope} scope"
            ),
        }
    }
}
