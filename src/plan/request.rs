//! The driver's entry point for obtaining plans.

use std::collections::BTreeSet;

use crate::{
    contract::{find_conflict, Feature, Granularity, LabelSet, Production, TagOrMarker},
    plan::{planner::Planner, FlatStep, Plan, PlanBuilder},
    schedulable::{SchedulableEntry, SchedulableId, SchedulableRegistry},
    Result,
};

/// Accumulates features, productions, initial labels and the candidate pool.
///
/// # Example
///
/// ```rust
/// use jack_scheduler::{
///     contract::{Feature, Granularity, Production, SchedulableDescriptor, Tag},
///     plan::Request,
///     schedulable::SchedulableRegistry,
/// };
///
/// const PARSED: Tag = Tag::new("Parsed");
/// const MARKED: Tag = Tag::new("Marked");
/// const SHRUNK: Tag = Tag::new("Shrunk");
/// const EMITTED: Tag = Tag::new("Emitted");
/// const SHRINK: Feature = Feature::new("Shrink");
/// const DEX: Production = Production::new("Dex", &[EMITTED]);
///
/// let mut registry = SchedulableRegistry::new();
/// let mark = registry.register_fn(
///     SchedulableDescriptor::new("Mark", Granularity::Session).needs(PARSED).adds(MARKED),
///     |_cx| Ok(()),
/// )?;
/// let shrink = registry.register_fn(
///     SchedulableDescriptor::new("Shrink", Granularity::Session)
///         .needs(MARKED)
///         .adds(SHRUNK)
///         .requires_feature(SHRINK),
///     |_cx| Ok(()),
/// )?;
/// let emit = registry.register_fn(
///     SchedulableDescriptor::new("Emit", Granularity::Session).needs(SHRUNK).adds(EMITTED),
///     |_cx| Ok(()),
/// )?;
///
/// let mut request = Request::new(&registry);
/// request
///     .add_feature(SHRINK)
///     .add_production(DEX)
///     .add_initial_tags_or_markers([PARSED])
///     .add_schedulables([mark, shrink, emit]);
///
/// let plan = request.build_plan(Granularity::Session)?;
/// assert_eq!(plan.names(), vec!["Mark", "Shrink", "Emit"]);
/// # Ok::<(), jack_scheduler::Error>(())
/// ```
#[derive(Clone)]
pub struct Request<'r> {
    registry: &'r SchedulableRegistry,
    features: BTreeSet<Feature>,
    productions: Vec<Production>,
    initial: LabelSet,
    candidates: BTreeSet<SchedulableId>,
}

impl<'r> Request<'r> {
    /// Creates an empty request against `registry`.
    #[must_use]
    pub fn new(registry: &'r SchedulableRegistry) -> Self {
        Request {
            registry,
            features: BTreeSet::new(),
            productions: Vec::new(),
            initial: LabelSet::new(),
            candidates: BTreeSet::new(),
        }
    }

    /// Activates a feature.
    pub fn add_feature(&mut self, feature: Feature) -> &mut Self {
        self.features.insert(feature);
        self
    }

    /// Deactivates a feature.
    pub fn remove_feature(&mut self, feature: Feature) -> &mut Self {
        self.features.remove(&feature);
        self
    }

    /// Requests a production.
    pub fn add_production(&mut self, production: Production) -> &mut Self {
        if !self.productions.contains(&production) {
            self.productions.push(production);
        }
        self
    }

    /// Adds labels that hold before the plan starts.
    pub fn add_initial_tags_or_markers<L, I>(&mut self, labels: I) -> &mut Self
    where
        L: Into<TagOrMarker>,
        I: IntoIterator<Item = L>,
    {
        self.initial.extend(labels);
        self
    }

    /// Adds schedulables to the candidate pool.
    pub fn add_schedulables(&mut self, ids: impl IntoIterator<Item = SchedulableId>) -> &mut Self {
        self.candidates.extend(ids);
        self
    }

    /// Adds every registered schedulable to the candidate pool.
    pub fn add_all_schedulables(&mut self) -> &mut Self {
        self.candidates.extend(self.registry.ids());
        self
    }

    /// Active features
    #[must_use]
    pub fn features(&self) -> &BTreeSet<Feature> {
        &self.features
    }

    /// Requested productions
    #[must_use]
    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    /// Initial labels
    #[must_use]
    pub fn initial(&self) -> &LabelSet {
        &self.initial
    }

    fn check_features(&self) -> Result<()> {
        if let Some((a, b)) = find_conflict(&self.features) {
            return Err(illegal_request!(
                "features '{}' and '{}' are mutually exclusive",
                a,
                b
            ));
        }
        Ok(())
    }

    /// Candidate entries in registration order.
    fn pool(&self) -> Result<Vec<&'r std::sync::Arc<SchedulableEntry>>> {
        self.candidates
            .iter()
            .map(|id| self.registry.entry(*id))
            .collect()
    }

    /// Computes a plan reaching every requested production from the initial labels.
    ///
    /// # Errors
    ///
    /// - [`Error::IllegalRequest`](crate::Error::IllegalRequest) if two features exclude
    ///   each other, a candidate uses an unregistered helper, or a production tag is
    ///   neither initially present nor added by any candidate
    /// - [`Error::UnknownSchedulable`](crate::Error::UnknownSchedulable) for foreign ids
    /// - [`Error::PlanNotFound`](crate::Error::PlanNotFound) if no order of the candidates
    ///   reaches the productions
    pub fn build_plan(&self, root: Granularity) -> Result<Plan> {
        self.check_features()?;
        let pool = self.pool()?;

        for entry in &pool {
            for helper in entry.descriptor().helpers() {
                if self.registry.find(helper).is_none() {
                    return Err(illegal_request!(
                        "'{}' uses helper '{}' which is not registered",
                        entry.name(),
                        helper
                    ));
                }
            }
        }

        for production in &self.productions {
            for tag in production.requires() {
                let provided = self.initial.contains(*tag)
                    || pool.iter().any(|e| e.descriptor().added().contains(*tag));
                if !provided {
                    return Err(illegal_request!(
                        "production '{}' needs tag '{}' which no schedulable adds",
                        production,
                        tag
                    ));
                }
            }
        }

        for feature in &self.features {
            let used = pool.iter().any(|e| {
                let descriptor = e.descriptor();
                descriptor.required_features().contains(feature)
                    || descriptor.supported_features().contains(feature)
            });
            if !used {
                log::warn!("feature '{feature}' is not used by any candidate");
            }
        }

        let candidates: Vec<_> = pool
            .into_iter()
            .filter(|entry| {
                let granularity = entry.descriptor().granularity();
                let reachable = root.reaches(granularity);
                if !reachable {
                    log::debug!(
                        "'{}' runs on {granularity} entities, unreachable from {root}",
                        entry.name()
                    );
                }
                reachable
            })
            .collect();

        let order = Planner::new(candidates, &self.productions, &self.features)
            .solve(&self.initial)?;

        let flat: Vec<FlatStep> = order
            .into_iter()
            .map(|entry| FlatStep {
                path: root
                    .path_to(entry.descriptor().granularity())
                    .unwrap_or_default(),
                entry,
            })
            .collect();

        let plan = Plan::from_flat(root, &flat, self.features.clone(), self.initial.clone());
        log::info!("planned {} schedulables: [{}]", plan.len(), plan.names().join(", "));
        Ok(plan)
    }

    /// Returns a builder for assembling a plan by hand, seeded with the initial labels
    /// and features of this request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalRequest`](crate::Error::IllegalRequest) if two features
    /// exclude each other.
    pub fn get_plan_builder(&self, root: Granularity) -> Result<PlanBuilder<'r>> {
        self.check_features()?;
        Ok(PlanBuilder::new(
            self.registry,
            root,
            self.features.clone(),
            self.initial.clone(),
        ))
    }
}
