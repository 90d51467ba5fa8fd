//! Splicing plugin schedulables into existing plans.

use std::{collections::BTreeSet, fmt, sync::Arc};

use crate::{
    contract::{display_features, Feature, LabelSet},
    plan::{FlatStep, Plan},
    schedulable::{SchedulableEntry, SchedulableId, SchedulableRegistry},
    Error, Result,
};

/// Where a plugin ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOutcome {
    /// Spliced in before the step at `position` of the flattened plan
    Inserted {
        /// Index in execution order
        position: usize,
    },
    /// No legal position exists
    Rejected {
        /// Why every position was refused
        reason: String,
    },
}

/// Outcome of amending a plan with one plugin.
#[derive(Debug, Clone)]
pub struct PluginReport {
    /// Plugin name
    pub plugin: String,
    /// Plugin id
    pub id: SchedulableId,
    /// The plugin's declared contract
    pub contract: String,
    /// Where the plugin was placed, or why it was not
    pub outcome: PluginOutcome,
}

impl PluginReport {
    /// Returns `true` if the plugin was placed.
    #[must_use]
    pub fn is_inserted(&self) -> bool {
        matches!(self.outcome, PluginOutcome::Inserted { .. })
    }
}

impl fmt::Display for PluginReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            PluginOutcome::Inserted { position } => {
                write!(f, "{}: inserted at position {position}", self.plugin)
            }
            PluginOutcome::Rejected { reason } => write!(f, "{}: rejected, {reason}", self.plugin),
        }
    }
}

/// Result of [`PlanAmender::amend`]: the amended plan plus one report per plugin.
///
/// An amendment with a rejected plugin is invalid as a whole; [`Amendment::into_plan`]
/// refuses to hand out a plan missing one of the requested plugins.
#[derive(Debug)]
pub struct Amendment {
    plan: Plan,
    reports: Vec<PluginReport>,
}

impl Amendment {
    /// Returns `true` if every plugin was placed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.reports.iter().all(PluginReport::is_inserted)
    }

    /// Per-plugin outcomes, in the order the plugins were given.
    #[must_use]
    pub fn reports(&self) -> &[PluginReport] {
        &self.reports
    }

    /// Reports of the plugins that could not be placed.
    pub fn rejected(&self) -> impl Iterator<Item = &PluginReport> + '_ {
        self.reports.iter().filter(|r| !r.is_inserted())
    }

    /// Returns the amended plan.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PluginRejected`] for the first plugin that could not be placed.
    pub fn into_plan(self) -> Result<Plan> {
        if let Some(report) = self.reports.into_iter().find(|r| !r.is_inserted()) {
            let reason = match report.outcome {
                PluginOutcome::Rejected { reason } => reason,
                PluginOutcome::Inserted { .. } => String::new(),
            };
            return Err(Error::PluginRejected {
                plugin: report.plugin,
                reason,
                contract: report.contract,
            });
        }
        Ok(self.plan)
    }
}

/// Inserts externally supplied schedulables into a plan at legal positions.
///
/// Each plugin goes to the first position where its contract holds and every later
/// step of the plan still holds as well. Plugins are placed one after the other, so a
/// plugin may rely on the labels an earlier plugin adds.
pub struct PlanAmender<'r> {
    registry: &'r SchedulableRegistry,
}

impl<'r> PlanAmender<'r> {
    /// Creates an amender resolving plugin ids against `registry`.
    #[must_use]
    pub fn new(registry: &'r SchedulableRegistry) -> Self {
        PlanAmender { registry }
    }

    /// Places every plugin into a copy of `plan`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPlan`] if `plan` itself is invalid and
    /// [`Error::UnknownSchedulable`] for foreign ids. Plugins without a legal position
    /// are reported in the [`Amendment`], not as an error.
    pub fn amend(&self, plan: &Plan, plugins: &[SchedulableId]) -> Result<Amendment> {
        plan.validate()?;

        let mut flat = plan.flatten();
        let mut reports = Vec::with_capacity(plugins.len());

        for id in plugins {
            let entry = self.registry.entry(*id)?;
            let outcome = self.place(plan, &mut flat, entry);
            match &outcome {
                PluginOutcome::Inserted { position } => {
                    log::debug!("plugin '{}' inserted at {position}", entry.name());
                }
                PluginOutcome::Rejected { reason } => {
                    log::warn!("plugin '{}' rejected: {reason}", entry.name());
                }
            }
            reports.push(PluginReport {
                plugin: entry.name().to_string(),
                id: *id,
                contract: entry.descriptor().to_string(),
                outcome,
            });
        }

        Ok(Amendment {
            plan: Plan::from_flat(
                plan.root(),
                &flat,
                plan.features().clone(),
                plan.initial().clone(),
            ),
            reports,
        })
    }

    fn place(&self, plan: &Plan, flat: &mut Vec<FlatStep>, entry: &Arc<SchedulableEntry>) -> PluginOutcome {
        let rejected = |reason: String| PluginOutcome::Rejected { reason };
        let descriptor = entry.descriptor();
        let features = plan.features();

        let Some(path) = plan.root().path_to(descriptor.granularity()) else {
            return rejected(format!(
                "{} entities are not reachable from a {} plan",
                descriptor.granularity(),
                plan.root()
            ));
        };

        if let Some(helper) = descriptor
            .helpers()
            .iter()
            .find(|helper| self.registry.find(helper).is_none())
        {
            return rejected(format!("helper '{helper}' is not registered"));
        }

        let missing: BTreeSet<Feature> = descriptor
            .required_features()
            .difference(features)
            .copied()
            .collect();
        if !missing.is_empty() {
            return rejected(format!(
                "required features {} are not active in the plan",
                display_features(&missing)
            ));
        }

        let mut state = plan.initial().clone();
        let mut own_violation = None;
        let mut breaks_later = None;

        for position in 0..=flat.len() {
            if position > 0 {
                flat[position - 1].entry.descriptor().apply(&mut state);
            }

            if let Err(violation) = descriptor.check(&state, features) {
                own_violation = Some(violation.to_string());
                continue;
            }

            let mut after = state.clone();
            descriptor.apply(&mut after);
            match replay(&flat[position..], after, features) {
                Ok(()) => {
                    flat.insert(
                        position,
                        FlatStep {
                            path,
                            entry: Arc::clone(entry),
                        },
                    );
                    return PluginOutcome::Inserted { position };
                }
                Err(blocked) => breaks_later = Some(blocked),
            }
        }

        let reason = match (breaks_later, own_violation) {
            (Some(blocked), _) => format!("every position where its contract holds breaks {blocked}"),
            (None, Some(violation)) => format!("no position satisfies its contract: {violation}"),
            (None, None) => "no position found".to_string(),
        };
        rejected(reason)
    }
}

/// Replays `steps` from `state`, returning a description of the first violation.
fn replay(
    steps: &[FlatStep],
    mut state: LabelSet,
    features: &BTreeSet<Feature>,
) -> std::result::Result<(), String> {
    for step in steps {
        let descriptor = step.entry.descriptor();
        descriptor
            .check(&state, features)
            .map_err(|violation| format!("'{}': {violation}", step.entry.name()))?;
        descriptor.apply(&mut state);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        contract::{Adapter, Granularity, SchedulableDescriptor, Tag},
        plan::Request,
        schedule::RunContext,
        test::{labels::*, registry::Fixture},
    };

    fn noop(_cx: &mut RunContext<'_>) -> Result<()> {
        Ok(())
    }

    fn base_plan(fixture: &Fixture) -> Plan {
        let mut request = Request::new(&fixture.registry);
        request.add_initial_tags_or_markers([PARSED]);
        let mut builder = request.get_plan_builder(Granularity::Session).unwrap();
        builder.append(fixture.id("Mark")).unwrap();
        builder.append(fixture.id("Emit")).unwrap();
        builder.get_plan().unwrap()
    }

    #[test]
    fn test_inserts_at_first_legal_position() {
        let mut fixture = Fixture::scoped();
        let audit = fixture
            .registry
            .register_fn(
                SchedulableDescriptor::new("Audit", Granularity::Session).needs(MARKED),
                noop,
            )
            .unwrap();
        let plan = base_plan(&fixture);

        let amendment = PlanAmender::new(&fixture.registry)
            .amend(&plan, &[audit])
            .unwrap();
        assert!(amendment.is_valid());
        assert_eq!(
            amendment.reports()[0].outcome,
            PluginOutcome::Inserted { position: 1 }
        );

        let amended = amendment.into_plan().unwrap();
        assert_eq!(amended.names(), vec!["Mark", "Audit", "Emit"]);
        assert!(amended.validate().is_ok());
    }

    #[test]
    fn test_insertion_must_keep_remainder_valid() {
        const SEALED: Tag = Tag::new("Sealed");
        let mut fixture = Fixture::scoped();
        let seal = fixture
            .registry
            .register_fn(
                SchedulableDescriptor::new("Seal", Granularity::Session)
                    .needs(MARKED)
                    .removes(MARKED)
                    .adds(SEALED),
                noop,
            )
            .unwrap();
        let plan = base_plan(&fixture);

        let amendment = PlanAmender::new(&fixture.registry)
            .amend(&plan, &[seal])
            .unwrap();
        // right after Mark its needs hold, but Emit would lose Marked
        assert_eq!(
            amendment.reports()[0].outcome,
            PluginOutcome::Inserted { position: 2 }
        );
        let amended = amendment.into_plan().unwrap();
        assert_eq!(amended.names(), vec!["Mark", "Emit", "Seal"]);
    }

    #[test]
    fn test_rejects_when_every_legal_position_breaks_later_step() {
        let mut fixture = Fixture::scoped();
        let unmark = fixture
            .registry
            .register_fn(
                SchedulableDescriptor::new("Unmark", Granularity::Session)
                    .needs(MARKED)
                    .forbids(EMITTED)
                    .removes(MARKED),
                noop,
            )
            .unwrap();
        let plan = base_plan(&fixture);

        let amendment = PlanAmender::new(&fixture.registry)
            .amend(&plan, &[unmark])
            .unwrap();
        let PluginOutcome::Rejected { reason } = &amendment.reports()[0].outcome else {
            panic!("expected a rejection");
        };
        assert!(reason.contains("'Emit'"), "{reason}");
    }

    #[test]
    fn test_rejection_names_plugin_and_contract() {
        let mut fixture = Fixture::scoped();
        let late = fixture
            .registry
            .register_fn(
                SchedulableDescriptor::new("Late", Granularity::Session).needs(SHRUNK),
                noop,
            )
            .unwrap();
        let plan = base_plan(&fixture);

        let amendment = PlanAmender::new(&fixture.registry)
            .amend(&plan, &[late])
            .unwrap();
        assert!(!amendment.is_valid());
        assert_eq!(amendment.rejected().count(), 1);

        match amendment.into_plan() {
            Err(Error::PluginRejected {
                plugin,
                reason,
                contract,
            }) => {
                assert_eq!(plugin, "Late");
                assert!(reason.contains("Shrunk"), "{reason}");
                assert_eq!(contract, "Late [Session] needs {Shrunk}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_plugins_build_on_each_other() {
        const AUDITED: Tag = Tag::new("Audited");
        let mut fixture = Fixture::scoped();
        let report = fixture
            .registry
            .register_fn(
                SchedulableDescriptor::new("Report", Granularity::Session).needs(AUDITED),
                noop,
            )
            .unwrap();
        let audit = fixture
            .registry
            .register_fn(
                SchedulableDescriptor::new("Audit", Granularity::Session)
                    .needs(MARKED)
                    .adds(AUDITED),
                noop,
            )
            .unwrap();
        let plan = base_plan(&fixture);

        let amended = PlanAmender::new(&fixture.registry)
            .amend(&plan, &[audit, report])
            .unwrap()
            .into_plan()
            .unwrap();
        assert_eq!(amended.names(), vec!["Mark", "Audit", "Report", "Emit"]);
    }

    #[test]
    fn test_method_plugin_joins_scope() {
        let mut fixture = Fixture::scoped();
        let plan = {
            let mut request = Request::new(&fixture.registry);
            request.add_initial_tags_or_markers([PARSED]);
            let mut builder = request.get_plan_builder(Granularity::Session).unwrap();
            builder.append(fixture.id("Mark")).unwrap();
            builder
                .append_sub_plan(Adapter::SessionToType)
                .unwrap()
                .append_sub_plan(Adapter::TypeToMethod)
                .unwrap()
                .append(fixture.id("Fold"))
                .unwrap();
            builder.get_plan().unwrap()
        };
        let count = fixture
            .registry
            .register_fn(
                SchedulableDescriptor::new("CountFolded", Granularity::Method).needs(FOLDED),
                noop,
            )
            .unwrap();

        let amended = PlanAmender::new(&fixture.registry)
            .amend(&plan, &[count])
            .unwrap()
            .into_plan()
            .unwrap();
        assert_eq!(amended.names(), vec!["Mark", "Fold", "CountFolded"]);
        assert_eq!(amended.steps().len(), 2);
        assert!(amended.validate().is_ok());
    }
}
