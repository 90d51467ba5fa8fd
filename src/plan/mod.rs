//! Plans and the ways to obtain them.
//!
//! A [`Plan`] is an ordered list of [`PlanStep`]s. A step either runs a schedulable or
//! narrows the scope through an [`Adapter`] and holds a nested list of steps for the
//! finer entities.
//!
//! Plans are obtained from a [`Request`]:
//!
//! - [`Request::build_plan`] lets the planner derive the order from the contracts
//! - [`Request::get_plan_builder`] returns a [`PlanBuilder`] for explicit assembly
//!
//! Either kind of plan can be extended with plugin schedulables by the [`PlanAmender`].
//!
//! # Semantics
//!
//! Execution follows the flattened step order: every schedulable step runs on all
//! entities its adapter chain currently yields before the next step starts. Adapter
//! nesting groups consecutive steps of the same scope; it never reorders them.

mod amender;
mod builder;
mod planner;
mod printer;
mod request;

use std::{collections::BTreeSet, fmt, sync::Arc};

use crate::{
    contract::{Adapter, ContractViolation, Feature, Granularity, LabelSet},
    schedulable::SchedulableEntry,
    schedule::ScheduleInstance,
    session::{CompilationContext, Session},
    Error, Result,
};

pub use amender::{Amendment, PlanAmender, PluginOutcome, PluginReport};
pub use builder::{PlanBuilder, SubPlanBuilder};
pub use printer::{CompactPlanPrinter, DetailedPlanPrinter, PlanPrinter};
pub use request::Request;

/// One step of a plan.
#[derive(Debug, Clone)]
pub enum PlanStep {
    /// Run a schedulable on every entity of the current scope
    Run(Arc<SchedulableEntry>),
    /// Narrow the scope and run nested steps on the finer entities
    Adapt {
        /// How the finer entities are derived
        adapter: Adapter,
        /// Steps running in the narrowed scope
        steps: Vec<PlanStep>,
    },
}

/// A schedulable together with the adapter chain leading to its scope.
#[derive(Debug, Clone)]
pub(crate) struct FlatStep {
    pub(crate) path: Vec<Adapter>,
    pub(crate) entry: Arc<SchedulableEntry>,
}

/// A finalized, executable plan.
#[derive(Debug, Clone)]
pub struct Plan {
    root: Granularity,
    steps: Vec<PlanStep>,
    features: BTreeSet<Feature>,
    initial: LabelSet,
}

impl Plan {
    pub(crate) fn new(
        root: Granularity,
        steps: Vec<PlanStep>,
        features: BTreeSet<Feature>,
        initial: LabelSet,
    ) -> Self {
        Plan {
            root,
            steps,
            features,
            initial,
        }
    }

    /// Builds a plan from a flat step list, grouping consecutive steps sharing an adapter
    /// prefix under one [`PlanStep::Adapt`].
    pub(crate) fn from_flat(
        root: Granularity,
        flat: &[FlatStep],
        features: BTreeSet<Feature>,
        initial: LabelSet,
    ) -> Self {
        Plan::new(root, nest(flat, 0), features, initial)
    }

    /// Granularity of the entities the top-level steps run on
    #[must_use]
    pub fn root(&self) -> Granularity {
        self.root
    }

    /// Top-level steps
    #[must_use]
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Features the plan was built for
    #[must_use]
    pub fn features(&self) -> &BTreeSet<Feature> {
        &self.features
    }

    /// Labels assumed to hold before the first step
    #[must_use]
    pub fn initial(&self) -> &LabelSet {
        &self.initial
    }

    /// Number of schedulable steps, nested ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flatten().len()
    }

    /// Returns `true` if the plan runs nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Schedulables in execution order.
    #[must_use]
    pub fn schedulables(&self) -> Vec<Arc<SchedulableEntry>> {
        self.flatten().into_iter().map(|step| step.entry).collect()
    }

    /// Schedulable names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.flatten()
            .iter()
            .map(|step| step.entry.name().to_string())
            .collect()
    }

    pub(crate) fn flatten(&self) -> Vec<FlatStep> {
        fn walk(steps: &[PlanStep], path: &mut Vec<Adapter>, out: &mut Vec<FlatStep>) {
            for step in steps {
                match step {
                    PlanStep::Run(entry) => out.push(FlatStep {
                        path: path.clone(),
                        entry: entry.clone(),
                    }),
                    PlanStep::Adapt { adapter, steps } => {
                        path.push(*adapter);
                        walk(steps, path, out);
                        path.pop();
                    }
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.steps, &mut Vec::new(), &mut out);
        out
    }

    /// Replays the label evolution along the plan and returns the final state.
    ///
    /// Checks that every adapter starts from the scope it is placed in, that every
    /// schedulable runs in the scope of its granularity, and that every contract holds
    /// at its execution point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPlan`] describing the first violation.
    pub fn validate(&self) -> Result<LabelSet> {
        let mut state = self.initial.clone();
        self.validate_steps(&self.steps, self.root, &mut state)?;
        Ok(state)
    }

    fn validate_steps(
        &self,
        steps: &[PlanStep],
        scope: Granularity,
        state: &mut LabelSet,
    ) -> Result<()> {
        for step in steps {
            match step {
                PlanStep::Run(entry) => {
                    let descriptor = entry.descriptor();
                    if descriptor.granularity() != scope {
                        return Err(Error::InvalidPlan(format!(
                            "'{}': {}",
                            entry.name(),
                            ContractViolation::GranularityMismatch {
                                scope,
                                declared: descriptor.granularity(),
                            }
                        )));
                    }
                    descriptor
                        .check(state, &self.features)
                        .map_err(|violation| {
                            Error::InvalidPlan(format!("'{}': {violation}", entry.name()))
                        })?;
                    descriptor.apply(state);
                }
                PlanStep::Adapt { adapter, steps } => {
                    if adapter.source() != scope {
                        return Err(Error::InvalidPlan(format!(
                            "adapter {adapter} cannot narrow the {scope} scope"
                        )));
                    }
                    self.validate_steps(steps, adapter.target(), state)?;
                }
            }
        }
        Ok(())
    }

    /// Executes the plan against `session`.
    ///
    /// # Errors
    ///
    /// See [`ScheduleInstance::run`].
    pub fn process(&self, session: &mut Session, context: &CompilationContext) -> Result<()> {
        ScheduleInstance::new(self, context).run(session)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        CompactPlanPrinter.print(self, f)
    }
}

fn nest(flat: &[FlatStep], depth: usize) -> Vec<PlanStep> {
    let mut steps = Vec::new();
    let mut i = 0;
    while i < flat.len() {
        let Some(adapter) = flat[i].path.get(depth).copied() else {
            steps.push(PlanStep::Run(flat[i].entry.clone()));
            i += 1;
            continue;
        };

        let group = flat[i..]
            .iter()
            .take_while(|step| step.path.get(depth) == Some(&adapter))
            .count();
        steps.push(PlanStep::Adapt {
            adapter,
            steps: nest(&flat[i..i + group], depth + 1),
        });
        i += group;
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{labels::*, registry::Fixture};

    #[test]
    fn test_nest_groups_common_prefix() {
        let fixture = Fixture::scoped();
        let flat: Vec<FlatStep> = ["Mark", "Inline", "Fold", "InitFields", "Emit"]
            .iter()
            .map(|name| fixture.flat(Granularity::Session, name))
            .collect();

        let plan = Plan::from_flat(
            Granularity::Session,
            &flat,
            BTreeSet::new(),
            [PARSED].into_iter().collect(),
        );

        assert_eq!(plan.len(), 5);
        assert_eq!(plan.steps().len(), 3);
        let PlanStep::Adapt { adapter, steps } = &plan.steps()[1] else {
            panic!("expected an adapter step");
        };
        assert_eq!(*adapter, Adapter::SessionToType);
        assert_eq!(steps.len(), 2);
        assert_eq!(plan.names(), vec!["Mark", "Inline", "Fold", "InitFields", "Emit"]);

        let flattened = plan.flatten();
        assert_eq!(
            flattened[3].path,
            vec![Adapter::SessionToType, Adapter::TypeToField]
        );
    }

    #[test]
    fn test_validate_reports_first_violation() {
        let fixture = Fixture::scoped();
        let flat = vec![
            fixture.flat(Granularity::Session, "Emit"),
            fixture.flat(Granularity::Session, "Mark"),
        ];
        let plan = Plan::from_flat(
            Granularity::Session,
            &flat,
            BTreeSet::new(),
            [PARSED].into_iter().collect(),
        );

        let err = plan.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidPlan(ref msg) if msg.starts_with("'Emit'")));
    }

    #[test]
    fn test_validate_rejects_misplaced_granularity() {
        let fixture = Fixture::scoped();
        let inline = fixture.entry("Inline");
        let plan = Plan::new(
            Granularity::Session,
            vec![PlanStep::Run(inline)],
            BTreeSet::new(),
            [PARSED, MARKED].into_iter().collect(),
        );
        assert!(matches!(plan.validate(), Err(Error::InvalidPlan(_))));
    }
}
