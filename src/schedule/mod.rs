//! Plan execution.
//!
//! A [`ScheduleInstance`] walks the steps of a [`Plan`] strictly in order. Before each
//! step it re-derives the entity collection from the live tree through the step's
//! adapter chain, so entities created by an earlier step are visited by later ones.
//! The entities of one step are independent: with the parallel runner they fan out over
//! the rayon pool and the resulting transformation requests are committed in entity
//! order once all invocations returned.

mod context;

use std::{sync::Arc, time::Instant};

use rayon::prelude::*;

use crate::{
    contract::{Adapter, Granularity, SchedulableDescriptor},
    error::ProcessError,
    plan::{DetailedPlanPrinter, FlatStep, Plan, PlanPrinter},
    schedulable::SchedulableEntry,
    session::{CompilationContext, EventKind, RunnerPolicy, Session},
    transform::TransformationRequest,
    tree::{NodeId, ProgramTree},
    Error, Result,
};

pub use context::RunContext;

/// An executable binding of a plan to a compilation context.
pub struct ScheduleInstance<'p> {
    plan: &'p Plan,
    context: &'p CompilationContext,
    root_path: Vec<Adapter>,
}

impl<'p> ScheduleInstance<'p> {
    /// Binds `plan` to `context`.
    #[must_use]
    pub fn new(plan: &'p Plan, context: &'p CompilationContext) -> Self {
        ScheduleInstance {
            plan,
            context,
            root_path: Granularity::Session
                .path_to(plan.root())
                .unwrap_or_default(),
        }
    }

    /// Executes the plan against `session`.
    ///
    /// # Errors
    ///
    /// - [`Error::Process`] if a schedulable that is not fault tolerant fails, or if one of
    ///   its transformation requests cannot be committed
    /// - [`Error::Aborted`] if a schedulable raised the session abort flag
    /// - [`Error::InvalidPlan`] if contract checking is enabled and the session's tags do
    ///   not match what a step expects
    /// - [`Error::ThreadPool`] if a dedicated pool was configured and cannot be created
    pub fn run(&self, session: &mut Session) -> Result<()> {
        let config = &self.context.config;
        match (config.runner, config.threads) {
            (RunnerPolicy::Parallel, Some(threads)) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()?;
                pool.install(|| self.run_steps(session))
            }
            _ => self.run_steps(session),
        }
    }

    fn run_steps(&self, session: &mut Session) -> Result<()> {
        let started = Instant::now();
        if self.context.config.trace_plan {
            log::info!(
                "executing plan:\n{}",
                DetailedPlanPrinter::default().render(self.plan)
            );
        }
        session
            .events()
            .record(EventKind::PlanStarted)
            .count(self.plan.len());

        Self::check_abort(session, "<plan start>")?;
        for step in self.plan.flatten() {
            self.run_step(session, &step)?;
            Self::check_abort(session, step.entry.name())?;
        }

        session
            .events()
            .record(EventKind::PlanCompleted)
            .duration(started.elapsed());
        log::info!("plan completed: {}", session.events().summary());
        Ok(())
    }

    fn check_abort(session: &Session, after: &str) -> Result<()> {
        if !session.is_aborted() {
            return Ok(());
        }

        let cause = session.abort_cause().unwrap_or("unspecified").to_string();
        log::warn!("plan aborted after '{after}': {cause}");
        session
            .events()
            .record(EventKind::Aborted)
            .schedulable(after)
            .message(cause.clone());
        Err(Error::Aborted {
            schedulable: after.to_string(),
            cause,
        })
    }

    fn run_step(&self, session: &mut Session, step: &FlatStep) -> Result<()> {
        let entry = &step.entry;
        let descriptor = entry.descriptor();
        let name = descriptor.name();

        if self.context.config.check_contracts {
            Self::check_session_tags(session, descriptor)?;
        }

        let started = Instant::now();
        session
            .events()
            .record(EventKind::PassStarted)
            .schedulable(name);

        let entities = self.entities(session.tree(), &step.path);
        let (selected, skipped): (Vec<NodeId>, Vec<NodeId>) = entities
            .into_iter()
            .partition(|e| Self::should_run(session.tree(), descriptor, *e));
        for entity in &skipped {
            session
                .events()
                .record(EventKind::EntitySkipped)
                .schedulable(name)
                .entity(*entity);
        }
        log::debug!(
            "running '{name}' on {} entities ({} skipped)",
            selected.len(),
            skipped.len()
        );

        if self.context.config.runner == RunnerPolicy::Parallel && selected.len() > 1 {
            let outcomes: Vec<Result<Vec<TransformationRequest>>> = {
                let shared: &Session = session;
                selected
                    .par_iter()
                    .map(|entity| self.invoke(shared, entry, *entity))
                    .collect()
            };
            for (entity, outcome) in selected.iter().zip(outcomes) {
                self.finish(session, entry, *entity, outcome)?;
            }
        } else {
            for entity in &selected {
                let outcome = self.invoke(session, entry, *entity);
                self.finish(session, entry, *entity, outcome)?;
            }
        }

        session.apply_tags(descriptor.removed(), descriptor.added());
        session
            .events()
            .record(EventKind::PassCompleted)
            .schedulable(name)
            .count(selected.len())
            .duration(started.elapsed());
        Ok(())
    }

    /// Entities reached from the program root through the plan root and `path`.
    fn entities(&self, tree: &ProgramTree, path: &[Adapter]) -> Vec<NodeId> {
        let mut current = vec![tree.root()];
        for adapter in self.root_path.iter().chain(path) {
            current = current
                .iter()
                .flat_map(|parent| adapter.entities(tree, *parent))
                .collect();
        }
        current
    }

    fn check_session_tags(session: &Session, descriptor: &SchedulableDescriptor) -> Result<()> {
        let unmet: Vec<_> = descriptor
            .needed()
            .tags()
            .filter(|tag| !session.has_tag(*tag))
            .map(|tag| tag.name())
            .collect();
        if !unmet.is_empty() {
            return Err(Error::InvalidPlan(format!(
                "'{}' needs tags [{}] which do not hold in the session",
                descriptor.name(),
                unmet.join(", ")
            )));
        }

        let present: Vec<_> = descriptor
            .forbidden()
            .tags()
            .filter(|tag| session.has_tag(*tag))
            .map(|tag| tag.name())
            .collect();
        if !present.is_empty() {
            return Err(Error::InvalidPlan(format!(
                "'{}' forbids tags [{}] which hold in the session",
                descriptor.name(),
                present.join(", ")
            )));
        }
        Ok(())
    }

    /// Applies the entity filter and the per-node marker clauses of the contract.
    ///
    /// Markers only constrain entities they may be placed on.
    fn should_run(tree: &ProgramTree, descriptor: &SchedulableDescriptor, entity: NodeId) -> bool {
        let Some(kind) = tree.kind(entity) else {
            return false;
        };
        let class = kind.class();

        let needs_hold = descriptor
            .needed()
            .markers()
            .filter(|m| m.is_valid_on(class))
            .all(|m| tree.has_marker(entity, &m));
        let forbids_absent = !descriptor
            .forbidden()
            .markers()
            .filter(|m| m.is_valid_on(class))
            .any(|m| tree.has_marker(entity, &m));

        needs_hold && forbids_absent && descriptor.accepts(tree, entity)
    }

    fn invoke(
        &self,
        session: &Session,
        entry: &SchedulableEntry,
        entity: NodeId,
    ) -> Result<Vec<TransformationRequest>> {
        let mut cx = RunContext::new(session, self.context, entry, entity);
        entry.body().run(&mut cx)?;
        Ok(cx.into_requests())
    }

    fn finish(
        &self,
        session: &mut Session,
        entry: &Arc<SchedulableEntry>,
        entity: NodeId,
        outcome: Result<Vec<TransformationRequest>>,
    ) -> Result<()> {
        let descriptor = entry.descriptor();
        let name = descriptor.name();

        let requests = match outcome {
            Ok(requests) => requests,
            Err(cause) if descriptor.is_fault_tolerant() => {
                let described = session.tree().describe(entity);
                log::warn!("'{name}' failed on {described}, continuing: {cause}");
                session
                    .events()
                    .record(EventKind::PassFailed)
                    .schedulable(name)
                    .entity(entity)
                    .message(format!("{described}: {cause}"));
                return Ok(());
            }
            Err(cause) => return Err(Self::fail(session, name, entity, cause)),
        };

        for request in requests {
            if let Err(cause) = session.commit(request) {
                return Err(Self::fail(session, name, entity, cause));
            }
        }

        if let Err(cause) = Self::apply_markers(session.tree_mut(), descriptor, entity) {
            return Err(Self::fail(session, name, entity, cause));
        }

        session
            .events()
            .record(EventKind::EntityProcessed)
            .schedulable(name)
            .entity(entity);
        Ok(())
    }

    fn apply_markers(
        tree: &mut ProgramTree,
        descriptor: &SchedulableDescriptor,
        entity: NodeId,
    ) -> Result<()> {
        let Some(class) = tree.kind(entity).map(|kind| kind.class()) else {
            // the invocation deleted its own entity
            return Ok(());
        };

        for marker in descriptor.removed().markers().filter(|m| m.is_valid_on(class)) {
            tree.remove_marker(entity, &marker)?;
        }
        for marker in descriptor.added().markers().filter(|m| m.is_valid_on(class)) {
            tree.add_marker(entity, marker)?;
        }
        Ok(())
    }

    fn fail(session: &Session, name: &str, entity: NodeId, cause: Error) -> Error {
        let described = session.tree().describe(entity);
        session
            .events()
            .record(EventKind::Error)
            .schedulable(name)
            .entity(entity)
            .message(format!("{described}: {cause}"));
        ProcessError::wrap(name, Some(entity), Some(described), cause)
    }
}
