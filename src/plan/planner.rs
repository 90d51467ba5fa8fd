//! Automatic ordering of schedulables.
//!
//! The planner is a forward-chaining search over label states. Starting from the
//! request's initial labels it repeatedly fires the first eligible candidate in
//! registration order, applies its adds and removes, and stops as soon as every
//! requested production holds.
//!
//! Two refinements keep the result minimal and complete:
//!
//! - Candidates that cannot contribute to a production are pruned up front. A candidate
//!   contributes if it adds a label some contributing candidate needs (or a production
//!   requires), or removes a label some contributing candidate forbids.
//! - Before searching, the labels reachable when forbids and removes are ignored are
//!   computed as a fixpoint. A production outside that set fails at once, naming the
//!   labels that block it, and candidates that can never fire are dropped.
//! - A greedy choice that leads into a dead end is undone and the next eligible candidate
//!   is tried. Visited `(placed, state)` pairs are memoized, so every state is expanded
//!   at most once. When the greedy path succeeds, it is the result.
//! - The backtracking search is bounded. Once the budget is spent the planner settles
//!   for a single greedy pass.

use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};

use crate::{
    contract::{Feature, LabelSet, Production, TagOrMarker},
    schedulable::SchedulableEntry,
    Error, Result,
};

pub(crate) struct Planner<'a> {
    candidates: Vec<&'a Arc<SchedulableEntry>>,
    productions: &'a [Production],
    features: &'a BTreeSet<Feature>,
}

struct Search<'p, 'a> {
    planner: &'p Planner<'a>,
    candidates: &'p [&'a Arc<SchedulableEntry>],
    visited: HashSet<(Vec<bool>, LabelSet)>,
    exhausted: bool,
    best: LabelSet,
    best_missing: usize,
}

impl<'a> Planner<'a> {
    /// `candidates` must be given in registration order.
    pub(crate) fn new(
        candidates: Vec<&'a Arc<SchedulableEntry>>,
        productions: &'a [Production],
        features: &'a BTreeSet<Feature>,
    ) -> Self {
        let planner = Planner {
            candidates,
            productions,
            features,
        };
        planner.prune()
    }

    fn goals(&self) -> LabelSet {
        self.productions
            .iter()
            .flat_map(|p| p.requires().iter().copied())
            .collect()
    }

    /// Drops candidates that cannot contribute to any production.
    fn prune(self) -> Self {
        let mut wanted = self.goals();
        let mut unwanted = LabelSet::new();
        let mut relevant = vec![false; self.candidates.len()];

        loop {
            let mut changed = false;
            for (i, entry) in self.candidates.iter().enumerate() {
                if relevant[i] {
                    continue;
                }
                let descriptor = entry.descriptor();
                let contributes = !descriptor.added().is_disjoint(&wanted)
                    || !descriptor.removed().is_disjoint(&unwanted);
                if contributes {
                    relevant[i] = true;
                    wanted.union_with(descriptor.needed());
                    unwanted.union_with(descriptor.forbidden());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let (kept, pruned): (Vec<_>, Vec<_>) = self
            .candidates
            .into_iter()
            .zip(relevant)
            .partition(|(_, relevant)| *relevant);
        for (entry, _) in &pruned {
            log::debug!("'{}' does not contribute to the productions", entry.name());
        }

        Planner {
            candidates: kept.into_iter().map(|(entry, _)| entry).collect(),
            productions: self.productions,
            features: self.features,
        }
    }

    fn missing(&self, state: &LabelSet) -> usize {
        self.productions
            .iter()
            .map(|p| p.missing_in(state).count())
            .sum()
    }

    fn enabled(&self, entry: &SchedulableEntry) -> bool {
        entry
            .descriptor()
            .required_features()
            .is_subset(self.features)
    }

    /// Fixpoint of the adds of every enabled candidate whose needs are reachable.
    ///
    /// Forbids and removes are ignored, so the result over-approximates every state the
    /// search can reach. Returns the reachable labels and which candidates can ever fire.
    fn reachable(&self, initial: &LabelSet) -> (LabelSet, Vec<bool>) {
        let mut reachable = initial.clone();
        let mut fired = vec![false; self.candidates.len()];
        loop {
            let mut changed = false;
            for (i, entry) in self.candidates.iter().enumerate() {
                if fired[i] || !self.enabled(entry) {
                    continue;
                }
                if entry.descriptor().needed().is_subset(&reachable) {
                    fired[i] = true;
                    reachable.union_with(entry.descriptor().added());
                    changed = true;
                }
            }
            if !changed {
                return (reachable, fired);
            }
        }
    }

    /// Walks back from `goals` to the unreachable labels no enabled candidate adds.
    fn blockers(
        &self,
        reachable: &LabelSet,
        goals: impl IntoIterator<Item = TagOrMarker>,
    ) -> LabelSet {
        let mut blockers = LabelSet::new();
        let mut seen = LabelSet::new();
        let mut pending: Vec<TagOrMarker> = goals.into_iter().collect();

        while let Some(label) = pending.pop() {
            if !seen.insert(label) {
                continue;
            }
            let mut adders = self
                .candidates
                .iter()
                .filter(|entry| {
                    self.enabled(entry) && entry.descriptor().added().contains(label)
                })
                .peekable();
            if adders.peek().is_none() {
                blockers.insert(label);
                continue;
            }
            for adder in adders {
                let unmet = adder.descriptor().needed().difference(reachable);
                pending.extend(unmet.iter().copied());
            }
        }
        blockers
    }

    fn not_found(&self, state: &LabelSet, blockers: &LabelSet) -> Error {
        let unmet: Vec<&Production> = self
            .productions
            .iter()
            .filter(|p| !p.is_satisfied_by(state))
            .collect();
        let mut missing: Vec<String> = unmet
            .iter()
            .flat_map(|p| p.missing_in(state))
            .map(|tag| tag.name().to_string())
            .chain(blockers.iter().map(|label| label.name().to_string()))
            .collect();
        missing.sort();
        missing.dedup();

        Error::PlanNotFound {
            productions: unmet.iter().map(|p| p.name().to_string()).collect(),
            missing,
        }
    }

    /// Orders the candidates so that every production holds at the end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PlanNotFound`] with the unmet productions and their missing tags.
    /// When a production is unreachable even ignoring forbids, the labels blocking it are
    /// reported as well and no search takes place.
    pub(crate) fn solve(&self, initial: &LabelSet) -> Result<Vec<Arc<SchedulableEntry>>> {
        let (reachable, fired) = self.reachable(initial);
        if self.missing(&reachable) > 0 {
            let goals: Vec<TagOrMarker> = self
                .productions
                .iter()
                .flat_map(|p| p.missing_in(&reachable))
                .map(TagOrMarker::from)
                .collect();
            let blockers = self.blockers(&reachable, goals);
            log::debug!("productions unreachable, blocked by {blockers}");
            return Err(self.not_found(&reachable, &blockers));
        }

        let live: Vec<&Arc<SchedulableEntry>> = self
            .candidates
            .iter()
            .zip(fired)
            .filter_map(|(entry, fired)| fired.then_some(*entry))
            .collect();

        let mut search = Search {
            planner: self,
            candidates: &live,
            visited: HashSet::new(),
            exhausted: false,
            best: initial.clone(),
            best_missing: self.missing(initial),
        };

        let mut placed = vec![false; live.len()];
        let mut state = initial.clone();
        let mut order = Vec::new();

        let found = if search.expand(&mut placed, &mut state, &mut order) {
            true
        } else if search.exhausted {
            log::warn!(
                "planner gave up backtracking after {} states, falling back to a greedy pass",
                search.visited.len()
            );
            order = search.greedy(initial);
            self.missing(&search.best) == 0
        } else {
            false
        };

        if found {
            log::debug!(
                "planner explored {} states, order [{}]",
                search.visited.len(),
                order
                    .iter()
                    .map(|i: &usize| live[*i].name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return Ok(order.into_iter().map(|i| Arc::clone(live[i])).collect());
        }

        Err(self.not_found(&search.best, &LabelSet::new()))
    }
}

/// Number of distinct `(placed, state)` pairs the backtracking search may expand.
const SEARCH_BUDGET: usize = 1 << 14;

impl Search<'_, '_> {
    fn record(&mut self, state: &LabelSet) -> usize {
        let missing = self.planner.missing(state);
        if missing < self.best_missing {
            self.best_missing = missing;
            self.best = state.clone();
        }
        missing
    }

    fn eligible(&self, placed: &[bool], state: &LabelSet) -> Vec<usize> {
        let features = self.planner.features;
        self.candidates
            .iter()
            .enumerate()
            .filter(|(i, entry)| {
                let descriptor = entry.descriptor();
                !placed[*i]
                    && descriptor.check(state, features).is_ok()
                    && !descriptor.is_noop_in(state)
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn expand(&mut self, placed: &mut Vec<bool>, state: &mut LabelSet, order: &mut Vec<usize>) -> bool {
        if self.record(state) == 0 {
            return true;
        }
        if !self.visited.insert((placed.clone(), state.clone())) {
            return false;
        }
        if self.visited.len() > SEARCH_BUDGET {
            self.exhausted = true;
            return false;
        }

        for i in self.eligible(placed, state) {
            let entry = self.candidates[i];
            let saved = state.clone();
            entry.descriptor().apply(state);
            placed[i] = true;
            order.push(i);

            if self.expand(placed, state, order) {
                return true;
            }
            if self.exhausted {
                return false;
            }

            log::trace!("backtracking over '{}'", entry.name());
            order.pop();
            placed[i] = false;
            *state = saved;
        }
        false
    }

    /// Fires the first eligible candidate until the productions hold or none is left.
    fn greedy(&mut self, initial: &LabelSet) -> Vec<usize> {
        let mut placed = vec![false; self.candidates.len()];
        let mut state = initial.clone();
        let mut order = Vec::new();

        while self.record(&state) > 0 {
            let Some(&i) = self.eligible(&placed, &state).first() else {
                break;
            };
            self.candidates[i].descriptor().apply(&mut state);
            placed[i] = true;
            order.push(i);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::{
        contract::{Granularity, SchedulableDescriptor, Tag},
        schedulable::SchedulableRegistry,
        test::labels::*,
    };

    fn solve(
        registry: &SchedulableRegistry,
        productions: &[Production],
        features: &BTreeSet<Feature>,
        initial: &LabelSet,
    ) -> Result<Vec<String>> {
        let candidates = registry.list_all().collect();
        Planner::new(candidates, productions, features)
            .solve(initial)
            .map(|order| order.iter().map(|e| e.name().to_string()).collect())
    }

    fn noop(_cx: &mut crate::schedule::RunContext<'_>) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_prunes_unrelated_candidates() {
        const DOCS: Tag = Tag::new("Docs");
        let mut registry = SchedulableRegistry::new();
        registry
            .register_fn(
                SchedulableDescriptor::new("Javadoc", Granularity::Session)
                    .needs(PARSED)
                    .adds(DOCS),
                noop,
            )
            .unwrap();
        registry
            .register_fn(
                SchedulableDescriptor::new("Mark", Granularity::Session)
                    .needs(PARSED)
                    .adds(MARKED),
                noop,
            )
            .unwrap();

        let order = solve(
            &registry,
            &[Production::new("Marking", &[MARKED])],
            &BTreeSet::new(),
            &[PARSED].into_iter().collect(),
        )
        .unwrap();
        assert_eq!(order, vec!["Mark"]);
    }

    #[test]
    fn test_backtracks_out_of_dead_end() {
        // "Lock" is eligible first but forbids the path to the goal forever
        const LOCKED: Tag = Tag::new("Locked");
        const READY: Tag = Tag::new("Ready");
        const DONE: Tag = Tag::new("Done");

        let mut registry = SchedulableRegistry::new();
        registry
            .register_fn(
                SchedulableDescriptor::new("Lock", Granularity::Session)
                    .adds(LOCKED)
                    .adds(READY),
                noop,
            )
            .unwrap();
        registry
            .register_fn(
                SchedulableDescriptor::new("Prepare", Granularity::Session).adds(READY),
                noop,
            )
            .unwrap();
        registry
            .register_fn(
                SchedulableDescriptor::new("Finish", Granularity::Session)
                    .needs(READY)
                    .forbids(LOCKED)
                    .adds(DONE),
                noop,
            )
            .unwrap();

        let order = solve(
            &registry,
            &[Production::new("Done", &[DONE])],
            &BTreeSet::new(),
            &LabelSet::new(),
        )
        .unwrap();
        assert_eq!(order, vec!["Prepare", "Finish"]);
    }

    #[test]
    fn test_cycle_reports_missing_tags() {
        const X: Tag = Tag::new("X");
        const Y: Tag = Tag::new("Y");
        const GOAL: Tag = Tag::new("Goal");

        let mut registry = SchedulableRegistry::new();
        registry
            .register_fn(
                SchedulableDescriptor::new("A", Granularity::Session).needs(X).adds(Y).adds(GOAL),
                noop,
            )
            .unwrap();
        registry
            .register_fn(
                SchedulableDescriptor::new("B", Granularity::Session).needs(Y).adds(X),
                noop,
            )
            .unwrap();

        let err = solve(
            &registry,
            &[Production::new("Goal", &[GOAL])],
            &BTreeSet::new(),
            &LabelSet::new(),
        )
        .unwrap_err();
        match err {
            Error::PlanNotFound {
                productions,
                missing,
            } => {
                assert_eq!(productions, vec!["Goal"]);
                assert_eq!(missing, vec!["Goal"]);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    fn leaked_tag(name: String) -> Tag {
        Tag::new(Box::leak(name.into_boxed_str()))
    }

    #[test]
    fn test_unreachable_need_fails_fast() {
        const NEVER: Tag = Tag::new("Never");
        const GOAL: Tag = Tag::new("Goal");

        let mut registry = SchedulableRegistry::new();
        let mut last = SchedulableDescriptor::new("Final", Granularity::Session)
            .needs(NEVER)
            .adds(GOAL);
        for i in 0..24 {
            let tag = leaked_tag(format!("T{i}"));
            registry
                .register_fn(
                    SchedulableDescriptor::new(format!("P{i}"), Granularity::Session).adds(tag),
                    noop,
                )
                .unwrap();
            last = last.needs(tag);
        }
        registry.register_fn(last, noop).unwrap();

        let started = Instant::now();
        let err = solve(
            &registry,
            &[Production::new("G", &[GOAL])],
            &BTreeSet::new(),
            &LabelSet::new(),
        )
        .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(1));
        match err {
            Error::PlanNotFound {
                productions,
                missing,
            } => {
                assert_eq!(productions, vec!["G"]);
                assert_eq!(missing, vec!["Goal", "Never"]);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_forbid_dead_ends_are_bounded() {
        const LOCKED: Tag = Tag::new("Locked");
        const GOAL: Tag = Tag::new("Goal");

        let mut registry = SchedulableRegistry::new();
        let mut last = SchedulableDescriptor::new("Final", Granularity::Session)
            .forbids(LOCKED)
            .adds(GOAL);
        for i in 0..20 {
            let tag = leaked_tag(format!("T{i}"));
            registry
                .register_fn(
                    SchedulableDescriptor::new(format!("P{i}"), Granularity::Session)
                        .adds(tag)
                        .adds(LOCKED),
                    noop,
                )
                .unwrap();
            last = last.needs(tag);
        }
        registry.register_fn(last, noop).unwrap();

        let started = Instant::now();
        let result = solve(
            &registry,
            &[Production::new("G", &[GOAL])],
            &BTreeSet::new(),
            &LabelSet::new(),
        );
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(matches!(result, Err(Error::PlanNotFound { .. })));
    }

    #[test]
    fn test_feature_gated_adder_is_reported() {
        let mut registry = SchedulableRegistry::new();
        registry
            .register_fn(
                SchedulableDescriptor::new("Shrink", Granularity::Session)
                    .adds(SHRUNK)
                    .requires_feature(SHRINK),
                noop,
            )
            .unwrap();
        registry
            .register_fn(
                SchedulableDescriptor::new("Emit", Granularity::Session)
                    .needs(SHRUNK)
                    .adds(EMITTED),
                noop,
            )
            .unwrap();

        let err = solve(
            &registry,
            &[Production::new("Dex", &[EMITTED])],
            &BTreeSet::new(),
            &LabelSet::new(),
        )
        .unwrap_err();
        assert!(
            matches!(err, Error::PlanNotFound { ref missing, .. } if missing == &["Emitted", "Shrunk"])
        );
    }

    #[test]
    fn test_feature_gating() {
        let mut registry = SchedulableRegistry::new();
        registry
            .register_fn(
                SchedulableDescriptor::new("Shrink", Granularity::Session)
                    .needs(MARKED)
                    .adds(SHRUNK)
                    .requires_feature(SHRINK),
                noop,
            )
            .unwrap();
        let productions = [Production::new("Shrunk", &[SHRUNK])];
        let initial: LabelSet = [MARKED].into_iter().collect();

        assert!(solve(&registry, &productions, &BTreeSet::new(), &initial).is_err());
        let features = [SHRINK].into_iter().collect();
        assert_eq!(
            solve(&registry, &productions, &features, &initial).unwrap(),
            vec!["Shrink"]
        );
    }

    #[test]
    fn test_satisfied_initially_is_empty() {
        let registry = SchedulableRegistry::new();
        let order = solve(
            &registry,
            &[Production::new("Parsed", &[PARSED])],
            &BTreeSet::new(),
            &[PARSED].into_iter().collect(),
        )
        .unwrap();
        assert!(order.is_empty());
    }
}
