//! Human-readable plan renderings.

use std::fmt::{self, Write};

use crate::{
    contract::{display_features, LabelSet},
    plan::{Plan, PlanStep},
};

/// Renders a [`Plan`] as text.
pub trait PlanPrinter {
    /// Writes the rendering of `plan` into `out`.
    ///
    /// # Errors
    ///
    /// Propagates write failures of `out`.
    fn print(&self, plan: &Plan, out: &mut dyn Write) -> fmt::Result;

    /// Renders `plan` into a new string.
    fn render(&self, plan: &Plan) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = self.print(plan, &mut out);
        out
    }
}

/// One line per step: schedulable names, adapters opening an indented block.
///
/// ```text
/// [Session]
///   Mark
///   SessionToType
///     TypeToMethod
///       Inline
///   Emit
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactPlanPrinter;

impl CompactPlanPrinter {
    fn steps(steps: &[PlanStep], depth: usize, out: &mut dyn Write) -> fmt::Result {
        for step in steps {
            match step {
                PlanStep::Run(entry) => writeln!(out, "{:indent$}{}", "", entry.name(), indent = depth * 2)?,
                PlanStep::Adapt { adapter, steps } => {
                    writeln!(out, "{:indent$}{adapter}", "", indent = depth * 2)?;
                    Self::steps(steps, depth + 1, out)?;
                }
            }
        }
        Ok(())
    }
}

impl PlanPrinter for CompactPlanPrinter {
    fn print(&self, plan: &Plan, out: &mut dyn Write) -> fmt::Result {
        writeln!(out, "[{}]", plan.root())?;
        Self::steps(plan.steps(), 1, out)
    }
}

/// Numbered steps with their full contracts, optionally followed by the label state
/// each step leaves behind.
#[derive(Debug, Clone, Copy)]
pub struct DetailedPlanPrinter {
    /// Print the replayed label state after every schedulable (default: true)
    pub states: bool,
}

impl Default for DetailedPlanPrinter {
    fn default() -> Self {
        DetailedPlanPrinter { states: true }
    }
}

struct Cursor {
    state: LabelSet,
    index: usize,
}

impl DetailedPlanPrinter {
    fn steps(
        &self,
        steps: &[PlanStep],
        depth: usize,
        cursor: &mut Cursor,
        out: &mut dyn Write,
    ) -> fmt::Result {
        let pad = depth * 2;
        for step in steps {
            match step {
                PlanStep::Run(entry) => {
                    cursor.index += 1;
                    let descriptor = entry.descriptor();
                    writeln!(out, "{:pad$}{}. {descriptor}", "", cursor.index)?;
                    if !descriptor.get_description().is_empty() {
                        writeln!(out, "{:pad$}   {}", "", descriptor.get_description())?;
                    }
                    descriptor.apply(&mut cursor.state);
                    if self.states {
                        writeln!(out, "{:pad$}   => {}", "", cursor.state)?;
                    }
                }
                PlanStep::Adapt { adapter, steps } => {
                    writeln!(out, "{:pad$}for each {} ({adapter}):", "", adapter.target())?;
                    self.steps(steps, depth + 1, cursor, out)?;
                }
            }
        }
        Ok(())
    }
}

impl PlanPrinter for DetailedPlanPrinter {
    fn print(&self, plan: &Plan, out: &mut dyn Write) -> fmt::Result {
        writeln!(
            out,
            "Plan [{}] with {} schedulables, features {}",
            plan.root(),
            plan.len(),
            display_features(plan.features())
        )?;
        writeln!(out, "initial {}", plan.initial())?;

        let mut cursor = Cursor {
            state: plan.initial().clone(),
            index: 0,
        };
        self.steps(plan.steps(), 1, &mut cursor, out)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::{
        contract::Granularity,
        plan::FlatStep,
        test::{labels::*, registry::Fixture},
    };

    fn sample_plan(fixture: &Fixture) -> Plan {
        let flat: Vec<FlatStep> = ["Mark", "Inline", "Emit"]
            .iter()
            .map(|name| fixture.flat(Granularity::Session, name))
            .collect();
        Plan::from_flat(
            Granularity::Session,
            &flat,
            BTreeSet::new(),
            [PARSED].into_iter().collect(),
        )
    }

    #[test]
    fn test_compact_printer() {
        let fixture = Fixture::scoped();
        let plan = sample_plan(&fixture);
        assert_eq!(
            CompactPlanPrinter.render(&plan),
            "[Session]\n  Mark\n  SessionToType\n    TypeToMethod\n      Inline\n  Emit\n"
        );
        assert_eq!(plan.to_string(), CompactPlanPrinter.render(&plan));
    }

    #[test]
    fn test_detailed_printer() {
        let fixture = Fixture::scoped();
        let plan = sample_plan(&fixture);
        let text = DetailedPlanPrinter::default().render(&plan);

        assert!(text.starts_with("Plan [Session] with 3 schedulables, features {}\n"));
        assert!(text.contains("initial {Parsed}\n"));
        assert!(text.contains("  1. Mark [Session] needs {Parsed} adds {Marked}\n"));
        assert!(text.contains("   => {Marked, Parsed}\n"));
        assert!(text.contains("for each Method (TypeToMethod):"));
        assert!(text.contains("3. Emit [Session]"));

        let quiet = DetailedPlanPrinter { states: false }.render(&plan);
        assert!(!quiet.contains("=>"));
    }
}
