//! Explicit compilation configuration handed to every schedulable invocation.

use dashmap::DashMap;
use strum::Display;

/// How the entities of one plan step are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum RunnerPolicy {
    /// One entity after the other, each invocation's edits committed before the next
    Sequential,
    /// Entities of a step fan out over the rayon pool, edits committed after the barrier
    #[default]
    Parallel,
}

/// Configuration of plan execution.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Entity processing policy (default: `Parallel`).
    pub runner: RunnerPolicy,

    /// Worker threads for a dedicated pool, `None` uses the global rayon pool (default: `None`).
    pub threads: Option<usize>,

    /// Log the resolved plan with its contracts before executing it (default: false).
    pub trace_plan: bool,

    /// Check needed and forbidden tags against the session before every step (default: true).
    ///
    /// Plans are validated when they are built; this catches sessions whose initial tags
    /// differ from the ones the plan was built for.
    pub check_contracts: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            runner: RunnerPolicy::Parallel,
            threads: None,
            trace_plan: false,
            check_contracts: true,
        }
    }
}

impl SchedulerConfig {
    /// Configuration that processes entities sequentially.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            runner: RunnerPolicy::Sequential,
            ..Self::default()
        }
    }

    /// Sets the runner policy.
    #[must_use]
    pub fn with_runner(mut self, runner: RunnerPolicy) -> Self {
        self.runner = runner;
        self
    }

    /// Uses a dedicated pool with `threads` workers.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Enables plan tracing.
    #[must_use]
    pub fn with_trace_plan(mut self, trace_plan: bool) -> Self {
        self.trace_plan = trace_plan;
        self
    }
}

/// Compilation-wide settings passed by reference into every invocation.
///
/// Besides the scheduler configuration it carries free-form string properties, e.g. the
/// target API level or a shrinking seed file. Properties may be read and written
/// concurrently by passes running in parallel.
#[derive(Debug, Default)]
pub struct CompilationContext {
    /// Scheduler configuration
    pub config: SchedulerConfig,
    properties: DashMap<String, String>,
}

impl CompilationContext {
    /// Creates a context with the given scheduler configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            properties: DashMap::new(),
        }
    }

    /// Adds a property while building the context.
    #[must_use]
    pub fn with_property(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns a property value.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<String> {
        self.properties.get(key).map(|entry| entry.value().clone())
    }

    /// Returns `true` if the property is set to `"true"`.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.properties.get(key).is_some_and(|value| value.as_str() == "true")
    }

    /// Sets a property, returning the previous value.
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.properties.insert(key.into(), value.into())
    }
}
