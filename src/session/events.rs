//! Event log of plan execution.
//!
//! Every step of a running plan leaves a trail of [`Event`]s in the session's
//! [`EventLog`]: which pass started, on how many entities it ran, which edits were
//! committed and what failed. The log is append-only and thread-safe, so invocations
//! running in parallel record into it through a shared reference.
//!
//! # Example
//!
//! ```rust
//! use jack_scheduler::session::{DerivedStats, EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::TransformationCommitted)
//!     .schedulable("ConstantFolding")
//!     .count(3);
//! log.warn("nothing to fold in Foo.bar");
//!
//! let stats = DerivedStats::from_log(&log);
//! assert_eq!(stats.steps_applied, 3);
//! assert_eq!(stats.warnings, 1);
//! ```

use std::{collections::HashMap, fmt, time::Duration};

use crate::tree::NodeId;

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A plan started executing.
    PlanStarted,
    /// A plan finished executing.
    PlanCompleted,
    /// A schedulable step started.
    PassStarted,
    /// A schedulable step completed.
    PassCompleted,
    /// A schedulable ran on one entity.
    EntityProcessed,
    /// An entity was skipped by the filter or its markers.
    EntitySkipped,
    /// A transformation request was committed.
    TransformationCommitted,
    /// A fault-tolerant schedulable failed on an entity.
    PassFailed,
    /// The session abort flag stopped the plan.
    Aborted,

    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
    /// Error (something failed).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::PlanStarted => "plan started",
            Self::PlanCompleted => "plan completed",
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            Self::EntityProcessed => "entity processed",
            Self::EntitySkipped => "entity skipped",
            Self::TransformationCommitted => "transformation committed",
            Self::PassFailed => "pass failed",
            Self::Aborted => "aborted",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this is a diagnostic event (info/warning/error/failure).
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            Self::Info | Self::Warning | Self::Error | Self::PassFailed | Self::Aborted
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The schedulable that produced the event (if any).
    pub schedulable: Option<String>,
    /// The entity the schedulable was running on (if any).
    pub entity: Option<NodeId>,
    /// Number of items the event stands for, e.g. committed steps.
    pub count: Option<usize>,
    /// Elapsed time, set on completion events.
    pub duration: Option<Duration>,
    /// Human-readable description.
    pub message: String,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            schedulable: None,
            entity: None,
            count: None,
            duration: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(name) = &self.schedulable {
            write!(f, " {name}")?;
        }
        if let Some(entity) = self.entity {
            write!(f, " on {entity}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is automatically added
/// to the log when the builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    schedulable: Option<String>,
    entity: Option<NodeId>,
    count: Option<usize>,
    duration: Option<Duration>,
    message: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            schedulable: None,
            entity: None,
            count: None,
            duration: None,
            message: None,
        }
    }

    /// Associates this event with a schedulable.
    pub fn schedulable(mut self, name: impl Into<String>) -> Self {
        self.schedulable = Some(name.into());
        self
    }

    /// Sets the entity the event refers to.
    pub fn entity(mut self, entity: NodeId) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Sets the item count.
    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Sets the elapsed time.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            schedulable: self.schedulable.take(),
            entity: self.entity.take(),
            count: self.count.take(),
            duration: self.duration.take(),
            message,
        });
    }
}

/// Append-only collection of execution events.
///
/// This type is thread-safe: events can be appended concurrently from
/// multiple threads using shared references (`&self`).
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The event is automatically added when the builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.filter_kind(kind).count()
    }

    /// Returns an iterator over all events in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Returns an iterator over the events of one schedulable.
    pub fn filter_schedulable<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.iter()
            .filter(move |e| e.schedulable.as_deref() == Some(name))
    }

    /// Returns an iterator over diagnostic events only.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_diagnostic())
    }

    /// Names of the schedulables that started, in execution order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.filter_kind(EventKind::PassStarted)
            .filter_map(|e| e.schedulable.clone())
            .collect()
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for event in self.iter() {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Generates a human-readable summary of all events.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }
        DerivedStats::from_log(self).summary()
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = Box<dyn Iterator<Item = &'a Event> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        let log = Self::new();
        for event in iter {
            log.events.push(event);
        }
        log
    }
}

/// Statistics derived from an EventLog.
///
/// All numbers are computed from events, nothing is tracked separately.
#[derive(Debug, Clone, Default)]
pub struct DerivedStats {
    /// Number of schedulable steps executed.
    pub passes_run: usize,
    /// Number of schedulable invocations on entities.
    pub entities_processed: usize,
    /// Number of entities skipped by filters or markers.
    pub entities_skipped: usize,
    /// Number of transformation requests committed.
    pub transformations: usize,
    /// Number of transformation steps applied.
    pub steps_applied: usize,
    /// Number of tolerated failures.
    pub failures: usize,
    /// Number of warnings.
    pub warnings: usize,
    /// Number of errors.
    pub errors: usize,
    /// Time spent in completed passes.
    pub total_time: Duration,
}

impl DerivedStats {
    /// Computes statistics from an event log.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let counts = log.count_by_kind();
        let get = |kind: EventKind| counts.get(&kind).copied().unwrap_or(0);

        Self {
            passes_run: get(EventKind::PassCompleted),
            entities_processed: get(EventKind::EntityProcessed),
            entities_skipped: get(EventKind::EntitySkipped),
            transformations: get(EventKind::TransformationCommitted),
            steps_applied: log
                .filter_kind(EventKind::TransformationCommitted)
                .filter_map(|e| e.count)
                .sum(),
            failures: get(EventKind::PassFailed),
            warnings: get(EventKind::Warning),
            errors: get(EventKind::Error),
            total_time: log
                .filter_kind(EventKind::PassCompleted)
                .filter_map(|e| e.duration)
                .sum(),
        }
    }

    /// Generates a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} passes", self.passes_run)];

        if self.entities_processed > 0 {
            parts.push(format!("{} invocations", self.entities_processed));
        }
        if self.entities_skipped > 0 {
            parts.push(format!("{} skipped", self.entities_skipped));
        }
        if self.transformations > 0 {
            parts.push(format!(
                "{} edits in {} commits",
                self.steps_applied, self.transformations
            ));
        }
        if self.failures > 0 {
            parts.push(format!("{} tolerated failures", self.failures));
        }
        if self.warnings > 0 {
            parts.push(format!("{} warnings", self.warnings));
        }
        if self.errors > 0 {
            parts.push(format!("{} errors", self.errors));
        }

        parts.join(", ")
    }
}

impl fmt::Display for DerivedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {:?}", self.summary(), self.total_time)
    }
}
