//! Driver-requested features.

use std::{cmp::Ordering, collections::BTreeSet, fmt, hash::Hash};

/// An opt-in capability requested by the compilation driver, e.g. `Shrink`.
///
/// Features gate which schedulables are eligible: a schedulable whose required features
/// are not all active is never planned. A feature may name other features it cannot be
/// combined with.
#[derive(Debug, Clone, Copy)]
pub struct Feature {
    name: &'static str,
    excludes: &'static [&'static str],
}

impl Feature {
    /// Declares a feature.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Feature { name, excludes: &[] }
    }

    /// Declares the names of features this one cannot be combined with.
    #[must_use]
    pub const fn excluding(mut self, excludes: &'static [&'static str]) -> Self {
        self.excludes = excludes;
        self
    }

    /// Returns the feature name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Names of the features this one excludes
    #[must_use]
    pub const fn excludes(&self) -> &'static [&'static str] {
        self.excludes
    }

    /// Returns `true` if the two features cannot be requested together.
    ///
    /// The relation is symmetric: a single declaration on either side is enough.
    #[must_use]
    pub fn conflicts_with(&self, other: &Feature) -> bool {
        self.excludes.contains(&other.name) || other.excludes.contains(&self.name)
    }
}

impl PartialEq for Feature {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Feature {}

impl PartialOrd for Feature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Feature {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(other.name)
    }
}

impl Hash for Feature {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Returns the first pair of mutually exclusive features in `features`, if any.
#[must_use]
pub fn find_conflict(features: &BTreeSet<Feature>) -> Option<(Feature, Feature)> {
    let all: Vec<&Feature> = features.iter().collect();
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            if a.conflicts_with(b) {
                return Some((**a, **b));
            }
        }
    }
    None
}

/// Formats a feature set as `{A, B}`.
pub(crate) fn display_features(features: &BTreeSet<Feature>) -> String {
    let names: Vec<&str> = features.iter().map(Feature::name).collect();
    format!("{{{}}}", names.join(", "))
}
